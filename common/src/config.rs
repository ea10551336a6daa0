//! Configuration values built once from the command line and passed down explicitly

/// Output and logging configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputConfig {
    /// Suppress progress; errors are still reported
    pub quiet: bool,
    /// Verbosity level: 0=ERROR, 1=INFO, 2=DEBUG, 3=TRACE
    pub verbose: u8,
    /// Print summary statistics at the end
    pub print_summary: bool,
}

impl OutputConfig {
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            return tracing::Level::ERROR;
        }
        match self.verbose {
            0 => tracing::Level::ERROR,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    }
}

/// Settings shared by the clone and export operations
#[derive(Debug, Clone, Copy, Default)]
pub struct TransferConfig {
    /// Remove each remote file once it has been transferred successfully
    pub cleanup: bool,
    /// How progress is displayed
    pub progress_type: crate::progress::ProgressType,
}
