//! Common library for the `rafc` remote file-access client
//!
//! This crate holds everything the `rafc` command does besides argument parsing: tree
//! enumeration, single-file transfers, clone/export replication, the single-entry operations,
//! progress reporting and logging setup.
//!
//! # Core Modules
//!
//! - [`session`] - the remote-session capability every operation borrows, plus the handle guard
//! - [`directory`] - a session backed by a local directory tree
//! - [`metadata`] - parsing of the service's key/value metadata into [`metadata::RemoteEntry`]
//! - [`walk`] - flattened, pre-ordered enumeration of a remote tree
//! - [`transfer`] - chunked download, upload and cat
//! - [`replicate`] - fail-soft clone and export built on top of `walk` and `transfer`
//! - [`fsops`] - mkdir, remove, rename and link
//!
//! # Error Handling
//!
//! Operations return [`error::Error`], which carries an [`error::ErrorKind`] and the protocol
//! status when one exists. Multi-entry operations use error types that keep partial results:
//! [`walk::Error`] carries the entries found before the failure and [`replicate::Error`] the
//! summary of the work done.
//!
//! # Logging
//!
//! All diagnostics go through `tracing` to stderr. Result lines (e.g. "Saved 10 bytes to a.txt")
//! and text progress go to the output sink of a [`progress::Reporter`].
//!
//! # Entry Point
//!
//! Binaries call [`run`], which sets up logging, runs the command and prints the summary.

#[cfg(test)]
mod testutils;

pub mod config;
pub mod directory;
pub mod error;
pub mod fsops;
pub mod metadata;
pub mod progress;
pub mod replicate;
pub mod session;
pub mod transfer;
pub mod walk;

pub use config::{OutputConfig, TransferConfig};
pub use directory::DirectorySession;
pub use error::{AfcStatus, Error, ErrorKind};
pub use metadata::{EntryKind, RemoteEntry};
pub use progress::{ProgressType, Reporter, Summary};
pub use session::{LinkKind, OpenMode, RemoteSession};

fn init_logging(output: &OutputConfig) {
    let level = output.log_level();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::default()
                .add_directive(tracing_subscriber::filter::LevelFilter::from_level(level).into())
        });
    // a second init (e.g. in tests) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn failure_summary(error: &anyhow::Error) -> Option<Summary> {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<replicate::Error>())
        .map(|error| error.summary)
}

/// Set up logging, run `func` and report its outcome.
///
/// Returns `None` when the command failed; the error has been logged by then. A replication
/// failure anywhere in the error chain still has its summary printed with `--summary`.
pub fn run<Func>(output: &OutputConfig, func: Func) -> Option<Summary>
where
    Func: FnOnce() -> anyhow::Result<Summary>,
{
    init_logging(output);
    match func() {
        Ok(summary) => {
            if output.print_summary {
                eprintln!("{summary}");
            }
            Some(summary)
        }
        Err(error) => {
            tracing::error!("{:#}", &error);
            if output.print_summary {
                if let Some(summary) = failure_summary(&error) {
                    eprintln!("{summary}");
                }
            }
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_returns_result_on_success() {
        let output = OutputConfig {
            quiet: true,
            ..Default::default()
        };
        let summary = Summary {
            files_transferred: 3,
            ..Default::default()
        };
        assert_eq!(run(&output, || Ok(summary)), Some(summary));
    }

    #[test]
    fn run_returns_none_on_failure() {
        let output = OutputConfig {
            quiet: true,
            print_summary: true,
            ..Default::default()
        };
        let result = run(&output, || {
            Err(replicate::Error::new(anyhow::anyhow!("clone failed"), Summary::default()).into())
        });
        assert_eq!(result, None);
    }

    #[test]
    fn summary_is_recovered_from_error_chain() {
        let summary = Summary {
            files_transferred: 2,
            entries_failed: 1,
            ..Default::default()
        };
        let error = anyhow::Error::new(replicate::Error::new(
            anyhow::anyhow!("clone failed"),
            summary,
        ))
        .context("rafc clone");
        assert_eq!(failure_summary(&error), Some(summary));
        assert_eq!(failure_summary(&anyhow::anyhow!("plain")), None);
    }
}
