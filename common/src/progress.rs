//! Transfer progress display and end-of-run summary counters.

use std::io::Write;

/// Width of the `=` bar in characters.
pub const BAR_WIDTH: usize = 50;

const BYTES_PER_MB: u64 = 1024 * 1024;

// back to the start of the previous line and clear everything below it
const REDRAW: &str = "\n\x1b[F\x1b[J";

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ProgressType {
    /// Animated bar when stderr is a terminal, text updates otherwise
    #[default]
    #[value(alias = "Auto")]
    Auto,
    /// Animated progress bar on stderr
    #[value(alias = "ProgressBar")]
    ProgressBar,
    /// Single redrawn text line on the output stream
    #[value(alias = "TextUpdates")]
    TextUpdates,
}

/// Percentage, bar and megabyte counters for one transfer.
#[must_use]
pub fn render_line(current: u64, total: u64, width: usize, label: &str) -> String {
    let ratio = if total == 0 {
        0.0
    } else {
        (current as f64 / total as f64).clamp(0.0, 1.0)
    };
    let elapsed = (ratio * width as f64) as usize;
    format!(
        "{:>3}% [{}{}] {}/{} MB <{}>",
        (ratio * 100.0) as u32,
        "=".repeat(elapsed),
        " ".repeat(width - elapsed),
        current / BYTES_PER_MB,
        total / BYTES_PER_MB,
        label
    )
}

enum Mode {
    Hidden,
    Text,
    Bar(Option<(indicatif::ProgressBar, String)>),
}

/// Output sink for progress and result lines of a single command.
///
/// Progress redraws a single line, so only one transfer may report through a reporter at a
/// time.
pub struct Reporter<'a> {
    out: &'a mut dyn Write,
    mode: Mode,
}

impl<'a> Reporter<'a> {
    pub fn new(out: &'a mut dyn Write, quiet: bool, progress_type: ProgressType) -> Self {
        let mode = if quiet {
            Mode::Hidden
        } else {
            match progress_type {
                ProgressType::TextUpdates => Mode::Text,
                ProgressType::ProgressBar => Mode::Bar(None),
                ProgressType::Auto => {
                    if std::io::IsTerminal::is_terminal(&std::io::stderr()) {
                        Mode::Bar(None)
                    } else {
                        Mode::Text
                    }
                }
            }
        };
        Self { out, mode }
    }

    /// Reporter that only prints result lines.
    pub fn quiet(out: &'a mut dyn Write) -> Self {
        Self::new(out, true, ProgressType::TextUpdates)
    }

    pub fn update(&mut self, current: u64, total: u64, label: &str) {
        if total == 0 {
            return;
        }
        match &mut self.mode {
            Mode::Hidden => {}
            Mode::Text => {
                let line = render_line(current, total, BAR_WIDTH, label);
                if let Err(error) = write!(self.out, "{line}{REDRAW}") {
                    tracing::debug!("failed writing progress: {}", &error);
                }
            }
            Mode::Bar(state) => {
                let reuse = matches!(state.as_ref(), Some((_, current_label)) if current_label == label);
                if !reuse {
                    if let Some((bar, _)) = state.take() {
                        bar.finish_and_clear();
                    }
                    *state = Some((new_bar(total, label), label.to_string()));
                }
                if let Some((bar, _)) = state {
                    bar.set_length(total);
                    bar.set_position(current);
                    bar.set_message(format!(
                        "{}/{} MB <{}>",
                        current / BYTES_PER_MB,
                        total / BYTES_PER_MB,
                        label
                    ));
                }
            }
        }
    }

    /// Clear any progress line still on screen.
    pub fn finish(&mut self) {
        if let Mode::Bar(state) = &mut self.mode {
            if let Some((bar, _)) = state.take() {
                bar.finish_and_clear();
            }
        }
    }

    /// Raw output stream, for commands whose result is the data itself.
    pub fn sink(&mut self) -> &mut (dyn Write + 'a) {
        self.finish();
        &mut *self.out
    }

    /// Print a result line, e.g. "Saved 10 bytes to out/a.txt".
    pub fn message(&mut self, line: &str) {
        self.finish();
        if let Err(error) = writeln!(self.out, "{line}") {
            tracing::debug!("failed writing output: {}", &error);
        }
    }
}

impl Drop for Reporter<'_> {
    fn drop(&mut self) {
        self.finish();
        let _ = self.out.flush();
    }
}

fn new_bar(total: u64, label: &str) -> indicatif::ProgressBar {
    let style = indicatif::ProgressStyle::with_template("{percent:>3}% [{bar:50}] {msg}")
        .map(|style| style.progress_chars("= "))
        .unwrap_or_else(|_| indicatif::ProgressStyle::default_bar());
    let bar = indicatif::ProgressBar::new(total);
    bar.set_style(style);
    bar.set_message(label.to_string());
    bar
}

/// Totals accumulated by transfer operations.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct Summary {
    pub bytes_transferred: u64,
    pub files_transferred: usize,
    pub directories_created: usize,
    pub files_removed: usize,
    pub entries_failed: usize,
}

impl std::ops::Add for Summary {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            bytes_transferred: self.bytes_transferred + other.bytes_transferred,
            files_transferred: self.files_transferred + other.files_transferred,
            directories_created: self.directories_created + other.directories_created,
            files_removed: self.files_removed + other.files_removed,
            entries_failed: self.entries_failed + other.entries_failed,
        }
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "bytes transferred: {}\n\
            files transferred: {}\n\
            directories created: {}\n\
            files removed: {}\n\
            entries failed: {}",
            bytesize::ByteSize(self.bytes_transferred),
            self.files_transferred,
            self.directories_created,
            self.files_removed,
            self.entries_failed,
        )
    }
}
