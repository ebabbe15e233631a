//! Progress reporting
//!
//! The engine reports every step as a human-readable line through a
//! [`ProgressSink`]. Lines arrive in order, from the task running the load.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

/// Receives status lines from a run
pub trait ProgressSink: Send + Sync {
    fn emit(&self, line: &str);
}

impl<F> ProgressSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn emit(&self, line: &str) {
        self(line)
    }
}

/// Collects lines in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|line| line.contains(needle))
    }
}

impl ProgressSink for MemorySink {
    fn emit(&self, line: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.to_string());
        }
    }
}

/// Forwards lines over a tokio channel, for hosts that render elsewhere
///
/// A closed receiver is ignored; the load keeps running.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: UnboundedSender<String>,
}

impl ChannelSink {
    pub fn new(tx: UnboundedSender<String>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelSink {
    fn emit(&self, line: &str) {
        let _ = self.tx.send(line.to_string());
    }
}

/// Writes lines to the `tracing` log at info level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn emit(&self, line: &str) {
        tracing::info!(target: "csv2pg::progress", "{line}");
    }
}

/// Terminal sink: prints each line on stdout above a spinner showing the
/// latest status
///
/// indicatif hides the spinner when stdout is not a terminal, leaving a
/// plain line log.
pub struct ConsoleSink {
    spinner: ProgressBar,
}

impl ConsoleSink {
    pub fn new() -> Self {
        let spinner = ProgressBar::with_draw_target(None, ProgressDrawTarget::stdout());
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            spinner.set_style(style);
        }
        spinner.enable_steady_tick(Duration::from_millis(100));
        Self { spinner }
    }

    /// Stop and clear the spinner.
    pub fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for ConsoleSink {
    fn emit(&self, line: &str) {
        if self.spinner.is_hidden() {
            println!("{line}");
        } else {
            self.spinner.println(line);
            self.spinner.set_message(line.trim().to_string());
        }
    }
}
