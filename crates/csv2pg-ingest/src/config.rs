//! Loader options
//!
//! Connection settings live in [`csv2pg_common::ConnectionConfig`]; this is
//! everything else that shapes a run.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use csv2pg_common::CommonError;

// ============================================================================
// Loader Defaults
// ============================================================================

/// File extension picked up from the source directory.
pub const DEFAULT_EXTENSION: &str = "csv";

/// Field delimiter of source files.
pub const DEFAULT_DELIMITER: u8 = b',';

/// Rows encoded per COPY data message.
pub const DEFAULT_BATCH_ROWS: usize = 10_000;

/// Timeout for the pre-flight connectivity probe.
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 5;

/// Options for one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadOptions {
    /// Extension filter, without the dot; matched case-insensitively
    pub extension: String,

    pub delimiter: u8,

    /// Rows per COPY chunk; cancellation is checked between chunks
    pub batch_rows: usize,

    /// Limit on opening the run's connection (None = driver default)
    pub connect_timeout: Option<Duration>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            extension: DEFAULT_EXTENSION.to_string(),
            delimiter: DEFAULT_DELIMITER,
            batch_rows: DEFAULT_BATCH_ROWS,
            connect_timeout: None,
        }
    }
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_batch_rows(mut self, batch_rows: usize) -> Self {
        self.batch_rows = batch_rows;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Validate options
    pub fn validate(&self) -> Result<(), CommonError> {
        if self.extension.is_empty() {
            return Err(CommonError::config("extension filter cannot be empty"));
        }

        if self.batch_rows == 0 {
            return Err(CommonError::config("batch_rows must be greater than 0"));
        }

        if matches!(self.delimiter, b'"' | b'\n' | b'\r') {
            return Err(CommonError::config(format!(
                "delimiter {:?} is not allowed",
                self.delimiter as char
            )));
        }

        if self.connect_timeout == Some(Duration::ZERO) {
            return Err(CommonError::config("connect timeout must be greater than 0"));
        }

        Ok(())
    }
}

/// Parse a single-byte delimiter; `\t` and `tab` mean a tab.
pub fn parse_delimiter(raw: &str) -> Result<u8, CommonError> {
    match raw {
        "\\t" | "tab" | "\t" => Ok(b'\t'),
        s if s.len() == 1 => Ok(s.as_bytes()[0]),
        _ => Err(CommonError::config(format!(
            "delimiter must be a single ASCII character, got '{raw}'"
        ))),
    }
}
