//! Error types for the ingestion engine
//!
//! Every variant renders as a complete, user-facing sentence because the
//! engine forwards errors verbatim to the progress sink.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for ingestion operations
pub type Result<T> = std::result::Result<T, LoadError>;

/// Errors raised while loading a directory
#[derive(Error, Debug)]
pub enum LoadError {
    /// Could not open a connection to the server
    #[error("Connection to {target} failed: {source}")]
    Connect {
        target: String,
        #[source]
        source: sqlx::Error,
    },

    /// Connection attempt exceeded the configured timeout
    #[error("Connection to {target} timed out after {}s", timeout.as_secs_f32())]
    ConnectTimeout { target: String, timeout: Duration },

    /// Schema name has no usable characters once sanitized
    #[error("Invalid schema name '{0}': it contains no letters, digits or underscores")]
    InvalidSchema(String),

    /// Source directory could not be listed
    #[error("Cannot read source directory '{}': {source}", path.display())]
    SourceDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A source file could not be parsed
    #[error("Failed to parse '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// A data row has more fields than the header
    #[error(
        "Failed to parse '{}': line {line} has {found} fields, expected at most {expected}",
        path.display()
    )]
    TooManyFields {
        path: PathBuf,
        line: u64,
        expected: usize,
        found: usize,
    },

    /// SQL or protocol error from PostgreSQL
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Invalid loader or connection settings
    #[error(transparent)]
    Config(#[from] csv2pg_common::CommonError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The run was cancelled by the caller
    #[error("Cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LoadError {
    /// Errors that end the whole run rather than a single file.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LoadError::Connect { .. }
                | LoadError::ConnectTimeout { .. }
                | LoadError::InvalidSchema(_)
                | LoadError::SourceDirectory { .. }
                | LoadError::Config(_)
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}
