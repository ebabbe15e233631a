//! csv2pg Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Bulk-loads a directory of CSV files into PostgreSQL, one table per file,
//! streaming rows with `COPY ... FROM STDIN`.
//!
//! # Overview
//!
//! - **Engine**: [`Engine`] drives a run; [`run`] is the PostgreSQL + CSV
//!   shortcut with default options
//! - **Collaborators**: [`database::Connector`] / [`database::Session`] for
//!   the database, [`reader::TableReader`] for source files
//! - **Progress**: every step is reported as a line through a
//!   [`ProgressSink`]
//! - **Results**: [`RunSummary`] with one [`FileReport`] per file
//!
//! Each file is loaded in its own transaction. A file that fails to parse or
//! load is rolled back and reported; the run continues with the next file.
//! Only an unusable schema name, a failed connection or an unreadable source
//! directory stop the run.
//!
//! # Example
//!
//! ```no_run
//! use csv2pg_common::ConnectionConfig;
//! use csv2pg_ingest::progress::TracingSink;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ConnectionConfig::new().with_password("postgres");
//!     let summary = csv2pg_ingest::run(config, "staging", Path::new("./data"), &TracingSink).await;
//!     println!("{}", summary.describe());
//! }
//! ```

pub mod config;
pub mod database;
pub mod engine;
pub mod error;
pub mod postgres;
pub mod progress;
pub mod reader;
pub mod source;
pub mod summary;

use std::path::Path;

use csv2pg_common::ConnectionConfig;

// Re-export commonly used types
pub use config::LoadOptions;
pub use engine::Engine;
pub use error::{LoadError, Result};
pub use postgres::probe;
pub use progress::ProgressSink;
pub use summary::{FileOutcome, FileReport, RunStatus, RunSummary};

/// Load `source_dir` into `schema_raw` on PostgreSQL with default options.
pub async fn run(
    config: ConnectionConfig,
    schema_raw: &str,
    source_dir: &Path,
    progress: &dyn ProgressSink,
) -> RunSummary {
    Engine::postgres(LoadOptions::default())
        .run(config, schema_raw, source_dir, progress)
        .await
}
