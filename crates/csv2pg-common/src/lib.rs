//! csv2pg Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, identifier handling, and logging for the csv2pg workspace.
//!
//! # Overview
//!
//! - **Identifiers**: [`identifier::sanitize`] turns arbitrary file names and
//!   CSV headers into safe PostgreSQL identifiers
//! - **Connection settings**: [`ConnectionConfig`]
//! - **Error Handling**: [`CommonError`] and the [`Result`] alias
//! - **Logging**: [`logging::init_logging`]
//!
//! # Example
//!
//! ```
//! use csv2pg_common::identifier::{sanitize, ColumnSet};
//!
//! assert_eq!(sanitize("My Schema!").as_str(), "my_schema");
//!
//! let columns = ColumnSet::from_headers(&[Some("Name"), Some("name"), None]);
//! let names: Vec<&str> = columns.names().collect();
//! assert_eq!(names, ["name", "name_1", "col_2"]);
//! ```

pub mod connection;
pub mod error;
pub mod identifier;
pub mod logging;

// Re-export commonly used types
pub use connection::ConnectionConfig;
pub use error::{CommonError, Result};
pub use identifier::{sanitize, try_sanitize, SafeIdentifier};
