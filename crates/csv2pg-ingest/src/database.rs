//! Database collaborator traits
//!
//! The engine talks to the database only through [`Connector`] and
//! [`Session`]. [`crate::postgres`] implements them on `sqlx`; tests use an
//! in-memory fake.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use csv2pg_common::identifier::{ColumnSet, SafeIdentifier};
use csv2pg_common::ConnectionConfig;

use crate::error::{LoadError, Result};

/// Opens the single connection a run works on
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn Session>>;
}

/// One open connection, owned exclusively by a run
#[async_trait]
pub trait Session: Send {
    /// `CREATE SCHEMA IF NOT EXISTS`, committed immediately.
    async fn ensure_schema(&mut self, schema: &SafeIdentifier) -> Result<()>;

    /// Drop, recreate and fill `target` inside one transaction.
    ///
    /// Either the new table with all `rows` is committed, or the transaction
    /// is rolled back and the previous state stays visible. Returns the
    /// number of rows the server accepted.
    async fn replace_table(
        &mut self,
        target: &TableTarget<'_>,
        rows: &[Vec<String>],
        cancel: &CancellationToken,
    ) -> Result<u64>;

    /// Release the connection.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// A table to (re)create, with its columns in row order
#[derive(Debug, Clone, Copy)]
pub struct TableTarget<'a> {
    pub schema: &'a SafeIdentifier,
    pub table: &'a SafeIdentifier,
    pub columns: &'a ColumnSet,
}

impl TableTarget<'_> {
    /// `"schema"."table"`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema.quoted(), self.table.quoted())
    }

    /// `schema.table`, for messages
    pub fn display_name(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }

    /// Dependent views and foreign keys go with the table.
    pub fn drop_sql(&self) -> String {
        format!("DROP TABLE IF EXISTS {} CASCADE", self.qualified_name())
    }

    pub fn create_sql(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(|c| format!("{} TEXT", c.name.quoted()))
            .collect::<Vec<_>>()
            .join(", ");
        format!("CREATE TABLE {} ({})", self.qualified_name(), columns)
    }

    pub fn copy_sql(&self) -> String {
        format!(
            "COPY {} ({}) FROM STDIN WITH (FORMAT csv, HEADER false, ENCODING 'UTF8')",
            self.qualified_name(),
            self.columns.quoted_list()
        )
    }
}

/// `CREATE SCHEMA IF NOT EXISTS "schema"`
pub fn create_schema_sql(schema: &SafeIdentifier) -> String {
    format!("CREATE SCHEMA IF NOT EXISTS {}", schema.quoted())
}

/// Encode rows as COPY CSV data
///
/// Every field is quoted, so an empty cell arrives as an empty string rather
/// than NULL and no value can be mistaken for the end-of-data marker.
pub fn encode_copy_rows(rows: &[Vec<String>]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .quote_style(csv::QuoteStyle::Always)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    for row in rows {
        writer
            .write_record(row)
            .map_err(|e| LoadError::internal(format!("failed to encode COPY row: {e}")))?;
    }

    writer
        .into_inner()
        .map_err(|e| LoadError::internal(format!("failed to flush COPY buffer: {e}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use csv2pg_common::sanitize;

    fn rows(data: &[&[&str]]) -> Vec<Vec<String>> {
        data.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_table_target_sql() {
        let schema = sanitize("My Schema!");
        let table = sanitize("Orders");
        let columns = ColumnSet::from_headers(&[Some("ID"), Some("Amount")]);
        let target = TableTarget {
            schema: &schema,
            table: &table,
            columns: &columns,
        };

        assert_eq!(target.qualified_name(), "\"my_schema\".\"orders\"");
        assert_eq!(target.display_name(), "my_schema.orders");
        assert_eq!(
            target.drop_sql(),
            "DROP TABLE IF EXISTS \"my_schema\".\"orders\" CASCADE"
        );
        assert_eq!(
            target.create_sql(),
            "CREATE TABLE \"my_schema\".\"orders\" (\"id\" TEXT, \"amount\" TEXT)"
        );
        assert_eq!(
            target.copy_sql(),
            "COPY \"my_schema\".\"orders\" (\"id\", \"amount\") FROM STDIN \
             WITH (FORMAT csv, HEADER false, ENCODING 'UTF8')"
        );
        assert_eq!(
            create_schema_sql(&schema),
            "CREATE SCHEMA IF NOT EXISTS \"my_schema\""
        );
    }

    #[test]
    fn test_encode_quotes_every_field() {
        let data = rows(&[&["1", ""], &["2", "say \"hi\""], &["3", "a,b\nc"]]);
        let encoded = String::from_utf8(encode_copy_rows(&data).unwrap()).unwrap();
        assert_eq!(
            encoded,
            "\"1\",\"\"\n\"2\",\"say \"\"hi\"\"\"\n\"3\",\"a,b\nc\"\n"
        );
    }

    #[test]
    fn test_encode_end_of_data_marker_is_quoted() {
        let data = rows(&[&["\\."]]);
        let encoded = encode_copy_rows(&data).unwrap();
        assert_eq!(encoded, b"\"\\.\"\n");
    }

    #[test]
    fn test_encode_no_rows() {
        assert!(encode_copy_rows(&[]).unwrap().is_empty());
    }
}
