//! Ingestion engine
//!
//! One [`Engine::run`] loads every matching file in a directory into its own
//! table. The run is sequential and works on a single connection:
//!
//! 1. resolve the schema name (fatal if nothing usable remains)
//! 2. connect (fatal on failure)
//! 3. `CREATE SCHEMA IF NOT EXISTS`
//! 4. discover source files
//! 5. per file: name the table, parse, skip if empty, then drop, create and
//!    COPY inside one transaction
//! 6. report the summary and close the connection
//!
//! Only steps 1-4 can end the run early. Anything that goes wrong with a
//! single file is reported and the loop moves on.

use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use csv2pg_common::identifier::{ColumnSet, UniqueNames};
use csv2pg_common::{sanitize, try_sanitize, ConnectionConfig, SafeIdentifier};

use crate::config::LoadOptions;
use crate::database::{Connector, Session, TableTarget};
use crate::error::{LoadError, Result};
use crate::postgres::PgConnector;
use crate::progress::ProgressSink;
use crate::reader::{CsvReader, ParsedTable, TableReader};
use crate::source::{discover_sources, SourceFile};
use crate::summary::{FileOutcome, FileReport, RunSummary};

/// Sends progress lines to the sink and mirrors them into the `tracing` log.
struct Reporter<'a> {
    sink: &'a dyn ProgressSink,
}

impl Reporter<'_> {
    fn info(&self, line: &str) {
        debug!(target: "csv2pg::progress", "{line}");
        self.sink.emit(line);
    }

    fn warn(&self, line: &str) {
        warn!(target: "csv2pg::progress", "{line}");
        self.sink.emit(line);
    }

    fn error(&self, line: &str) {
        error!(target: "csv2pg::progress", "{line}");
        self.sink.emit(line);
    }
}

/// Drives runs against a [`Connector`] and a [`TableReader`]
pub struct Engine<C, R> {
    connector: C,
    reader: Arc<R>,
    options: LoadOptions,
    cancel: CancellationToken,
}

impl Engine<PgConnector, CsvReader> {
    /// PostgreSQL plus the CSV reader, configured from `options`.
    pub fn postgres(options: LoadOptions) -> Self {
        let connector = PgConnector::new(options.connect_timeout, options.batch_rows);
        let reader = CsvReader::new(options.delimiter);
        Self::new(connector, reader, options)
    }
}

impl<C, R> Engine<C, R>
where
    C: Connector,
    R: TableReader + 'static,
{
    pub fn new(connector: C, reader: R, options: LoadOptions) -> Self {
        Self {
            connector,
            reader: Arc::new(reader),
            options,
            cancel: CancellationToken::new(),
        }
    }

    /// Use `token` to stop runs from outside.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// A handle that cancels this engine's runs.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Load every matching file under `source_dir` into schema `schema_raw`.
    ///
    /// Never fails: fatal problems are reported through `progress` and show
    /// up as [`crate::RunStatus::Aborted`] in the summary.
    #[instrument(skip_all, fields(dir = %source_dir.display(), schema = schema_raw))]
    pub async fn run(
        &self,
        config: ConnectionConfig,
        schema_raw: &str,
        source_dir: &Path,
        progress: &dyn ProgressSink,
    ) -> RunSummary {
        let reporter = Reporter { sink: progress };

        if let Err(e) = self.options.validate() {
            return abort(&reporter, None, LoadError::from(e));
        }

        let Some(schema) = try_sanitize(schema_raw) else {
            return abort(&reporter, None, LoadError::InvalidSchema(schema_raw.to_string()));
        };
        if schema.as_str() != schema_raw {
            reporter.info(&format!("Schema name '{schema_raw}' resolved to '{schema}'."));
        }

        reporter.info(&format!(
            "Connecting to PostgreSQL at {} as {}...",
            config.display_target(),
            config.user
        ));
        let mut session = match self.connector.connect(&config).await {
            Ok(session) => session,
            Err(e) => return abort(&reporter, Some(schema), e),
        };
        reporter.info("Connected.");

        let summary = self
            .run_session(session.as_mut(), &schema, source_dir, &reporter)
            .await;

        match session.close().await {
            Ok(()) => reporter.info("Connection closed."),
            Err(e) => reporter.warn(&format!(
                "Warning: the connection did not close cleanly: {e}"
            )),
        }

        summary
    }

    async fn run_session(
        &self,
        session: &mut dyn Session,
        schema: &SafeIdentifier,
        source_dir: &Path,
        reporter: &Reporter<'_>,
    ) -> RunSummary {
        reporter.info(&format!("Ensuring schema '{schema}' exists..."));
        if let Err(e) = session.ensure_schema(schema).await {
            return abort(reporter, Some(schema.clone()), e);
        }
        reporter.info(&format!("Schema '{schema}' is ready."));

        let extension = &self.options.extension;
        let files = match discover_sources(source_dir, extension) {
            Ok(files) => files,
            Err(e) => return abort(reporter, Some(schema.clone()), e),
        };

        if files.is_empty() {
            reporter.info(&format!(
                "No .{extension} files found in '{}'.",
                source_dir.display()
            ));
        } else {
            reporter.info(&format!(
                "Found {} .{extension} file(s) in '{}'.",
                files.len(),
                source_dir.display()
            ));
        }

        let total = files.len();
        let mut table_names = UniqueNames::new();
        let mut reports = Vec::with_capacity(total);
        let mut cancelled = false;

        for (index, file) in files.iter().enumerate() {
            if self.cancel.is_cancelled() {
                reporter.warn(&format!(
                    "Cancelled: {} file(s) not processed.",
                    total - index
                ));
                cancelled = true;
                break;
            }

            let report = self
                .load_file(session, schema, file, index + 1, total, &mut table_names, reporter)
                .await;
            let stop = report.outcome == FileOutcome::Cancelled;
            reports.push(report);
            if stop {
                cancelled = true;
                break;
            }
        }

        let summary = RunSummary::from_reports(schema.clone(), total, reports, cancelled);
        info!(
            status = ?summary.status,
            total = summary.total_files,
            succeeded = summary.succeeded,
            skipped = summary.skipped,
            failed = summary.failed,
            rows = summary.rows_loaded,
            "Run finished"
        );
        reporter.info(&summary.describe());
        summary
    }

    #[allow(clippy::too_many_arguments)]
    async fn load_file(
        &self,
        session: &mut dyn Session,
        schema: &SafeIdentifier,
        file: &SourceFile,
        ordinal: usize,
        total: usize,
        table_names: &mut UniqueNames,
        reporter: &Reporter<'_>,
    ) -> FileReport {
        let name = file.display_name();
        let table = resolve_table_name(file, ordinal, table_names, reporter);
        reporter.info(&format!(
            "[{ordinal}/{total}] {name} -> {schema}.{table}"
        ));

        let outcome = self
            .transfer(session, schema, &table, file, reporter)
            .await;

        match &outcome {
            FileOutcome::Loaded { rows } => {
                info!(file = %name, table = %table, rows, "Loaded file");
                reporter.info(&format!(
                    "[{ordinal}/{total}] {name}: loaded {rows} row(s) into {schema}.{table}"
                ));
            }
            FileOutcome::SkippedEmpty => {
                reporter.warn(&format!(
                    "[{ordinal}/{total}] {name}: skipped, no data rows"
                ));
            }
            FileOutcome::Failed { cause } => {
                warn!(file = %name, table = %table, cause = %cause, "File failed");
                reporter.error(&format!("[{ordinal}/{total}] {name}: failed: {cause}"));
            }
            FileOutcome::Cancelled => {
                reporter.warn(&format!(
                    "[{ordinal}/{total}] {name}: cancelled, changes rolled back"
                ));
            }
        }

        FileReport {
            source: file.path.clone(),
            table,
            outcome,
        }
    }

    async fn transfer(
        &self,
        session: &mut dyn Session,
        schema: &SafeIdentifier,
        table: &SafeIdentifier,
        file: &SourceFile,
        reporter: &Reporter<'_>,
    ) -> FileOutcome {
        let parsed = match self.parse(file).await {
            Ok(parsed) => parsed,
            Err(e) => {
                reporter.error(&format!("  Error: {e}"));
                return FileOutcome::Failed {
                    cause: e.to_string(),
                };
            }
        };

        if parsed.is_empty() {
            return FileOutcome::SkippedEmpty;
        }

        let columns = ColumnSet::from_headers(&parsed.headers);
        let target = TableTarget {
            schema,
            table,
            columns: &columns,
        };
        reporter.info(&format!(
            "  Recreating {} with {} text column(s) and copying {} row(s)...",
            target.display_name(),
            columns.len(),
            parsed.row_count()
        ));

        match session
            .replace_table(&target, &parsed.rows, &self.cancel)
            .await
        {
            Ok(rows) => FileOutcome::Loaded { rows },
            Err(LoadError::Cancelled) => FileOutcome::Cancelled,
            Err(e) => {
                reporter.error(&format!(
                    "  Error: loading {} failed and was rolled back: {e}",
                    target.display_name()
                ));
                FileOutcome::Failed {
                    cause: e.to_string(),
                }
            }
        }
    }

    async fn parse(&self, file: &SourceFile) -> Result<ParsedTable> {
        let reader = Arc::clone(&self.reader);
        let path = file.path.clone();
        tokio::task::spawn_blocking(move || reader.read(&path))
            .await
            .map_err(|e| LoadError::internal(format!("reader task failed: {e}")))?
    }
}

/// Table name for `file`, unique within the run.
///
/// Base names with no usable characters fall back to `table_<ordinal>`.
fn resolve_table_name(
    file: &SourceFile,
    ordinal: usize,
    names: &mut UniqueNames,
    reporter: &Reporter<'_>,
) -> SafeIdentifier {
    match try_sanitize(&file.base_name) {
        Some(base) => {
            let claimed = names.claim(base.clone());
            if claimed != base {
                reporter.warn(&format!(
                    "  Table name '{base}' is already used in this run; using '{claimed}'."
                ));
            }
            claimed
        }
        None => {
            let claimed = names.claim(sanitize(&format!("table_{ordinal}")));
            reporter.warn(&format!(
                "  File name '{}' has no usable characters; using table name '{claimed}'.",
                file.display_name()
            ));
            claimed
        }
    }
}

fn abort(reporter: &Reporter<'_>, schema: Option<SafeIdentifier>, err: LoadError) -> RunSummary {
    error!(error = %err, fatal = err.is_fatal(), "Run aborted");
    let summary = RunSummary::aborted(schema, &err);
    reporter.error(&summary.describe());
    summary
}
