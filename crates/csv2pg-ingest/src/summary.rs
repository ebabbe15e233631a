//! Per-file outcomes and the run summary

use serde::Serialize;
use std::path::PathBuf;

use csv2pg_common::SafeIdentifier;

use crate::error::LoadError;

/// What happened to one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FileOutcome {
    /// Table replaced and committed
    Loaded { rows: u64 },
    /// Parsed fine but had no data rows; the database was not touched
    SkippedEmpty,
    /// Parse or database failure; any database work was rolled back
    Failed { cause: String },
    /// Stopped mid-load by cancellation; rolled back
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReport {
    pub source: PathBuf,
    pub table: SafeIdentifier,
    #[serde(flatten)]
    pub outcome: FileOutcome,
}

/// How the run as a whole ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The directory held no matching files
    NoFiles,
    AllSucceeded,
    /// At least one file loaded and at least one did not
    Partial,
    /// Files were found but none loaded
    NoneSucceeded,
    Cancelled,
    /// A fatal error stopped the run before or between files
    Aborted,
}

/// Aggregate result of one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub status: RunStatus,
    pub schema: Option<SafeIdentifier>,
    pub total_files: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub rows_loaded: u64,
    pub files: Vec<FileReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunSummary {
    /// Classify a run that got as far as the file loop.
    ///
    /// `total_files` counts every discovered file, including ones never
    /// reached because the run was cancelled.
    pub fn from_reports(
        schema: SafeIdentifier,
        total_files: usize,
        files: Vec<FileReport>,
        cancelled: bool,
    ) -> Self {
        let mut succeeded = 0;
        let mut skipped = 0;
        let mut failed = 0;
        let mut rows_loaded = 0;

        for report in &files {
            match report.outcome {
                FileOutcome::Loaded { rows } => {
                    succeeded += 1;
                    rows_loaded += rows;
                }
                FileOutcome::SkippedEmpty => skipped += 1,
                FileOutcome::Failed { .. } | FileOutcome::Cancelled => failed += 1,
            }
        }

        let status = if cancelled {
            RunStatus::Cancelled
        } else if total_files == 0 {
            RunStatus::NoFiles
        } else if succeeded == total_files {
            RunStatus::AllSucceeded
        } else if succeeded == 0 {
            RunStatus::NoneSucceeded
        } else {
            RunStatus::Partial
        };

        Self {
            status,
            schema: Some(schema),
            total_files,
            succeeded,
            skipped,
            failed,
            rows_loaded,
            files,
            error: None,
        }
    }

    /// A run stopped by a fatal error before any file was processed.
    pub fn aborted(schema: Option<SafeIdentifier>, error: &LoadError) -> Self {
        Self {
            status: RunStatus::Aborted,
            schema,
            total_files: 0,
            succeeded: 0,
            skipped: 0,
            failed: 0,
            rows_loaded: 0,
            files: Vec::new(),
            error: Some(error.to_string()),
        }
    }

    /// The final progress line.
    pub fn describe(&self) -> String {
        let schema = self
            .schema
            .as_ref()
            .map(SafeIdentifier::as_str)
            .unwrap_or("?");

        match self.status {
            RunStatus::NoFiles => "Done: no source files found, nothing was loaded.".to_string(),
            RunStatus::AllSucceeded => format!(
                "Done: all {} file(s) loaded into schema '{}' ({} row(s)).",
                self.total_files, schema, self.rows_loaded
            ),
            RunStatus::Partial => format!(
                "Done: {}/{} file(s) loaded into schema '{}' ({} skipped, {} failed, {} row(s)).",
                self.succeeded,
                self.total_files,
                schema,
                self.skipped,
                self.failed,
                self.rows_loaded
            ),
            RunStatus::NoneSucceeded => format!(
                "Done: none of the {} file(s) were loaded ({} skipped, {} failed).",
                self.total_files, self.skipped, self.failed
            ),
            RunStatus::Cancelled => format!(
                "Cancelled: {}/{} file(s) loaded before the run was stopped.",
                self.succeeded, self.total_files
            ),
            RunStatus::Aborted => format!(
                "Aborted: {}",
                self.error.as_deref().unwrap_or("unknown error")
            ),
        }
    }

    /// Process exit code for command-line hosts.
    ///
    /// 0 unless nothing could be loaded: 1 when every file failed or was
    /// skipped, 2 on a fatal error, 130 when cancelled.
    pub fn exit_code(&self) -> i32 {
        match self.status {
            RunStatus::NoFiles | RunStatus::AllSucceeded | RunStatus::Partial => 0,
            RunStatus::NoneSucceeded => 1,
            RunStatus::Aborted => 2,
            RunStatus::Cancelled => 130,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use csv2pg_common::sanitize;

    fn report(name: &str, outcome: FileOutcome) -> FileReport {
        FileReport {
            source: PathBuf::from(format!("{name}.csv")),
            table: sanitize(name),
            outcome,
        }
    }

    #[test]
    fn test_partial_run_with_empty_file() {
        let summary = RunSummary::from_reports(
            sanitize("staging"),
            2,
            vec![
                report("Empty", FileOutcome::SkippedEmpty),
                report("Orders", FileOutcome::Loaded { rows: 3 }),
            ],
            false,
        );

        assert_eq!(summary.status, RunStatus::Partial);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.rows_loaded, 3);
        assert_eq!(summary.exit_code(), 0);
        assert!(summary.describe().contains("1/2"));
    }

    #[test]
    fn test_status_classification() {
        let all = RunSummary::from_reports(
            sanitize("s"),
            1,
            vec![report("a", FileOutcome::Loaded { rows: 0 })],
            false,
        );
        assert_eq!(all.status, RunStatus::AllSucceeded);

        let none = RunSummary::from_reports(
            sanitize("s"),
            1,
            vec![report(
                "a",
                FileOutcome::Failed {
                    cause: "boom".into(),
                },
            )],
            false,
        );
        assert_eq!(none.status, RunStatus::NoneSucceeded);
        assert_eq!(none.exit_code(), 1);

        let empty = RunSummary::from_reports(sanitize("s"), 0, Vec::new(), false);
        assert_eq!(empty.status, RunStatus::NoFiles);
        assert_eq!(empty.exit_code(), 0);

        let cancelled = RunSummary::from_reports(
            sanitize("s"),
            3,
            vec![report("a", FileOutcome::Loaded { rows: 1 })],
            true,
        );
        assert_eq!(cancelled.status, RunStatus::Cancelled);
        assert_eq!(cancelled.exit_code(), 130);
        assert!(cancelled.describe().contains("1/3"));
    }

    #[test]
    fn test_aborted_summary() {
        let summary = RunSummary::aborted(None, &LoadError::InvalidSchema("!!!".into()));
        assert_eq!(summary.status, RunStatus::Aborted);
        assert_eq!(summary.exit_code(), 2);
        assert!(summary.describe().starts_with("Aborted: Invalid schema name '!!!'"));
    }

    #[test]
    fn test_json_shape() {
        let summary = RunSummary::from_reports(
            sanitize("staging"),
            1,
            vec![report("Orders", FileOutcome::Loaded { rows: 3 })],
            false,
        );
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["status"], "all_succeeded");
        assert_eq!(json["schema"], "staging");
        assert_eq!(json["files"][0]["table"], "orders");
        assert_eq!(json["files"][0]["outcome"], "loaded");
        assert_eq!(json["files"][0]["rows"], 3);
        assert!(json.get("error").is_none());
    }
}
