//! Tabular source readers
//!
//! A reader turns one file into headers plus rows of text cells. Nothing is
//! typed or coerced; every cell is loaded as `TEXT`.

use std::path::Path;

use crate::error::{LoadError, Result};

/// Parsed contents of one source file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedTable {
    /// Header cells in file order; `None` for a blank header
    pub headers: Vec<Option<String>>,
    /// Data rows, each padded to exactly `headers.len()` cells
    pub rows: Vec<Vec<String>>,
}

impl ParsedTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    /// No data rows (a header line alone counts as empty).
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Reads a source file into a [`ParsedTable`]
///
/// Called from a blocking thread, so implementations may do synchronous IO.
pub trait TableReader: Send + Sync {
    fn read(&self, path: &Path) -> Result<ParsedTable>;
}

/// Delimited-text reader backed by the `csv` crate
///
/// The first record is the header. Short data rows are padded with empty
/// cells; a row with more fields than the header fails the whole file.
#[derive(Debug, Clone)]
pub struct CsvReader {
    delimiter: u8,
}

impl Default for CsvReader {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

impl CsvReader {
    pub fn new(delimiter: u8) -> Self {
        Self { delimiter }
    }

    /// Parse from any `Read`; `path` is only used in error messages.
    pub fn read_from<R: std::io::Read>(&self, input: R, path: &Path) -> Result<ParsedTable> {
        let to_read_error = |source: csv::Error| LoadError::Read {
            path: path.to_path_buf(),
            source,
        };

        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .delimiter(self.delimiter)
            .from_reader(input);

        let headers = rdr
            .headers()
            .map_err(to_read_error)?
            .iter()
            .map(|h| {
                let h = h.trim_start_matches('\u{feff}');
                (!h.trim().is_empty()).then(|| h.to_string())
            })
            .collect::<Vec<_>>();
        let width = headers.len();

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record.map_err(to_read_error)?;
            if record.len() > width {
                return Err(LoadError::TooManyFields {
                    path: path.to_path_buf(),
                    line: record.position().map_or(0, |p| p.line()),
                    expected: width,
                    found: record.len(),
                });
            }
            let mut row: Vec<String> = record.iter().map(str::to_string).collect();
            row.resize(width, String::new());
            rows.push(row);
        }

        Ok(ParsedTable { headers, rows })
    }
}

impl TableReader for CsvReader {
    fn read(&self, path: &Path) -> Result<ParsedTable> {
        let file = std::fs::File::open(path)?;
        self.read_from(std::io::BufReader::new(file), path)
    }
}
