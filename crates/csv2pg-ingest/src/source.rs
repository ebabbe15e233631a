//! Source file discovery

use std::path::{Path, PathBuf};

use crate::error::{LoadError, Result};

/// A file selected for loading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// File name without extension; the raw table name
    pub base_name: String,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let base_name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { path, base_name }
    }

    /// File name with extension, for messages.
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// List regular files in `dir` (non-recursive) whose extension matches
/// `extension`, ignoring case, sorted by file name.
pub fn discover_sources(dir: &Path, extension: &str) -> Result<Vec<SourceFile>> {
    let to_dir_error = |source: std::io::Error| LoadError::SourceDirectory {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(to_dir_error)? {
        let entry = entry.map_err(to_dir_error)?;
        let path = entry.path();

        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(extension));
        if matches && path.is_file() {
            files.push(SourceFile::new(path));
        }
    }

    files.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));
    Ok(files)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_discover_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.csv"), "x\n1\n").unwrap();
        fs::write(dir.path().join("A.CSV"), "x\n1\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        fs::create_dir(dir.path().join("nested.csv")).unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("c.csv"), "x\n1\n").unwrap();

        let files = discover_sources(dir.path(), "csv").unwrap();
        let names: Vec<String> = files.iter().map(SourceFile::display_name).collect();
        assert_eq!(names, ["A.CSV", "b.csv"]);
        assert_eq!(files[0].base_name, "A");
    }

    #[test]
    fn test_discover_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover_sources(dir.path(), "csv").unwrap().is_empty());
    }

    #[test]
    fn test_discover_missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        let err = discover_sources(&missing, "csv").unwrap_err();
        assert!(matches!(err, LoadError::SourceDirectory { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_source_file_names() {
        let file = SourceFile::new("/data/Sales Report.2024.csv");
        assert_eq!(file.base_name, "Sales Report.2024");
        assert_eq!(file.display_name(), "Sales Report.2024.csv");
    }
}
