//! Domain models for the fteload pipeline.
//!
//! - [`Table`] - the ordered-column tabular value every stage passes forward
//! - [`UploadedFile`] - one file of a batch, with its upload metadata
//! - [`FileOutcome`] - the per-file result of a pipeline run

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::path::Path;

use crate::error::PipelineError;

/// User-facing message for a file the pipeline could not process.
/// The underlying cause is logged, never surfaced to the table view.
pub const USER_ERROR_MESSAGE: &str = "There was an error processing this file.";

// =============================================================================
// Table
// =============================================================================

/// A rectangular table with an explicit column order.
///
/// Rows are JSON objects keyed by column name, the same representation the
/// decoders produce. Column order is carried on the table itself; it is never
/// inferred from map iteration order.
#[derive(Debug, Clone, Default)]
pub struct Table {
    /// Column names, in presentation order.
    pub columns: Vec<String>,
    /// One JSON object per row. Cells absent from a row read as null.
    pub rows: Vec<Map<String, Value>>,
}

impl Table {
    /// Create an empty table with the given column order.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Number of data rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Register a column at the end of the order if it is not already present.
    pub fn add_column(&mut self, name: &str) {
        if !self.has_column(name) {
            self.columns.push(name.to_string());
        }
    }

    /// Cell value, or `None` when the row or column does not exist.
    pub fn cell(&self, row: usize, column: &str) -> Option<&Value> {
        self.rows.get(row).and_then(|r| r.get(column))
    }

    /// Cell as a string slice, when present and textual.
    pub fn cell_str(&self, row: usize, column: &str) -> Option<&str> {
        self.cell(row, column).and_then(Value::as_str)
    }

    /// Which of `required` are not present, preserving `required` order.
    pub fn missing_columns(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|name| !self.has_column(name))
            .map(|name| name.to_string())
            .collect()
    }
}

// =============================================================================
// Upload metadata
// =============================================================================

/// One uploaded file: raw bytes plus the metadata the upload collaborator
/// supplies alongside them.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Original filename; its extension selects the decoder.
    pub filename: String,
    /// Upload timestamp, when the collaborator provides one.
    pub uploaded_at: Option<DateTime<Utc>>,
    /// Raw file contents (already transport-decoded).
    pub contents: Vec<u8>,
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, contents: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            uploaded_at: None,
            contents,
        }
    }

    pub fn with_timestamp(mut self, uploaded_at: DateTime<Utc>) -> Self {
        self.uploaded_at = Some(uploaded_at);
        self
    }

    /// Read a local file, using its modification time as the upload timestamp.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let contents = std::fs::read(path)?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let uploaded_at = std::fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from);
        Ok(Self {
            filename,
            uploaded_at,
            contents,
        })
    }
}

// =============================================================================
// Batch outcome
// =============================================================================

/// Result of running the pipeline on one file of a batch.
///
/// A batch is a `Vec<FileOutcome>` in submission order; one file failing
/// never removes the others from the output.
#[derive(Debug)]
pub struct FileOutcome {
    pub filename: String,
    pub uploaded_at: Option<DateTime<Utc>>,
    pub result: Result<Table, PipelineError>,
}

impl FileOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    /// The user-facing message for a failed file, `None` on success.
    pub fn error_message(&self) -> Option<&'static str> {
        self.result.as_ref().err().map(|_| USER_ERROR_MESSAGE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_missing_columns_preserves_order() {
        let table = Table::new(vec!["a".into(), "c".into()]);
        let missing = table.missing_columns(&["a", "b", "c", "d"]);
        assert_eq!(missing, vec!["b".to_string(), "d".to_string()]);
    }

    #[test]
    fn test_add_column_is_idempotent() {
        let mut table = Table::new(vec!["a".into()]);
        table.add_column("b");
        table.add_column("b");
        assert_eq!(table.columns, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_cell_access() {
        let mut table = Table::new(vec!["name".into(), "hours".into()]);
        table
            .rows
            .push(row(&[("name", json!("Alice")), ("hours", json!(12.5))]));

        assert_eq!(table.cell_str(0, "name"), Some("Alice"));
        assert_eq!(table.cell(0, "hours").and_then(Value::as_f64), Some(12.5));
        assert_eq!(table.cell(0, "absent"), None);
        assert_eq!(table.cell(1, "name"), None);
    }

    #[test]
    fn test_uploaded_file_from_path() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "a,b\n1,2\n").unwrap();

        let upload = UploadedFile::from_path(file.path()).unwrap();
        assert_eq!(upload.contents, b"a,b\n1,2\n");
        assert!(upload.uploaded_at.is_some());
        assert!(!upload.filename.is_empty());
    }

    #[test]
    fn test_outcome_error_message() {
        let ok = FileOutcome {
            filename: "a.csv".into(),
            uploaded_at: None,
            result: Ok(Table::default()),
        };
        assert!(ok.error_message().is_none());

        let failed = FileOutcome {
            filename: "b.csv".into(),
            uploaded_at: None,
            result: Err(PipelineError::EmptyInput),
        };
        assert_eq!(failed.error_message(), Some(USER_ERROR_MESSAGE));
    }
}
