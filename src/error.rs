//! Error types for the fteload transformation pipeline.
//!
//! One error enum per concern:
//!
//! - [`DecodeError`] - upload decoding (format selection, CSV, workbook)
//! - [`SanitizeError`] - field sanitation and required-column checks
//! - [`ReshapeError`] - fiscal column parsing and relabeling
//! - [`PipelineError`] - top-level orchestration errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries. Every variant is
//! recoverable at single-file granularity: the orchestrator catches the
//! top-level error, logs it, and reports a per-file failure without
//! aborting the batch.

use chrono::NaiveDate;
use thiserror::Error;

// =============================================================================
// Decode Errors
// =============================================================================

/// Errors while decoding an uploaded file into a table.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Filename extension matched neither "csv" nor "xls".
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// Transport payload was not valid base64.
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    /// File contained no bytes at all.
    #[error("file is empty")]
    EmptyFile,

    /// No usable header row.
    #[error("no header row found")]
    NoHeaders,

    /// CSV reader failure (malformed quoting, IO).
    #[error("invalid CSV: {0}")]
    Csv(#[from] csv::Error),

    /// Spreadsheet container could not be opened or read.
    #[error("cannot read workbook: {0}")]
    Workbook(String),

    /// Workbook contained no worksheets.
    #[error("workbook has no worksheets")]
    NoWorksheet,
}

// =============================================================================
// Sanitize Errors
// =============================================================================

/// Errors during field sanitation.
#[derive(Debug, Error)]
pub enum SanitizeError {
    /// A required column is absent from the parsed table.
    #[error("missing required column: {0}")]
    MissingColumn(String),

    /// A field could not be coerced to its expected type after
    /// noise stripping.
    #[error("column '{column}' has malformed value '{value}'")]
    MalformedValue { column: String, value: String },
}

// =============================================================================
// Reshape Errors
// =============================================================================

/// Errors while reshaping fiscal-period columns to calendar dates.
#[derive(Debug, Error)]
pub enum ReshapeError {
    /// A column starting with the fiscal-year marker did not parse as
    /// `FY<yy>, FM<m>`.
    #[error("fiscal column label '{0}' does not parse as 'FY<yy>, FM<m>'")]
    InvalidLabel(String),

    /// An hour cell was non-numeric after unit stripping.
    #[error("column '{column}' has non-numeric hours value '{value}'")]
    MalformedHours { column: String, value: String },

    /// Two fiscal-period labels resolved to the same calendar date.
    #[error("fiscal columns '{first}' and '{second}' both resolve to {date}")]
    AmbiguousPeriod {
        first: String,
        second: String,
        date: NaiveDate,
    },
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
///
/// This is the error type carried in a [`crate::models::FileOutcome`].
/// It wraps all lower-level errors and adds pipeline-specific variants.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Upload decoding error.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Field sanitation error.
    #[error("sanitize error: {0}")]
    Sanitize(#[from] SanitizeError),

    /// Fiscal reshaping error.
    #[error("reshape error: {0}")]
    Reshape(#[from] ReshapeError),

    /// Decoded file had a header but no data rows.
    #[error("file contains no data rows")]
    EmptyInput,
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for decode operations.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Result type for sanitize operations.
pub type SanitizeResult<T> = Result<T, SanitizeError>;

/// Result type for reshape operations.
pub type ReshapeResult<T> = Result<T, ReshapeError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
