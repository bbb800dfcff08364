//! # fteload - WBS resource-loading exports to FTE staffing tables
//!
//! fteload ingests project-schedule resource-loading reports (CSV or Excel,
//! keyed by Work Breakdown Structure) and derives normalized, time-bucketed
//! workload metrics expressed as Full-Time-Equivalent staffing.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ Export file │────▶│   Decode    │────▶│  Transform  │────▶│  FTE table  │
//! │  (csv/xls)  │     │ (enc. auto) │     │ (5 stages)  │     │ (projected) │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use fteload::{process_batch, PipelineOptions, UploadedFile};
//! use std::path::Path;
//!
//! let files = vec![UploadedFile::from_path(Path::new("export.csv"))?];
//! for outcome in process_batch(&files, &PipelineOptions::default(), None) {
//!     match outcome.result {
//!         Ok(table) => println!("{} rows", table.len()),
//!         Err(_) => eprintln!("{}", outcome.error_message().unwrap_or_default()),
//!     }
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - per-concern error types
//! - [`models`] - tables, uploads, batch outcomes
//! - [`decode`] - bytes to tables (CSV / spreadsheet / base64 transport)
//! - [`transform`] - sanitation, reshaping, aggregation, hierarchy, joins
//! - [`render`] - tables to CSV or text with per-call formatting

// Core modules
pub mod error;
pub mod models;

// Decoding
pub mod decode;

// Transformation
pub mod transform;

// Rendering
pub mod render;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{DecodeError, PipelineError, ReshapeError, SanitizeError};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{FileOutcome, Table, UploadedFile, USER_ERROR_MESSAGE};

// =============================================================================
// Re-exports - Decoding
// =============================================================================

pub use decode::{decode_data_url, decode_table, detect_encoding, FileFormat};

// =============================================================================
// Re-exports - Transformation
// =============================================================================

pub use transform::aggregate::{
    aggregate, aggregate_all, Aggregate, AggregateSet, BucketKind, Capacity,
    DEFAULT_HOURS_PER_MONTH, FTE_SUFFIX,
};
pub use transform::category::{join_categories, CategoryLookup};
pub use transform::fiscal::{
    fiscal_columns, fiscal_quarter, fiscal_year, reshape, FiscalPeriod, HourMatrix,
};
pub use transform::pipeline::{
    process_batch, process_data_url, process_file, PipelineOptions, ReportVariant, Stage,
    IDENTITY_COLUMNS, REQUIRED_COLUMNS,
};
pub use transform::sanitize::{
    parse_unit_hours, sanitize, sanitize_with_rules, strip_noise, FieldKind, FieldRule,
    DEFAULT_RULES,
};
pub use transform::wbs::{derive_levels, filter_level3, level_prefix, LEVEL_WIDTHS};

// =============================================================================
// Re-exports - Rendering
// =============================================================================

pub use render::{format_cell, to_csv, to_text, RenderOptions};
