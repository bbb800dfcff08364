//! Pipeline orchestration.
//!
//! One file moves through `Parsing -> Sanitizing -> Reshaping -> Aggregating
//! -> Joining -> Projecting`; any stage can drop it into a terminal failure
//! that is recoverable at batch level - the other files of the batch are
//! unaffected. Files in a batch share nothing mutable, so batch runs fan out
//! across threads while the output keeps submission order.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use tracing::{debug, error};

use crate::decode;
use crate::error::{PipelineError, PipelineResult, SanitizeError};
use crate::models::{FileOutcome, Table, UploadedFile};
use crate::transform::aggregate::{aggregate_all, AggregateSet, BucketKind, Capacity};
use crate::transform::category::{self, CategoryLookup};
use crate::transform::fiscal;
use crate::transform::sanitize;
use crate::transform::wbs;

/// Columns every schedule export must carry (fiscal-period columns are
/// discovered by pattern on top of these).
pub const REQUIRED_COLUMNS: &[&str] = &[
    "WBS Path",
    "WBS Name",
    "Activity ID",
    "Activity Name",
    "Resource Name",
    "Planned Units",
    "Remaining Units",
    "Start",
    "Finish",
    "Planned Duration",
    "Remaining Duration",
    "Actual Duration",
    "At Completion Duration",
];

/// Identity/hierarchy column order of the filtered projection.
pub const IDENTITY_COLUMNS: &[&str] = &[
    "L3",
    "L4",
    "L5",
    "WBS Name",
    "Activity ID",
    "Activity Name",
    "Resource Name",
    "Planned Units",
    "Remaining Units",
    "Start",
    "Finish",
    "Planned Duration",
    "Remaining Duration",
];

// =============================================================================
// Stages
// =============================================================================

/// Pipeline states. A file starts at `Idle`, walks the stages in order, and
/// ends at `Done` - or at the stage its error reports via
/// [`PipelineError::stage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Idle,
    Parsing,
    Sanitizing,
    Reshaping,
    Aggregating,
    Joining,
    Projecting,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::Parsing => "parsing",
            Stage::Sanitizing => "sanitizing",
            Stage::Reshaping => "reshaping",
            Stage::Aggregating => "aggregating",
            Stage::Joining => "joining",
            Stage::Projecting => "projecting",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

impl PipelineError {
    /// The stage this error arose in.
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Decode(_) => Stage::Parsing,
            PipelineError::EmptyInput => Stage::Parsing,
            PipelineError::Sanitize(_) => Stage::Sanitizing,
            PipelineError::Reshape(_) => Stage::Reshaping,
        }
    }
}

// =============================================================================
// Options
// =============================================================================

/// Which projection the pipeline emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportVariant {
    /// Fixed identity column order plus one aggregate's FTE columns.
    Filtered,
    /// Hierarchy keys, all sanitized columns, and every aggregate
    /// (hours and FTE).
    Wide,
}

/// Options for one pipeline invocation. All state the source held globally
/// (report scope, capacity) is an explicit per-call option here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOptions {
    /// Keep only rows under this level-3 code (e.g. "1.03"); `None` keeps
    /// everything.
    pub level3_filter: Option<String>,
    /// Per-person capacity used for FTE normalization.
    pub capacity: Capacity,
    /// Also derive the L6 key.
    pub deep_hierarchy: bool,
    /// Projection shape.
    pub variant: ReportVariant,
    /// Aggregate whose FTE columns the filtered projection carries.
    pub bucket: BucketKind,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            level3_filter: None,
            capacity: Capacity::default(),
            deep_hierarchy: false,
            variant: ReportVariant::Filtered,
            bucket: BucketKind::FiscalYear,
        }
    }
}

// =============================================================================
// Entry points
// =============================================================================

/// Run the pipeline on one uploaded file.
pub fn process_file(
    file: &UploadedFile,
    options: &PipelineOptions,
    lookup: Option<&CategoryLookup>,
) -> PipelineResult<Table> {
    debug!(file = %file.filename, stage = %Stage::Parsing, "decoding upload");
    let mut table = decode::decode_table(&file.contents, &file.filename)?;
    if table.is_empty() {
        return Err(PipelineError::EmptyInput);
    }
    if let Some(column) = table.missing_columns(REQUIRED_COLUMNS).into_iter().next() {
        return Err(SanitizeError::MissingColumn(column).into());
    }

    debug!(file = %file.filename, stage = %Stage::Sanitizing, rows = table.len());
    sanitize::sanitize(&mut table)?;
    wbs::derive_levels(&mut table, options.deep_hierarchy)?;
    if let Some(code) = &options.level3_filter {
        wbs::filter_level3(&mut table, code);
    }

    // Reshape after filtering so matrix rows stay parallel to table rows.
    debug!(file = %file.filename, stage = %Stage::Reshaping);
    let matrix = fiscal::reshape(&table)?;

    debug!(file = %file.filename, stage = %Stage::Aggregating, periods = matrix.dates.len());
    let aggregates = aggregate_all(&matrix, &options.capacity);

    debug!(file = %file.filename, stage = %Stage::Joining, enriched = lookup.is_some());
    if let Some(lookup) = lookup {
        category::join_categories(&mut table, lookup);
    }

    debug!(file = %file.filename, stage = %Stage::Projecting);
    let projected = match options.variant {
        ReportVariant::Filtered => project_filtered(&table, &aggregates, options.bucket),
        ReportVariant::Wide => project_wide(&table, &aggregates, options.deep_hierarchy),
    };

    debug!(file = %file.filename, stage = %Stage::Done, rows = projected.len());
    Ok(projected)
}

/// Run the pipeline on a base64 transport payload
/// (`<content-type>,<base64>`), as handed over by the upload collaborator.
pub fn process_data_url(
    contents: &str,
    filename: &str,
    options: &PipelineOptions,
    lookup: Option<&CategoryLookup>,
) -> PipelineResult<Table> {
    let bytes = decode::decode_data_url(contents)?;
    process_file(&UploadedFile::new(filename, bytes), options, lookup)
}

/// Run the pipeline on every file of a batch.
///
/// Files are independent, so they run in parallel; outcomes come back in
/// submission order, failures included. Each failure is logged with its
/// stage here, once.
pub fn process_batch(
    files: &[UploadedFile],
    options: &PipelineOptions,
    lookup: Option<&CategoryLookup>,
) -> Vec<FileOutcome> {
    files
        .par_iter()
        .map(|file| {
            let result = process_file(file, options, lookup);
            if let Err(err) = &result {
                error!(file = %file.filename, stage = %err.stage(), %err, "file failed");
            }
            FileOutcome {
                filename: file.filename.clone(),
                uploaded_at: file.uploaded_at,
                result,
            }
        })
        .collect()
}

// =============================================================================
// Projections
// =============================================================================

fn project_filtered(table: &Table, aggregates: &AggregateSet, bucket: BucketKind) -> Table {
    let agg = aggregates.select(bucket);
    let fte_labels = agg.fte_labels();

    let mut columns: Vec<String> = IDENTITY_COLUMNS.iter().map(|c| c.to_string()).collect();
    columns.extend(fte_labels.iter().cloned());

    let mut out = Table::new(columns);
    for (i, row) in table.rows.iter().enumerate() {
        let mut projected = Map::new();
        for column in IDENTITY_COLUMNS {
            projected.insert(
                column.to_string(),
                row.get(*column).cloned().unwrap_or(Value::Null),
            );
        }
        for (label, value) in fte_labels.iter().zip(&agg.fte[i]) {
            projected.insert(label.clone(), Value::from(*value));
        }
        out.rows.push(projected);
    }
    out
}

fn project_wide(table: &Table, aggregates: &AggregateSet, deep: bool) -> Table {
    let levels: &[&str] = if deep {
        &["L3", "L4", "L5", "L6"]
    } else {
        &["L3", "L4", "L5"]
    };

    // Hierarchy keys first, then the sanitized columns minus the raw path,
    // then every aggregate: hours and FTE, month/quarter/year.
    let mut columns: Vec<String> = levels.iter().map(|l| l.to_string()).collect();
    columns.extend(
        table
            .columns
            .iter()
            .filter(|c| c.as_str() != wbs::WBS_PATH && !levels.contains(&c.as_str()))
            .cloned(),
    );
    let aggregate_views = [
        &aggregates.monthly,
        &aggregates.quarterly,
        &aggregates.yearly,
    ];
    for agg in aggregate_views {
        columns.extend(agg.labels.iter().cloned());
        columns.extend(agg.fte_labels());
    }

    let mut out = Table::new(columns);
    for (i, row) in table.rows.iter().enumerate() {
        let mut projected = Map::new();
        for (key, value) in row {
            if key.as_str() != wbs::WBS_PATH {
                projected.insert(key.clone(), value.clone());
            }
        }
        for agg in aggregate_views {
            for (label, hours) in agg.labels.iter().zip(&agg.hours[i]) {
                projected.insert(label.clone(), Value::from(*hours));
            }
            for (label, fte) in agg.fte_labels().iter().zip(&agg.fte[i]) {
                projected.insert(label.clone(), Value::from(*fte));
            }
        }
        out.rows.push(projected);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A two-row export covering a full fiscal year of monthly columns.
    fn sample_csv() -> Vec<u8> {
        let fiscal: Vec<String> = (1..=12).map(|m| format!("\"FY24, FM{m}\"")).collect();
        let header = format!(
            "WBS Path,WBS Name,Activity ID,Activity Name,Resource Name,\
             Planned Units,Remaining Units,Start,Finish,Planned Duration,\
             Remaining Duration,Actual Duration,At Completion Duration,{}",
            fiscal.join(",")
        );
        let hours: Vec<String> = (1..=12).map(|m| format!("{m}0h")).collect();
        let row1 = format!(
            "1.03.02.114,Substation,A100,Design review,Alice,120h,30h,\
             2023-10-02 08:00 A,2024-09-27 17:00,250,65,10,250,{}",
            hours.join(",")
        );
        let row2 = format!(
            "1.04.01.001,Pipeline,A200,Site survey,Bob,80h,80h,\
             2023-11-01 08:00,2024-03-29 17:00 *,120,120,0,120,{}",
            hours.join(",")
        );
        format!("{header}\n{row1}\n{row2}\n").into_bytes()
    }

    fn upload(name: &str, bytes: Vec<u8>) -> UploadedFile {
        UploadedFile::new(name, bytes)
    }

    #[test]
    fn test_filtered_projection_shape() {
        let file = upload("export.csv", sample_csv());
        let table = process_file(&file, &PipelineOptions::default(), None).unwrap();

        let expected: Vec<String> = IDENTITY_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .chain(std::iter::once("FY2024 FTE".to_string()))
            .collect();
        assert_eq!(table.columns, expected);
        assert_eq!(table.len(), 2);

        // 10+20+...+120 hours over the year at 1740 h capacity.
        let total: f64 = (1..=12).map(|m| (m * 10) as f64).sum();
        let fte = table.cell(0, "FY2024 FTE").and_then(Value::as_f64).unwrap();
        assert!((fte - total / 1740.0).abs() < 1e-6);

        // Units arrive numeric, dates canonical.
        assert_eq!(
            table.cell(0, "Planned Units").and_then(Value::as_f64),
            Some(120.0)
        );
        assert_eq!(table.cell_str(0, "Start"), Some("2023-10-02 08:00"));
    }

    #[test]
    fn test_level3_filter_scopes_rows() {
        let file = upload("export.csv", sample_csv());
        let options = PipelineOptions {
            level3_filter: Some("1.03".into()),
            ..PipelineOptions::default()
        };
        let table = process_file(&file, &options, None).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.cell_str(0, "L3"), Some("1.03"));
    }

    #[test]
    fn test_quarter_bucket_projection() {
        let file = upload("export.csv", sample_csv());
        let options = PipelineOptions {
            bucket: BucketKind::Quarter,
            ..PipelineOptions::default()
        };
        let table = process_file(&file, &options, None).unwrap();
        // Q1 = Oct+Nov+Dec columns = 10+20+30 hours.
        let q1 = table
            .cell(0, "FY2024 Q1 FTE")
            .and_then(Value::as_f64)
            .unwrap();
        assert!((q1 - 60.0 / 435.0).abs() < 1e-6);
    }

    #[test]
    fn test_wide_projection_carries_everything() {
        let file = upload("export.csv", sample_csv());
        let options = PipelineOptions {
            variant: ReportVariant::Wide,
            deep_hierarchy: true,
            ..PipelineOptions::default()
        };
        let table = process_file(&file, &options, None).unwrap();

        assert_eq!(&table.columns[..4], &["L3", "L4", "L5", "L6"]);
        assert!(!table.has_column("WBS Path"));
        assert!(table.has_column("2023-10"));
        assert!(table.has_column("2023-10 FTE"));
        assert!(table.has_column("FY2024 Q1"));
        assert!(table.has_column("FY2024 FTE"));
        assert_eq!(
            table.cell(0, "2023-10").and_then(Value::as_f64),
            Some(10.0)
        );
    }

    #[test]
    fn test_category_join_in_pipeline() {
        let lookup_table = decode::decode_csv(
            b"Resource Name,Category\nAlice,Engineering\n",
        )
        .unwrap();
        let lookup = CategoryLookup::from_table(&lookup_table).unwrap();

        let file = upload("export.csv", sample_csv());
        let options = PipelineOptions {
            variant: ReportVariant::Wide,
            ..PipelineOptions::default()
        };
        let table = process_file(&file, &options, Some(&lookup)).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.cell_str(0, "Category"), Some("Engineering"));
        assert_eq!(table.cell(1, "Category"), Some(&Value::Null));
    }

    #[test]
    fn test_missing_column_is_sanitize_failure() {
        let file = upload("export.csv", b"WBS Path,Activity ID\n1.03,A100\n".to_vec());
        let err = process_file(&file, &PipelineOptions::default(), None).unwrap_err();
        assert!(matches!(err, PipelineError::Sanitize(_)));
        assert_eq!(err.stage(), Stage::Sanitizing);
    }

    #[test]
    fn test_unsupported_format_stage() {
        let file = upload("report.pdf", b"whatever".to_vec());
        let err = process_file(&file, &PipelineOptions::default(), None).unwrap_err();
        assert_eq!(err.stage(), Stage::Parsing);
    }

    #[test]
    fn test_batch_keeps_order_and_isolates_failures() {
        let files = vec![
            upload("broken.csv", b"WBS Path\n1.03\n".to_vec()),
            upload("report.pdf", b"%PDF".to_vec()),
            upload("good.csv", sample_csv()),
        ];
        let outcomes = process_batch(&files, &PipelineOptions::default(), None);

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].filename, "broken.csv");
        assert!(!outcomes[0].is_ok());
        assert!(outcomes[0].error_message().is_some());
        assert!(!outcomes[1].is_ok());
        assert_eq!(outcomes[2].filename, "good.csv");
        assert!(outcomes[2].is_ok());
    }

    #[test]
    fn test_data_url_entry_point() {
        use base64::engine::general_purpose::STANDARD as BASE64;
        use base64::Engine;

        let payload = format!(
            "data:text/csv;base64,{}",
            BASE64.encode(sample_csv())
        );
        let table =
            process_data_url(&payload, "export.csv", &PipelineOptions::default(), None).unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_empty_file_fails() {
        let file = upload("export.csv", b"WBS Path,WBS Name\n".to_vec());
        let err = process_file(&file, &PipelineOptions::default(), None).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyInput));
    }
}
