//! Hour aggregation into month/quarter/fiscal-year buckets and FTE.
//!
//! Buckets follow the fiscal calendar ending in September: quarters are
//! Oct-Dec, Jan-Mar, Apr-Jun, Jul-Sep, and the year label is the fiscal
//! year the bucket closes in. FTE is the bucket's hour sum divided by the
//! per-person capacity for that bucket span.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::transform::fiscal::{fiscal_quarter, fiscal_year, HourMatrix};

/// Default per-person capacity, in hours per month.
pub const DEFAULT_HOURS_PER_MONTH: f64 = 145.0;

/// Suffix on columns holding FTE-normalized values.
pub const FTE_SUFFIX: &str = " FTE";

/// Per-person capacity used for FTE normalization. Quarter and year
/// capacities are derived from the monthly figure, never set separately.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Capacity {
    pub hours_per_month: f64,
}

impl Default for Capacity {
    fn default() -> Self {
        Self {
            hours_per_month: DEFAULT_HOURS_PER_MONTH,
        }
    }
}

impl Capacity {
    pub fn new(hours_per_month: f64) -> Self {
        Self { hours_per_month }
    }

    /// Capacity of one person over one bucket of the given kind.
    pub fn bucket_hours(&self, kind: BucketKind) -> f64 {
        self.hours_per_month * kind.months() as f64
    }
}

/// Aggregation window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum BucketKind {
    /// Calendar month (pass-through of the reshaped columns).
    Month,
    /// Fiscal quarter ending in September.
    Quarter,
    /// Fiscal year ending in September.
    FiscalYear,
}

impl BucketKind {
    /// Bucket span in months.
    pub fn months(&self) -> u32 {
        match self {
            BucketKind::Month => 1,
            BucketKind::Quarter => 3,
            BucketKind::FiscalYear => 12,
        }
    }
}

/// One aggregate view of an hour matrix: bucket labels in chronological
/// order, raw hour sums, and the FTE-normalized counterpart. Rows stay
/// parallel to the source matrix (and therefore to the source table).
#[derive(Debug, Clone)]
pub struct Aggregate {
    pub kind: BucketKind,
    pub labels: Vec<String>,
    pub hours: Vec<Vec<f64>>,
    pub fte: Vec<Vec<f64>>,
}

impl Aggregate {
    /// Labels for the FTE columns, disambiguated from the raw sums.
    pub fn fte_labels(&self) -> Vec<String> {
        self.labels
            .iter()
            .map(|l| format!("{l}{FTE_SUFFIX}"))
            .collect()
    }
}

/// All three aggregate views of one hour matrix.
#[derive(Debug, Clone)]
pub struct AggregateSet {
    pub monthly: Aggregate,
    pub quarterly: Aggregate,
    pub yearly: Aggregate,
}

impl AggregateSet {
    pub fn select(&self, kind: BucketKind) -> &Aggregate {
        match kind {
            BucketKind::Month => &self.monthly,
            BucketKind::Quarter => &self.quarterly,
            BucketKind::FiscalYear => &self.yearly,
        }
    }
}

/// Sortable bucket key plus its display label.
fn bucket_of(date: NaiveDate, kind: BucketKind) -> ((i32, u32), String) {
    match kind {
        BucketKind::Month => (
            (date.year(), date.month()),
            date.format("%Y-%m").to_string(),
        ),
        BucketKind::Quarter => {
            let fy = fiscal_year(date);
            let q = fiscal_quarter(date);
            ((fy, q), format!("FY{fy} Q{q}"))
        }
        BucketKind::FiscalYear => {
            let fy = fiscal_year(date);
            ((fy, 0), format!("FY{fy}"))
        }
    }
}

/// Aggregate an hour matrix into buckets of one kind.
pub fn aggregate(matrix: &HourMatrix, kind: BucketKind, capacity: &Capacity) -> Aggregate {
    // Chronological bucket order, each bucket owning its column indices.
    let mut buckets: BTreeMap<(i32, u32), (String, Vec<usize>)> = BTreeMap::new();
    for (idx, date) in matrix.dates.iter().enumerate() {
        let (key, label) = bucket_of(*date, kind);
        buckets
            .entry(key)
            .or_insert_with(|| (label, Vec::new()))
            .1
            .push(idx);
    }

    let labels: Vec<String> = buckets.values().map(|(label, _)| label.clone()).collect();
    let capacity_hours = capacity.bucket_hours(kind);

    let mut hours = Vec::with_capacity(matrix.rows.len());
    let mut fte = Vec::with_capacity(matrix.rows.len());
    for row in &matrix.rows {
        let sums: Vec<f64> = buckets
            .values()
            .map(|(_, indices)| indices.iter().map(|&i| row[i]).sum())
            .collect();
        fte.push(sums.iter().map(|h| h / capacity_hours).collect());
        hours.push(sums);
    }

    Aggregate {
        kind,
        labels,
        hours,
        fte,
    }
}

/// Produce the monthly, quarterly, and yearly views in one call.
pub fn aggregate_all(matrix: &HourMatrix, capacity: &Capacity) -> AggregateSet {
    AggregateSet {
        monthly: aggregate(matrix, BucketKind::Month, capacity),
        quarterly: aggregate(matrix, BucketKind::Quarter, capacity),
        yearly: aggregate(matrix, BucketKind::FiscalYear, capacity),
    }
}
