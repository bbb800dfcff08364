//! Fiscal-period columns to calendar-dated hour columns.
//!
//! Export columns are labeled `FY<yy>, FM<m>` - fiscal year and fiscal
//! month. The fiscal calendar runs three months ahead of the standard one:
//! fiscal month 1 of FY2024 is October 2023. Labels go through an explicit
//! [`FiscalPeriod`] parser (never chained string replacements), and every
//! label must land on a distinct calendar date.

use chrono::{Datelike, Months, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

use crate::error::{ReshapeError, ReshapeResult};
use crate::models::Table;
use crate::transform::sanitize::UNIT_SUFFIX;

/// Marker that identifies a fiscal-period column.
pub const FISCAL_PREFIX: &str = "FY";

/// Offset between the fiscal and standard calendars, in months.
pub const FISCAL_SHIFT_MONTHS: u32 = 3;

static LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^FY(\d{2}),\s*FM(\d{1,2})$").expect("valid fiscal label regex"));

/// A parsed fiscal-period column label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FiscalPeriod {
    /// Four-digit fiscal year (label years are two-digit, 2000-based).
    pub year: i32,
    /// Fiscal month, 1..=12.
    pub month: u32,
}

impl FiscalPeriod {
    /// Parse a column label like `FY24, FM1`. Returns `None` for anything
    /// that is not exactly a fiscal-period label with a month in 1..=12.
    pub fn parse(label: &str) -> Option<Self> {
        let caps = LABEL_RE.captures(label.trim())?;
        let yy: i32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        if !(1..=12).contains(&month) {
            return None;
        }
        Some(Self {
            year: 2000 + yy,
            month,
        })
    }

    /// First day of this fiscal month on the standard calendar: the nominal
    /// `year-month-01` shifted back three months, so FY2024 FM1 is
    /// 2023-10-01 and FY2024 FM4 is 2024-01-01.
    pub fn calendar_start(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)?
            .checked_sub_months(Months::new(FISCAL_SHIFT_MONTHS))
    }
}

/// Fiscal year (ending September) a calendar date belongs to.
pub fn fiscal_year(date: NaiveDate) -> i32 {
    date.year() + if date.month() >= 10 { 1 } else { 0 }
}

/// Fiscal month (1..=12, October = 1) of a calendar date.
pub fn fiscal_month(date: NaiveDate) -> u32 {
    (date.month() + FISCAL_SHIFT_MONTHS - 1) % 12 + 1
}

/// Fiscal quarter (1..=4) of a calendar date. Q1 is Oct-Dec.
pub fn fiscal_quarter(date: NaiveDate) -> u32 {
    (fiscal_month(date) - 1) / 3 + 1
}

/// The fiscal-period column labels of a table, in table order.
pub fn fiscal_columns(table: &Table) -> Vec<String> {
    table
        .columns
        .iter()
        .filter(|c| c.starts_with(FISCAL_PREFIX))
        .cloned()
        .collect()
}

/// The hour matrix produced by reshaping: one calendar-dated column per
/// fiscal-period label, rows parallel to the source table's rows.
#[derive(Debug, Clone, Default)]
pub struct HourMatrix {
    /// Calendar first-of-month dates, in source column order.
    pub dates: Vec<NaiveDate>,
    /// Row-major hour values.
    pub rows: Vec<Vec<f64>>,
}

impl HourMatrix {
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

/// Reshape a sanitized table's fiscal columns into an [`HourMatrix`].
///
/// Every `FY`-prefixed column must parse and land on a distinct calendar
/// date; cells are hour figures with an optional unit suffix, empty cells
/// read as zero.
pub fn reshape(table: &Table) -> ReshapeResult<HourMatrix> {
    let labels = fiscal_columns(table);

    let mut dates = Vec::with_capacity(labels.len());
    let mut seen: HashMap<NaiveDate, String> = HashMap::new();
    for label in &labels {
        let period =
            FiscalPeriod::parse(label).ok_or_else(|| ReshapeError::InvalidLabel(label.clone()))?;
        let date = period
            .calendar_start()
            .ok_or_else(|| ReshapeError::InvalidLabel(label.clone()))?;
        if let Some(first) = seen.insert(date, label.clone()) {
            return Err(ReshapeError::AmbiguousPeriod {
                first,
                second: label.clone(),
                date,
            });
        }
        dates.push(date);
    }

    let mut rows = Vec::with_capacity(table.rows.len());
    for row in &table.rows {
        let mut hours = Vec::with_capacity(labels.len());
        for label in &labels {
            let cell = row.get(label.as_str()).unwrap_or(&Value::Null);
            hours.push(parse_hours_cell(label, cell)?);
        }
        rows.push(hours);
    }

    Ok(HourMatrix { dates, rows })
}

fn parse_hours_cell(column: &str, value: &Value) -> ReshapeResult<f64> {
    if let Some(n) = value.as_f64() {
        return Ok(n);
    }
    let text = match value {
        Value::String(s) => s.trim(),
        Value::Null => "",
        other => {
            return Err(ReshapeError::MalformedHours {
                column: column.to_string(),
                value: other.to_string(),
            })
        }
    };
    let stripped = text.trim_end_matches(UNIT_SUFFIX).trim();
    if stripped.is_empty() {
        return Ok(0.0);
    }
    stripped.parse().map_err(|_| ReshapeError::MalformedHours {
        column: column.to_string(),
        value: text.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_label() {
        assert_eq!(
            FiscalPeriod::parse("FY24, FM1"),
            Some(FiscalPeriod {
                year: 2024,
                month: 1
            })
        );
        assert_eq!(
            FiscalPeriod::parse("FY25, FM12"),
            Some(FiscalPeriod {
                year: 2025,
                month: 12
            })
        );
        assert!(FiscalPeriod::parse("FY24, FM13").is_none());
        assert!(FiscalPeriod::parse("FY24, FM0").is_none());
        assert!(FiscalPeriod::parse("FY2024, FM1").is_none());
        assert!(FiscalPeriod::parse("FY24 FM1").is_none());
        assert!(FiscalPeriod::parse("Planned Units").is_none());
    }

    #[test]
    fn test_calendar_start_year_boundary() {
        // Fiscal months 1-3 fall in the prior calendar year.
        let cases = [
            ("FY24, FM1", date(2023, 10, 1)),
            ("FY24, FM3", date(2023, 12, 1)),
            ("FY24, FM4", date(2024, 1, 1)),
            ("FY24, FM12", date(2024, 9, 1)),
        ];
        for (label, expected) in cases {
            let period = FiscalPeriod::parse(label).unwrap();
            assert_eq!(period.calendar_start(), Some(expected), "{label}");
        }
    }

    #[test]
    fn test_fiscal_year_and_quarter() {
        // Oct-Dec belong to the next fiscal year label, Q1.
        assert_eq!(fiscal_year(date(2023, 10, 1)), 2024);
        assert_eq!(fiscal_quarter(date(2023, 10, 1)), 1);
        assert_eq!(fiscal_quarter(date(2023, 12, 1)), 1);
        // Jan-Mar are fiscal Q2.
        assert_eq!(fiscal_year(date(2024, 1, 1)), 2024);
        assert_eq!(fiscal_quarter(date(2024, 1, 1)), 2);
        assert_eq!(fiscal_quarter(date(2024, 3, 1)), 2);
        // Jul-Sep close the fiscal year.
        assert_eq!(fiscal_quarter(date(2024, 9, 1)), 4);
        assert_eq!(fiscal_year(date(2024, 9, 30)), 2024);
    }

    fn fiscal_table(labels: &[&str], hours: &[&str]) -> Table {
        let mut table = Table::new(labels.iter().map(|l| l.to_string()).collect());
        table.rows.push(
            labels
                .iter()
                .zip(hours)
                .map(|(l, h)| (l.to_string(), json!(h)))
                .collect(),
        );
        table
    }

    #[test]
    fn test_reshape_basic() {
        let table = fiscal_table(&["FY24, FM1", "FY24, FM4"], &["10h", "20.5h"]);
        let matrix = reshape(&table).unwrap();
        assert_eq!(matrix.dates, vec![date(2023, 10, 1), date(2024, 1, 1)]);
        assert_eq!(matrix.rows, vec![vec![10.0, 20.5]]);
    }

    #[test]
    fn test_reshape_empty_cell_reads_zero() {
        let table = fiscal_table(&["FY24, FM1"], &[""]);
        let matrix = reshape(&table).unwrap();
        assert_eq!(matrix.rows, vec![vec![0.0]]);
    }

    #[test]
    fn test_reshape_no_fiscal_columns() {
        let table = Table::new(vec!["Activity ID".into()]);
        let matrix = reshape(&table).unwrap();
        assert!(matrix.is_empty());
    }

    #[test]
    fn test_reshape_rejects_bad_label() {
        let table = fiscal_table(&["FY24-FM1"], &["10h"]);
        assert!(matches!(
            reshape(&table),
            Err(ReshapeError::InvalidLabel(_))
        ));
    }

    #[test]
    fn test_reshape_rejects_duplicate_dates() {
        // FM1 and FM01 are distinct labels for the same calendar month.
        let table = fiscal_table(&["FY24, FM1", "FY24, FM01"], &["10h", "20h"]);
        let err = reshape(&table).unwrap_err();
        match err {
            ReshapeError::AmbiguousPeriod { date: d, .. } => {
                assert_eq!(d, date(2023, 10, 1));
            }
            other => panic!("expected AmbiguousPeriod, got {other:?}"),
        }
    }

    #[test]
    fn test_reshape_rejects_garbage_hours() {
        let table = fiscal_table(&["FY24, FM1"], &["lots"]);
        assert!(matches!(
            reshape(&table),
            Err(ReshapeError::MalformedHours { .. })
        ));
    }
}
