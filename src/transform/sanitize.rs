//! Field sanitation: strip export noise from text fields and type them.
//!
//! Schedule exports decorate values with markers the pipeline must not see:
//! day-period markers on date-times ("AM"/"PM" and the single-letter actual
//! flags "a"/"A"), constraint asterisks, and unit suffixes on durations and
//! hour figures ("20d", "150h"). Sanitation is driven by a declarative rule
//! table - one (column, kind) pair per field, processed uniformly - so the
//! noise list exists in exactly one place.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value;

use crate::error::{SanitizeError, SanitizeResult};
use crate::models::Table;

/// Unit marker on hour-valued cells ("150h").
pub const UNIT_SUFFIX: char = 'h';

/// Multi-character noise tokens, stripped before the single characters so
/// "AM" can never decay to an orphan "M".
const MULTI_CHAR_TOKENS: &[&str] = &["AM", "PM"];

/// Single-character noise tokens.
const SINGLE_CHAR_TOKENS: &[char] = &['a', 'A', '*', 'd', 'h'];

/// Canonical form every parsed date-time is re-emitted in.
pub const CANONICAL_DATETIME: &str = "%Y-%m-%d %H:%M";

/// Accepted date-time layouts after noise stripping. Numeric layouts only:
/// month-name forms cannot survive the noise strip.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M",
    "%m/%d/%Y %H:%M",
];

/// Accepted date-only layouts.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y"];

/// How a sanitized column is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Hour figure with a unit suffix; becomes a number, missing or
    /// unparseable values become 0.
    UnitHours,
    /// Noisy date-time; stripped, parsed, re-emitted canonically.
    /// Unparseable non-empty residue is an error.
    NoisyDate,
    /// Noisy free text (durations); stripped, kept as a string.
    NoisyText,
}

/// One sanitation rule: a column and how to treat it.
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub column: &'static str,
    pub kind: FieldKind,
}

/// The rule table for schedule exports.
pub const DEFAULT_RULES: &[FieldRule] = &[
    FieldRule {
        column: "Planned Units",
        kind: FieldKind::UnitHours,
    },
    FieldRule {
        column: "Remaining Units",
        kind: FieldKind::UnitHours,
    },
    FieldRule {
        column: "Start",
        kind: FieldKind::NoisyDate,
    },
    FieldRule {
        column: "Finish",
        kind: FieldKind::NoisyDate,
    },
    FieldRule {
        column: "Planned Duration",
        kind: FieldKind::NoisyText,
    },
    FieldRule {
        column: "Remaining Duration",
        kind: FieldKind::NoisyText,
    },
    FieldRule {
        column: "Actual Duration",
        kind: FieldKind::NoisyText,
    },
    FieldRule {
        column: "At Completion Duration",
        kind: FieldKind::NoisyText,
    },
];

/// Strip the noise-token list from a value and trim the residue.
pub fn strip_noise(value: &str) -> String {
    let mut out = value.to_string();
    for token in MULTI_CHAR_TOKENS {
        out = out.replace(token, "");
    }
    out.retain(|c| !SINGLE_CHAR_TOKENS.contains(&c));
    out.trim().to_string()
}

/// Parse an hour figure like "150h". Missing, empty, or unparseable
/// values read as zero.
pub fn parse_unit_hours(value: &str) -> f64 {
    let trimmed = value.trim().trim_end_matches(UNIT_SUFFIX).trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    trimmed.parse().unwrap_or(0.0)
}

/// Sanitize a table in place with the default schedule-export rules.
pub fn sanitize(table: &mut Table) -> SanitizeResult<()> {
    sanitize_with_rules(table, DEFAULT_RULES)
}

/// Sanitize a table in place with an explicit rule table.
///
/// Every ruled column must exist; a missing one is a [`SanitizeError::MissingColumn`].
pub fn sanitize_with_rules(table: &mut Table, rules: &[FieldRule]) -> SanitizeResult<()> {
    for rule in rules {
        if !table.has_column(rule.column) {
            return Err(SanitizeError::MissingColumn(rule.column.to_string()));
        }
    }

    for row in &mut table.rows {
        for rule in rules {
            let current = row.get(rule.column).cloned().unwrap_or(Value::Null);
            let next = match rule.kind {
                FieldKind::UnitHours => sanitize_unit_hours(&current),
                FieldKind::NoisyDate => sanitize_date(rule.column, &current)?,
                FieldKind::NoisyText => Value::String(strip_noise(&cell_text(&current))),
            };
            row.insert(rule.column.to_string(), next);
        }
    }

    Ok(())
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn sanitize_unit_hours(value: &Value) -> Value {
    // Already-typed cells pass through so sanitation is a no-op on its
    // own output.
    if let Some(n) = value.as_f64() {
        return Value::from(n);
    }
    Value::from(parse_unit_hours(&cell_text(value)))
}

fn sanitize_date(column: &str, value: &Value) -> SanitizeResult<Value> {
    let cleaned = strip_noise(&cell_text(value));
    if cleaned.is_empty() {
        return Ok(Value::String(String::new()));
    }
    match parse_datetime(&cleaned) {
        Some(dt) => Ok(Value::String(dt.format(CANONICAL_DATETIME).to_string())),
        None => Err(SanitizeError::MalformedValue {
            column: column.to_string(),
            value: cell_text(value),
        }),
    }
}

/// Try the accepted layouts in order; date-only layouts read as midnight.
pub fn parse_datetime(cleaned: &str) -> Option<NaiveDateTime> {
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(cleaned, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(cleaned, fmt) {
            return Some(d.and_time(NaiveTime::MIN));
        }
    }
    None
}
