//! Rendering boundary: tables to CSV or aligned text.
//!
//! All formatting is driven by per-call [`RenderOptions`]; the pipeline
//! itself never holds display state. Numbers are formatted here and only
//! here.

use serde_json::Value;

use crate::models::Table;

/// Per-call output formatting options.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Decimal places for numeric cells.
    pub float_precision: usize,
    /// Cap on rendered data rows (a preview), `None` for all.
    pub max_rows: Option<usize>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            float_precision: 2,
            max_rows: None,
        }
    }
}

impl RenderOptions {
    fn visible_rows(&self, total: usize) -> usize {
        self.max_rows.map_or(total, |cap| cap.min(total))
    }
}

/// Format one cell. Null renders empty; numbers honor the precision.
pub fn format_cell(value: &Value, options: &RenderOptions) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            Some(f) => format!("{f:.prec$}", prec = options.float_precision),
            None => n.to_string(),
        },
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// Render a table as CSV, header row included.
pub fn to_csv(table: &Table, options: &RenderOptions) -> String {
    let mut out = String::new();
    push_csv_record(&mut out, table.columns.iter().map(String::as_str));
    for row in table.rows.iter().take(options.visible_rows(table.len())) {
        let cells: Vec<String> = table
            .columns
            .iter()
            .map(|c| format_cell(row.get(c.as_str()).unwrap_or(&Value::Null), options))
            .collect();
        push_csv_record(&mut out, cells.iter().map(String::as_str));
    }
    out
}

fn push_csv_record<'a>(out: &mut String, fields: impl Iterator<Item = &'a str>) {
    let mut first = true;
    for field in fields {
        if !first {
            out.push(',');
        }
        first = false;
        if field.contains([',', '"', '\n', '\r']) {
            out.push('"');
            out.push_str(&field.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(field);
        }
    }
    out.push('\n');
}

/// Render a table as aligned text columns for terminal display.
pub fn to_text(table: &Table, options: &RenderOptions) -> String {
    let visible = options.visible_rows(table.len());

    // Column widths over header + visible cells.
    let mut widths: Vec<usize> = table.columns.iter().map(|c| c.chars().count()).collect();
    let rendered: Vec<Vec<String>> = table
        .rows
        .iter()
        .take(visible)
        .map(|row| {
            table
                .columns
                .iter()
                .enumerate()
                .map(|(i, c)| {
                    let cell = format_cell(row.get(c.as_str()).unwrap_or(&Value::Null), options);
                    widths[i] = widths[i].max(cell.chars().count());
                    cell
                })
                .collect()
        })
        .collect();

    let mut out = String::new();
    push_text_record(&mut out, table.columns.iter().map(String::as_str), &widths);
    let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    push_text_record(&mut out, separator.iter().map(String::as_str), &widths);
    for cells in &rendered {
        push_text_record(&mut out, cells.iter().map(String::as_str), &widths);
    }
    if visible < table.len() {
        out.push_str(&format!("({} more rows)\n", table.len() - visible));
    }
    out
}

fn push_text_record<'a>(
    out: &mut String,
    fields: impl Iterator<Item = &'a str>,
    widths: &[usize],
) {
    for (i, field) in fields.enumerate() {
        if i > 0 {
            out.push_str("  ");
        }
        let width = widths.get(i).copied().unwrap_or(0);
        let pad = width.saturating_sub(field.chars().count());
        out.push_str(field);
        out.push_str(&" ".repeat(pad));
    }
    out.push('\n');
}
