//! WBS hierarchy level keys.
//!
//! A WBS path is a nested prefix code ("1.03.02.114..."); organizational
//! levels correspond to fixed-width prefixes of it. Level keys are derived
//! as columns so reports can filter and group on them.

use serde_json::Value;

use crate::error::{SanitizeError, SanitizeResult};
use crate::models::Table;

/// Source column for level derivation.
pub const WBS_PATH: &str = "WBS Path";

/// Level column names with their prefix widths, shallow to deep.
pub const LEVEL_WIDTHS: &[(&str, usize)] = &[("L3", 4), ("L4", 7), ("L5", 10), ("L6", 13)];

/// The fixed-width prefix of a path at a given width, counted in characters.
/// Paths shorter than the width are returned whole.
pub fn level_prefix(path: &str, width: usize) -> String {
    path.chars().take(width).collect()
}

/// Derive level-key columns (L3..L5, plus L6 when `deep`) from the WBS Path.
pub fn derive_levels(table: &mut Table, deep: bool) -> SanitizeResult<()> {
    if !table.has_column(WBS_PATH) {
        return Err(SanitizeError::MissingColumn(WBS_PATH.to_string()));
    }

    let levels = if deep {
        LEVEL_WIDTHS
    } else {
        &LEVEL_WIDTHS[..3]
    };
    for (name, _) in levels {
        table.add_column(name);
    }

    for row in &mut table.rows {
        let path = row
            .get(WBS_PATH)
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        for (name, width) in levels {
            row.insert(name.to_string(), Value::String(level_prefix(&path, *width)));
        }
    }

    Ok(())
}

/// Keep only the rows whose L3 key equals `code`.
pub fn filter_level3(table: &mut Table, code: &str) {
    table
        .rows
        .retain(|row| row.get("L3").and_then(Value::as_str) == Some(code));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path_table(paths: &[&str]) -> Table {
        let mut table = Table::new(vec![WBS_PATH.to_string()]);
        for path in paths {
            table
                .rows
                .push([(WBS_PATH.to_string(), json!(path))].into_iter().collect());
        }
        table
    }

    #[test]
    fn test_level_prefix_widths() {
        let path = "1.03.02.114.07";
        assert_eq!(level_prefix(path, 4), "1.03");
        assert_eq!(level_prefix(path, 7), "1.03.02");
        assert_eq!(level_prefix(path, 10), "1.03.02.11");
        assert_eq!(level_prefix(path, 13), "1.03.02.114.0");
    }

    #[test]
    fn test_short_path_returned_whole() {
        assert_eq!(level_prefix("1.03", 10), "1.03");
        assert_eq!(level_prefix("", 4), "");
    }

    #[test]
    fn test_prefix_invariant() {
        // Each level key is a prefix of the next deeper one.
        let mut table = path_table(&["1.03.02.114.07", "2.1", "9.99.99.999.99"]);
        derive_levels(&mut table, true).unwrap();

        for row in &table.rows {
            let l3 = row["L3"].as_str().unwrap();
            let l4 = row["L4"].as_str().unwrap();
            let l5 = row["L5"].as_str().unwrap();
            let l6 = row["L6"].as_str().unwrap();
            assert!(l4.starts_with(l3));
            assert!(l5.starts_with(l4));
            assert!(l6.starts_with(l5));
        }
    }

    #[test]
    fn test_shallow_derivation_skips_l6() {
        let mut table = path_table(&["1.03.02.114.07"]);
        derive_levels(&mut table, false).unwrap();
        assert!(table.has_column("L5"));
        assert!(!table.has_column("L6"));
    }

    #[test]
    fn test_missing_wbs_path() {
        let mut table = Table::new(vec!["Activity ID".into()]);
        assert!(matches!(
            derive_levels(&mut table, false),
            Err(SanitizeError::MissingColumn(_))
        ));
    }

    #[test]
    fn test_filter_level3() {
        let mut table = path_table(&["1.03.02.114", "1.04.01.001", "1.03.09.220"]);
        derive_levels(&mut table, false).unwrap();
        filter_level3(&mut table, "1.03");
        assert_eq!(table.len(), 2);
        for row in &table.rows {
            assert_eq!(row["L3"].as_str(), Some("1.03"));
        }
    }
}
