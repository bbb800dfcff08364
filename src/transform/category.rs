//! Resource category enrichment.
//!
//! The category lookup is an external table keyed by resource name, loaded
//! once per batch by the caller and treated as immutable. Joining is a left
//! join: every schedule row survives, unmatched rows get a null category.

use serde_json::Value;
use std::collections::HashMap;

use crate::error::{SanitizeError, SanitizeResult};
use crate::models::Table;

/// Join key column, present on both sides.
pub const RESOURCE_NAME: &str = "Resource Name";

/// Category column added to the schedule table.
pub const CATEGORY: &str = "Category";

/// Resource name to category mapping.
#[derive(Debug, Clone, Default)]
pub struct CategoryLookup {
    map: HashMap<String, String>,
}

impl CategoryLookup {
    /// Build a lookup from a decoded table. Requires a `Resource Name`
    /// column; category values come from a `Category` column when present,
    /// else from the first other column.
    pub fn from_table(table: &Table) -> SanitizeResult<Self> {
        if !table.has_column(RESOURCE_NAME) {
            return Err(SanitizeError::MissingColumn(RESOURCE_NAME.to_string()));
        }
        let value_column = if table.has_column(CATEGORY) {
            CATEGORY.to_string()
        } else {
            table
                .columns
                .iter()
                .find(|c| c.as_str() != RESOURCE_NAME)
                .cloned()
                .ok_or_else(|| SanitizeError::MissingColumn(CATEGORY.to_string()))?
        };

        let mut map = HashMap::new();
        for row in &table.rows {
            let name = row.get(RESOURCE_NAME).and_then(Value::as_str).unwrap_or("");
            let category = row
                .get(value_column.as_str())
                .and_then(Value::as_str)
                .unwrap_or("");
            if !name.trim().is_empty() {
                map.insert(name.trim().to_string(), category.trim().to_string());
            }
        }
        Ok(Self { map })
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn get(&self, resource_name: &str) -> Option<&str> {
        self.map.get(resource_name.trim()).map(String::as_str)
    }
}

/// Left-join categories onto a schedule table, preserving every row.
pub fn join_categories(table: &mut Table, lookup: &CategoryLookup) {
    table.add_column(CATEGORY);
    for row in &mut table.rows {
        let category = row
            .get(RESOURCE_NAME)
            .and_then(Value::as_str)
            .and_then(|name| lookup.get(name))
            .map(|c| Value::String(c.to_string()))
            .unwrap_or(Value::Null);
        row.insert(CATEGORY.to_string(), category);
    }
}
