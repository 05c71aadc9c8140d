//! Result rows keyed by qualified `table.column` names.

use std::collections::BTreeMap;

use crate::value::Value;

/// One row of a query result.
///
/// Columns are keyed by their qualified `table.column` name so the stitcher
/// can pull each joined table's slice back apart. Connectors that only serve
/// single-table statements may use bare column names with [`Row::insert`]
/// against an explicit table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: BTreeMap<String, Value>,
}

impl Row {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a column value under `table.column`.
    pub fn insert(&mut self, table: &str, column: &str, value: Value) {
        self.columns.insert(format!("{table}.{column}"), value);
    }

    /// Store a column value under an already-qualified name.
    pub fn insert_qualified(&mut self, qualified: impl Into<String>, value: Value) {
        self.columns.insert(qualified.into(), value);
    }

    #[must_use]
    pub fn get(&self, table: &str, column: &str) -> Option<&Value> {
        self.columns.get(&format!("{table}.{column}"))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Split this row into per-table column maps.
    ///
    /// Column names without a `.` qualifier cannot be attributed to a table;
    /// they are logged and skipped rather than failing the whole load.
    #[must_use]
    pub fn split_by_table(&self) -> BTreeMap<&str, BTreeMap<&str, &Value>> {
        let mut tables: BTreeMap<&str, BTreeMap<&str, &Value>> = BTreeMap::new();
        for (qualified, value) in &self.columns {
            match qualified.split_once('.') {
                Some((table, column)) if !table.is_empty() && !column.is_empty() => {
                    tables.entry(table).or_default().insert(column, value);
                }
                _ => {
                    tracing::warn!(column = %qualified, "unqualified result column skipped");
                }
            }
        }
        tables
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            columns: iter.into_iter().collect(),
        }
    }
}
