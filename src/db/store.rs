//! Store boundary used by the export engine.
//!
//! The engine needs exactly two primitives from a relational store: list the
//! columns of a table, and run a parameterized read returning ordered rows.
//! Anything implementing [`Store`] can be exported from; [`Connector`] hands
//! out one store handle per table so a failure never outlives its table.

use std::collections::BTreeSet;

use rusqlite::types::Value;

use crate::error::Result;

/// Rows returned by a read, in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Rows {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Value of `column` in row `row`, if both exist.
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    /// Text values of one column, skipping NULLs and non-text cells.
    pub fn texts(&self, column: &str) -> Vec<String> {
        let Some(idx) = self.column_index(column) else {
            return Vec::new();
        };
        self.rows
            .iter()
            .filter_map(|r| match r.get(idx) {
                Some(Value::Text(s)) => Some(s.clone()),
                _ => None,
            })
            .collect()
    }
}

/// A read-only handle onto a relational store.
pub trait Store {
    /// Column names of `table` from the live catalog.
    fn columns(&self, table: &str) -> Result<BTreeSet<String>>;

    /// Run a read query; `params` bind to `?1`, `?2`, ... in order.
    fn fetch(&self, sql: &str, params: &[&str]) -> Result<Rows>;

    /// Run `f` inside a single read snapshot.
    fn read<T>(&self, f: impl FnOnce(&Self) -> T) -> Result<T>
    where
        Self: Sized,
    {
        Ok(f(self))
    }
}

/// Source of store handles. Each call yields a fresh handle that is released
/// when dropped.
pub trait Connector {
    type Store: Store;

    fn connect(&self) -> Result<Self::Store>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Rows {
        Rows {
            columns: vec!["id".to_string(), "name".to_string()],
            rows: vec![
                vec![Value::Text("c1".into()), Value::Text("Cat".into())],
                vec![Value::Text("c2".into()), Value::Null],
            ],
        }
    }

    #[test]
    fn test_value_lookup_by_column() {
        let rows = sample();
        assert_eq!(rows.value(0, "name"), Some(&Value::Text("Cat".into())));
        assert_eq!(rows.value(1, "name"), Some(&Value::Null));
        assert_eq!(rows.value(0, "missing"), None);
        assert_eq!(rows.value(5, "id"), None);
    }

    #[test]
    fn test_texts_skips_nulls() {
        let rows = sample();
        assert_eq!(rows.texts("id"), vec!["c1", "c2"]);
        assert_eq!(rows.texts("name"), vec!["Cat"]);
        assert!(rows.texts("missing").is_empty());
    }
}
