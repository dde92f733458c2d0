//! Scoped query construction.

use crate::relations::{quote_ident, Predicate};

/// A `SELECT *` over one table, optionally restricted by a predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedQuery {
    pub sql: String,
    pub params: Vec<String>,
}

impl ScopedQuery {
    /// False for a full-table read; the caller must flag such a read before
    /// running it.
    pub fn is_scoped(&self) -> bool {
        !self.params.is_empty()
    }

    pub fn param_refs(&self) -> Vec<&str> {
        self.params.iter().map(String::as_str).collect()
    }
}

/// Build the read for `table`. The root id is bound, never spliced in.
pub fn build(table: &str, predicate: Option<&Predicate>) -> ScopedQuery {
    let base = format!("SELECT * FROM {}", quote_ident(table));
    match predicate {
        Some(p) => ScopedQuery {
            sql: format!("{} WHERE {}", base, p.clause),
            params: p.params().iter().map(|s| s.to_string()).collect(),
        },
        None => ScopedQuery {
            sql: base,
            params: Vec::new(),
        },
    }
}
