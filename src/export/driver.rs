//! Per-table export loop.
//!
//! Each table goes PENDING → COLUMNS_FETCHED → PREDICATE_RESOLVED → EXECUTED
//! on its own read-only store handle. A failure at any stage is recorded for
//! that table and the loop moves on; nothing aborts the whole export.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::db::{Connector, Rows, Store};
use crate::error::ExportError;
use crate::export::query;
use crate::relations::{Pattern, RelationshipGraph, Resolver};

/// Furthest stage a table reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Pending,
    ColumnsFetched,
    PredicateResolved,
    Executed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Pending => "pending",
            Stage::ColumnsFetched => "columns fetched",
            Stage::PredicateResolved => "predicate resolved",
            Stage::Executed => "executed",
        };
        f.write_str(s)
    }
}

/// What to do with a table no rule ties to the story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnscopedPolicy {
    /// Leave the table out and say so in the document.
    #[default]
    Skip,
    /// Read the whole table and mark the section as unscoped.
    DumpWithWarning,
}

/// How a result set was restricted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "pattern")]
pub enum Scope {
    Scoped(Pattern),
    Unscoped,
}

/// Rows of one table after its predicate was applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopedResultSet {
    pub scope: Scope,
    pub rows: Rows,
}

#[derive(Debug)]
pub enum TableOutcome {
    Success(ScopedResultSet),
    Empty { scope: Scope },
    /// No relationship resolved and the policy said not to dump.
    Skipped,
    Failed { reached: Stage, error: ExportError },
}

impl TableOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, TableOutcome::Failed { .. })
    }
}

#[derive(Debug)]
pub struct TableExport {
    pub table: String,
    pub outcome: TableOutcome,
}

impl TableExport {
    pub fn rows(&self) -> Option<&Rows> {
        match &self.outcome {
            TableOutcome::Success(set) => Some(&set.rows),
            _ => None,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows().map_or(0, Rows::len)
    }
}

/// Drives a scoped export over an ordered table list.
pub struct Exporter<'g> {
    resolver: Resolver<'g>,
    policy: UnscopedPolicy,
}

impl<'g> Exporter<'g> {
    pub fn new(graph: &'g RelationshipGraph) -> Self {
        Self {
            resolver: Resolver::new(graph),
            policy: UnscopedPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: UnscopedPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn resolver(&self) -> &Resolver<'g> {
        &self.resolver
    }

    /// Export `tables` in the given order, scoped to `root_id`.
    pub fn run<C: Connector>(
        &self,
        connector: &C,
        root_id: &str,
        tables: &[String],
    ) -> Vec<TableExport> {
        let mut results = Vec::with_capacity(tables.len());

        for table in tables {
            log::info!("Processing table: {}", table);

            // The handle lives for this iteration only and is released on every path.
            let outcome = match connector.connect() {
                Ok(store) => store
                    .read(|s| self.export_table(s, table, root_id))
                    .unwrap_or_else(|error| TableOutcome::Failed {
                        reached: Stage::Pending,
                        error,
                    }),
                Err(error) => TableOutcome::Failed {
                    reached: Stage::Pending,
                    error,
                },
            };

            match &outcome {
                TableOutcome::Success(set) => {
                    log::info!("  {} rows from {}", set.rows.len(), table)
                }
                TableOutcome::Empty { .. } => log::info!("  {} has no rows for this story", table),
                TableOutcome::Skipped => {}
                TableOutcome::Failed { reached, error } => {
                    log::warn!("  Issue with table '{}' after {}: {}", table, reached, error)
                }
            }

            results.push(TableExport {
                table: table.clone(),
                outcome,
            });
        }

        let failed = results.iter().filter(|r| r.outcome.is_failure()).count();
        log::info!(
            "Export finished: {} tables, {} failed",
            results.len(),
            failed
        );
        results
    }

    fn export_table<S: Store>(&self, store: &S, table: &str, root_id: &str) -> TableOutcome {
        let columns = match store.columns(table) {
            Ok(columns) => columns,
            Err(error) => {
                return TableOutcome::Failed {
                    reached: Stage::Pending,
                    error,
                }
            }
        };
        log::trace!("  {}: {}", table, Stage::ColumnsFetched);

        let predicate = match self.resolver.require(table, &columns, root_id) {
            Ok(p) => Some(p),
            Err(unresolved) => match self.policy {
                UnscopedPolicy::Skip => {
                    log::warn!("  {}; skipping", unresolved);
                    return TableOutcome::Skipped;
                }
                UnscopedPolicy::DumpWithWarning => {
                    log::warn!("  {}; dumping FULL table", unresolved);
                    None
                }
            },
        };
        let scope = predicate
            .as_ref()
            .map_or(Scope::Unscoped, |p| Scope::Scoped(p.pattern));

        log::trace!("  {}: {}", table, Stage::PredicateResolved);

        let query = query::build(table, predicate.as_ref());
        log::debug!("  {}", query.sql);

        let rows = match store.fetch(&query.sql, &query.param_refs()) {
            Ok(rows) => rows,
            Err(e) => {
                return TableOutcome::Failed {
                    reached: Stage::PredicateResolved,
                    error: ExportError::Execution {
                        table: table.to_string(),
                        reason: e.to_string(),
                    },
                }
            }
        };
        log::trace!("  {}: {}", table, Stage::Executed);

        if rows.is_empty() {
            TableOutcome::Empty { scope }
        } else {
            TableOutcome::Success(ScopedResultSet { scope, rows })
        }
    }
}
