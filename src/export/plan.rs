//! Dry run: how each table would be scoped, without reading any rows.

use serde::Serialize;

use crate::db::{Connector, Store};
use crate::export::query;
use crate::export::Exporter;
use crate::relations::Predicate;

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum PlanResolution {
    Scoped { predicate: Predicate, sql: String },
    Unresolved { sql: String },
    Failed { reason: String },
}

#[derive(Debug, Serialize)]
pub struct TablePlan {
    pub table: String,
    pub resolution: PlanResolution,
}

impl Exporter<'_> {
    /// Introspect and resolve every table, returning the queries an export
    /// would run.
    pub fn plan<C: Connector>(
        &self,
        connector: &C,
        root_id: &str,
        tables: &[String],
    ) -> Vec<TablePlan> {
        tables
            .iter()
            .map(|table| {
                let columns = connector.connect().and_then(|store| store.columns(table));
                let resolution = match columns {
                    Err(e) => PlanResolution::Failed {
                        reason: e.to_string(),
                    },
                    Ok(columns) => match self.resolver().resolve(table, &columns, root_id) {
                        Some(predicate) => {
                            let sql = query::build(table, Some(&predicate)).sql;
                            PlanResolution::Scoped { predicate, sql }
                        }
                        None => PlanResolution::Unresolved {
                            sql: query::build(table, None).sql,
                        },
                    },
                };
                TablePlan {
                    table: table.clone(),
                    resolution,
                }
            })
            .collect()
    }
}
