//! Scoped export engine: query building, the per-table driver and dry runs.

mod driver;
mod plan;
pub mod query;

pub use driver::{
    Exporter, Scope, ScopedResultSet, Stage, TableExport, TableOutcome, UnscopedPolicy,
};
pub use plan::{PlanResolution, TablePlan};
pub use query::ScopedQuery;
