pub mod config;
pub mod error;
pub mod db;
pub mod schema;
pub mod relations;
pub mod export;
pub mod story;
pub mod document;
pub mod render;

#[cfg(test)]
mod test_support;

pub use config::Config;
pub use error::{ExportError, Result};
pub use document::{assemble, AssembleOptions, Document, Section, SectionBody};
pub use export::{Exporter, Scope, Stage, TableExport, TableOutcome, UnscopedPolicy};
pub use relations::{Pattern, RelationshipGraph};
pub use render::{render, Format};
pub use story::{find_story, list_stories, Story};
