//! Relationship inference: which rows of a table belong to the root story.
//!
//! The declared graph says how owned entities reach the root; the resolver
//! reads a table's live columns against it and picks the first matching
//! pattern.

mod graph;
mod resolver;

pub use graph::{
    is_identifier, Anchor, Exception, GraphBuilder, Reference, RelationshipGraph, SymmetricPair,
    MAX_OWNER_DEPTH,
};
pub use resolver::{Pattern, Predicate, Resolver, RULE_ORDER};

/// Double-quote an SQL identifier.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
