//! Statically declared relationship graph.
//!
//! Declares which entities the root owns and how each reaches it, which
//! referencing column names point at which owner, the symmetric link pairs,
//! and the hand-authored exceptions. Built once and validated before any
//! table is touched.

use std::collections::{BTreeMap, HashSet};

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::error::{ExportError, Result};
use crate::relations::quote_ident;

/// Owners may sit at most this many references away from the root, so a
/// table referencing them is at most two hops away.
pub const MAX_OWNER_DEPTH: usize = 1;

/// How an owned entity reaches the root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Anchor {
    /// `column` holds the root id.
    Root { column: String },
    /// `column` holds the id of a row in `owner`.
    Via { column: String, owner: String },
}

impl Anchor {
    pub fn root(column: &str) -> Self {
        Anchor::Root {
            column: column.to_string(),
        }
    }

    pub fn via(column: &str, owner: &str) -> Self {
        Anchor::Via {
            column: column.to_string(),
            owner: owner.to_string(),
        }
    }

    pub fn column(&self) -> &str {
        match self {
            Anchor::Root { column } | Anchor::Via { column, .. } => column,
        }
    }
}

/// A referencing column name and the owner it points at. When `table` is
/// set the reference only applies to that table and shadows any general
/// reference with the same column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub column: String,
    pub owner: String,
    #[serde(default)]
    pub table: Option<String>,
}

/// Two columns linking two rows of the same owned entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymmetricPair {
    pub columns: (String, String),
    pub owner: String,
}

/// Hand-authored predicate for a table whose shape inference cannot read.
/// The root id binds to `?1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exception {
    pub table: String,
    pub predicate: String,
}

#[derive(Debug, Clone)]
pub struct RelationshipGraph {
    root_table: String,
    root_key: String,
    owners: BTreeMap<String, Anchor>,
    references: Vec<Reference>,
    symmetric: Vec<SymmetricPair>,
    exceptions: Vec<Exception>,
}

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("Invalid regex pattern"))
}

/// Whether `name` is a plain SQL identifier.
pub fn is_identifier(name: &str) -> bool {
    identifier_re().is_match(name)
}

fn check_identifier(name: &str, what: &str) -> Result<()> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(ExportError::InvalidGraph(format!("{} '{}' is not a plain identifier", what, name)))
    }
}

impl RelationshipGraph {
    pub fn builder(root_table: &str, root_key: &str) -> GraphBuilder {
        GraphBuilder {
            graph: RelationshipGraph {
                root_table: root_table.to_string(),
                root_key: root_key.to_string(),
                owners: BTreeMap::new(),
                references: Vec::new(),
                symmetric: Vec::new(),
                exceptions: Vec::new(),
            },
        }
    }

    /// Relationship graph of the story schema.
    pub fn story_default() -> Result<Self> {
        Self::story_builder().build()
    }

    /// Builder preloaded with the story schema, for callers adding exceptions.
    pub fn story_builder() -> GraphBuilder {
        Self::builder("stories", "story_id")
            .owner("characters", Anchor::root("story_id"))
            .owner("plot_arcs", Anchor::root("story_id"))
            .owner("locations", Anchor::root("story_id"))
            .owner("scenes", Anchor::root("story_id"))
            .owner("episodes", Anchor::root("story_id"))
            .owner("roadmaps", Anchor::root("story_id"))
            .owner("roadmap_episodes", Anchor::via("roadmap_id", "roadmaps"))
            .reference("roadmap_id", "roadmaps")
            .reference("episode_id", "episodes")
            .reference("character_id", "characters")
            .reference("location_id", "locations")
            .reference("scene_id", "scenes")
            // roadmap scenes hang off planning episodes, not the generated ones
            .table_reference("roadmap_scenes", "episode_id", "roadmap_episodes")
            .symmetric("character_a_id", "character_b_id", "characters")
            .symmetric("parent_arc_id", "child_arc_id", "plot_arcs")
            .exception(
                "plot_points",
                "\"plot_arc_id\" IN (SELECT \"id\" FROM \"plot_arcs\" WHERE \"story_id\" = ?1)",
            )
    }

    pub fn root_table(&self) -> &str {
        &self.root_table
    }

    pub fn root_key(&self) -> &str {
        &self.root_key
    }

    pub fn owner(&self, table: &str) -> Option<&Anchor> {
        self.owners.get(table)
    }

    /// Number of references between `owner` and the root (0 = direct).
    pub fn owner_depth(&self, owner: &str) -> Option<usize> {
        let mut depth = 0;
        let mut current = owner;
        loop {
            match self.owners.get(current)? {
                Anchor::Root { .. } => return Some(depth),
                Anchor::Via { owner, .. } => {
                    depth += 1;
                    if depth > self.owners.len() {
                        return None;
                    }
                    current = owner;
                }
            }
        }
    }

    /// `SELECT "id" FROM owner WHERE ...` restricted to rows the root owns.
    pub fn owner_scope(&self, owner: &str) -> Option<String> {
        let anchor = self.owners.get(owner)?;
        let filter = match anchor {
            Anchor::Root { column } => format!("{} = ?1", quote_ident(column)),
            Anchor::Via { column, owner: parent } => {
                format!("{} IN ({})", quote_ident(column), self.owner_scope(parent)?)
            }
        };
        Some(format!(
            "SELECT \"id\" FROM {} WHERE {}",
            quote_ident(owner),
            filter
        ))
    }

    /// References that apply to `table`, in precedence order: its own
    /// overrides first, then general references it does not shadow.
    pub fn references_for<'a>(
        &'a self,
        table: &'a str,
    ) -> impl Iterator<Item = &'a Reference> + 'a {
        let specific = self
            .references
            .iter()
            .filter(move |r| r.table.as_deref() == Some(table));
        let general = self.references.iter().filter(move |r| {
            r.table.is_none()
                && !self
                    .references
                    .iter()
                    .any(|o| o.table.as_deref() == Some(table) && o.column == r.column)
        });
        specific.chain(general)
    }

    pub fn symmetric_pairs(&self) -> &[SymmetricPair] {
        &self.symmetric
    }

    pub fn exception(&self, table: &str) -> Option<&Exception> {
        self.exceptions.iter().find(|e| e.table == table)
    }

    fn validate(&self) -> Result<()> {
        check_identifier(&self.root_table, "root table")?;
        check_identifier(&self.root_key, "root key")?;

        for (table, anchor) in &self.owners {
            check_identifier(table, "owner")?;
            check_identifier(anchor.column(), "anchor column")?;
            if let Anchor::Via { owner, .. } = anchor {
                if !self.owners.contains_key(owner) {
                    return Err(ExportError::InvalidGraph(format!(
                        "owner '{}' is anchored via undeclared owner '{}'",
                        table, owner
                    )));
                }
            }
            match self.owner_depth(table) {
                None => {
                    return Err(ExportError::InvalidGraph(format!(
                        "owner '{}' never reaches the root (cycle)",
                        table
                    )))
                }
                Some(depth) if depth > MAX_OWNER_DEPTH => {
                    return Err(ExportError::InvalidGraph(format!(
                        "owner '{}' is {} references from the root; at most {} supported",
                        table, depth, MAX_OWNER_DEPTH
                    )))
                }
                Some(_) => {}
            }
        }

        let mut seen = HashSet::new();
        for r in &self.references {
            check_identifier(&r.column, "reference column")?;
            if let Some(table) = &r.table {
                check_identifier(table, "reference table")?;
            }
            if !self.owners.contains_key(&r.owner) {
                return Err(ExportError::InvalidGraph(format!(
                    "column '{}' references undeclared owner '{}'",
                    r.column, r.owner
                )));
            }
            if !seen.insert((r.table.clone(), r.column.clone())) {
                return Err(ExportError::InvalidGraph(format!(
                    "column '{}' is declared twice",
                    r.column
                )));
            }
        }

        for pair in &self.symmetric {
            check_identifier(&pair.columns.0, "symmetric column")?;
            check_identifier(&pair.columns.1, "symmetric column")?;
            if pair.columns.0 == pair.columns.1 {
                return Err(ExportError::InvalidGraph(format!(
                    "symmetric pair on '{}' repeats column '{}'",
                    pair.owner, pair.columns.0
                )));
            }
            if !self.owners.contains_key(&pair.owner) {
                return Err(ExportError::InvalidGraph(format!(
                    "symmetric pair references undeclared owner '{}'",
                    pair.owner
                )));
            }
        }

        let mut tables = HashSet::new();
        for e in &self.exceptions {
            check_identifier(&e.table, "exception table")?;
            if !e.predicate.contains("?1") {
                return Err(ExportError::InvalidGraph(format!(
                    "exception for '{}' does not bind the root id (?1)",
                    e.table
                )));
            }
            if !tables.insert(e.table.as_str()) {
                return Err(ExportError::InvalidGraph(format!(
                    "exception for '{}' is declared twice",
                    e.table
                )));
            }
        }

        Ok(())
    }
}

/// Collects declarations, then validates them in [`GraphBuilder::build`].
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    graph: RelationshipGraph,
}

impl GraphBuilder {
    pub fn owner(mut self, table: &str, anchor: Anchor) -> Self {
        self.graph.owners.insert(table.to_string(), anchor);
        self
    }

    pub fn reference(mut self, column: &str, owner: &str) -> Self {
        self.graph.references.push(Reference {
            column: column.to_string(),
            owner: owner.to_string(),
            table: None,
        });
        self
    }

    pub fn table_reference(mut self, table: &str, column: &str, owner: &str) -> Self {
        self.graph.references.push(Reference {
            column: column.to_string(),
            owner: owner.to_string(),
            table: Some(table.to_string()),
        });
        self
    }

    pub fn symmetric(mut self, a: &str, b: &str, owner: &str) -> Self {
        self.graph.symmetric.push(SymmetricPair {
            columns: (a.to_string(), b.to_string()),
            owner: owner.to_string(),
        });
        self
    }

    /// Adds an exception; a later declaration for the same table replaces
    /// the earlier one.
    pub fn exception(mut self, table: &str, predicate: &str) -> Self {
        self.graph.exceptions.retain(|e| e.table != table);
        self.graph.exceptions.push(Exception {
            table: table.to_string(),
            predicate: predicate.to_string(),
        });
        self
    }

    pub fn exceptions(self, exceptions: &[Exception]) -> Self {
        exceptions
            .iter()
            .fold(self, |b, e| b.exception(&e.table, &e.predicate))
    }

    pub fn build(self) -> Result<RelationshipGraph> {
        self.graph.validate()?;
        Ok(self.graph)
    }
}
