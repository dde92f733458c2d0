//! Ordered, first-match-wins resolution of a table's scoping predicate.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::error::{ExportError, Result};
use crate::relations::graph::RelationshipGraph;
use crate::relations::quote_ident;

/// How a table relates to the root story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Pattern {
    Direct,
    OneHop,
    TwoHop,
    Symmetric,
    NamedException,
}

impl Pattern {
    pub fn as_str(self) -> &'static str {
        match self {
            Pattern::Direct => "direct",
            Pattern::OneHop => "one-hop",
            Pattern::TwoHop => "two-hop",
            Pattern::Symmetric => "symmetric",
            Pattern::NamedException => "named exception",
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Rule precedence. Closer column evidence is tried first, so a table with a
/// direct root key never resolves through a chain.
pub const RULE_ORDER: [Pattern; 5] = [
    Pattern::Direct,
    Pattern::OneHop,
    Pattern::TwoHop,
    Pattern::Symmetric,
    Pattern::NamedException,
];

/// A scoping predicate. `clause` refers to the root id only through `?1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Predicate {
    pub pattern: Pattern,
    pub clause: String,
    /// Columns of the table the predicate filters on.
    pub anchors: Vec<String>,
    pub root_id: String,
}

impl Predicate {
    /// Values bound to the clause's placeholders.
    pub fn params(&self) -> [&str; 1] {
        [self.root_id.as_str()]
    }
}

pub struct Resolver<'g> {
    graph: &'g RelationshipGraph,
}

struct Matched {
    pattern: Pattern,
    clause: String,
    anchors: Vec<String>,
}

impl<'g> Resolver<'g> {
    pub fn new(graph: &'g RelationshipGraph) -> Self {
        Self { graph }
    }

    /// Scoping predicate for `table`, or `None` when no rule ties it to the root.
    pub fn resolve(
        &self,
        table: &str,
        columns: &BTreeSet<String>,
        root_id: &str,
    ) -> Option<Predicate> {
        let matched = RULE_ORDER
            .iter()
            .find_map(|&rule| self.try_rule(rule, table, columns))?;

        log::debug!(
            "Resolved {} via {} rule: {}",
            table,
            matched.pattern,
            matched.clause
        );

        Some(Predicate {
            pattern: matched.pattern,
            clause: matched.clause,
            anchors: matched.anchors,
            root_id: root_id.to_string(),
        })
    }

    /// Like [`resolve`](Self::resolve), with a missing relationship as an error.
    pub fn require(
        &self,
        table: &str,
        columns: &BTreeSet<String>,
        root_id: &str,
    ) -> Result<Predicate> {
        self.resolve(table, columns, root_id)
            .ok_or_else(|| ExportError::ResolutionUnavailable {
                table: table.to_string(),
            })
    }

    fn try_rule(&self, rule: Pattern, table: &str, columns: &BTreeSet<String>) -> Option<Matched> {
        match rule {
            Pattern::Direct => self.direct(table, columns),
            Pattern::OneHop => self.via_owner(table, columns, 0, Pattern::OneHop),
            Pattern::TwoHop => self.via_owner(table, columns, 1, Pattern::TwoHop),
            Pattern::Symmetric => self.symmetric(columns),
            Pattern::NamedException => self.named_exception(table),
        }
    }

    fn direct(&self, table: &str, columns: &BTreeSet<String>) -> Option<Matched> {
        let column = if table == self.graph.root_table() && columns.contains("id") {
            "id"
        } else if columns.contains(self.graph.root_key()) {
            self.graph.root_key()
        } else {
            return None;
        };
        Some(Matched {
            pattern: Pattern::Direct,
            clause: format!("{} = ?1", quote_ident(column)),
            anchors: vec![column.to_string()],
        })
    }

    /// First applicable reference whose owner sits `owner_depth` references
    /// from the root.
    fn via_owner(
        &self,
        table: &str,
        columns: &BTreeSet<String>,
        owner_depth: usize,
        pattern: Pattern,
    ) -> Option<Matched> {
        self.graph
            .references_for(table)
            .filter(|r| columns.contains(&r.column))
            .filter(|r| self.graph.owner_depth(&r.owner) == Some(owner_depth))
            .find_map(|r| {
                let scope = self.graph.owner_scope(&r.owner)?;
                Some(Matched {
                    pattern,
                    clause: format!("{} IN ({})", quote_ident(&r.column), scope),
                    anchors: vec![r.column.clone()],
                })
            })
    }

    fn symmetric(&self, columns: &BTreeSet<String>) -> Option<Matched> {
        self.graph
            .symmetric_pairs()
            .iter()
            .filter(|p| columns.contains(&p.columns.0) && columns.contains(&p.columns.1))
            .find_map(|p| {
                let scope = self.graph.owner_scope(&p.owner)?;
                Some(Matched {
                    pattern: Pattern::Symmetric,
                    clause: format!(
                        "({a} IN ({scope}) OR {b} IN ({scope}))",
                        a = quote_ident(&p.columns.0),
                        b = quote_ident(&p.columns.1),
                        scope = scope
                    ),
                    anchors: vec![p.columns.0.clone(), p.columns.1.clone()],
                })
            })
    }

    fn named_exception(&self, table: &str) -> Option<Matched> {
        self.graph.exception(table).map(|e| Matched {
            pattern: Pattern::NamedException,
            clause: format!("({})", e.predicate),
            anchors: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relations::Anchor;

    fn cols(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn graph() -> RelationshipGraph {
        RelationshipGraph::story_default().unwrap()
    }

    #[test]
    fn test_direct_on_root_key() {
        let g = graph();
        let p = Resolver::new(&g)
            .resolve("characters", &cols(&["id", "story_id", "name"]), "s1")
            .unwrap();
        assert_eq!(p.pattern, Pattern::Direct);
        assert_eq!(p.clause, "\"story_id\" = ?1");
        assert_eq!(p.anchors, vec!["story_id"]);
        assert_eq!(p.params(), ["s1"]);
    }

    #[test]
    fn test_root_table_scopes_on_primary_key() {
        let g = graph();
        let p = Resolver::new(&g)
            .resolve("stories", &cols(&["id", "title"]), "s1")
            .unwrap();
        assert_eq!(p.pattern, Pattern::Direct);
        assert_eq!(p.clause, "\"id\" = ?1");
    }

    #[test]
    fn test_one_hop_through_direct_owner() {
        let g = graph();
        let p = Resolver::new(&g)
            .resolve("roadmap_episodes", &cols(&["id", "roadmap_id", "episode_title"]), "s1")
            .unwrap();
        assert_eq!(p.pattern, Pattern::OneHop);
        assert_eq!(
            p.clause,
            "\"roadmap_id\" IN (SELECT \"id\" FROM \"roadmaps\" WHERE \"story_id\" = ?1)"
        );
    }

    #[test]
    fn test_two_hop_through_table_override() {
        let g = graph();
        let p = Resolver::new(&g)
            .resolve("roadmap_scenes", &cols(&["id", "episode_id", "scene_number"]), "s1")
            .unwrap();
        assert_eq!(p.pattern, Pattern::TwoHop);
        assert_eq!(
            p.clause,
            "\"episode_id\" IN (SELECT \"id\" FROM \"roadmap_episodes\" WHERE \"roadmap_id\" IN \
             (SELECT \"id\" FROM \"roadmaps\" WHERE \"story_id\" = ?1))"
        );
    }

    #[test]
    fn test_episode_id_elsewhere_is_one_hop() {
        let g = graph();
        let p = Resolver::new(&g)
            .resolve("episode_continuity_notes", &cols(&["id", "episode_id"]), "s1")
            .unwrap();
        assert_eq!(p.pattern, Pattern::OneHop);
        assert!(p.clause.contains("\"episodes\""));
    }

    #[test]
    fn test_direct_beats_one_hop() {
        let g = graph();
        let p = Resolver::new(&g)
            .resolve("hybrid", &cols(&["id", "story_id", "character_id", "roadmap_id"]), "s1")
            .unwrap();
        assert_eq!(p.pattern, Pattern::Direct);
    }

    #[test]
    fn test_one_hop_beats_two_hop_and_symmetric() {
        let g = graph();
        let p = Resolver::new(&g)
            .resolve(
                "roadmap_scenes",
                &cols(&["id", "episode_id", "character_id", "character_a_id", "character_b_id"]),
                "s1",
            )
            .unwrap();
        assert_eq!(p.pattern, Pattern::OneHop);
        assert_eq!(p.anchors, vec!["character_id"]);
    }

    #[test]
    fn test_reference_declaration_order_breaks_ties() {
        let g = graph();
        let p = Resolver::new(&g)
            .resolve(
                "character_location_contexts",
                &cols(&["id", "location_id", "character_id"]),
                "s1",
            )
            .unwrap();
        assert_eq!(p.anchors, vec!["character_id"]);
    }

    #[test]
    fn test_symmetric_pair_ors_both_sides() {
        let g = graph();
        let p = Resolver::new(&g)
            .resolve(
                "character_relationships",
                &cols(&["id", "character_a_id", "character_b_id", "relationship_type"]),
                "s1",
            )
            .unwrap();
        assert_eq!(p.pattern, Pattern::Symmetric);
        assert_eq!(
            p.clause,
            "(\"character_a_id\" IN (SELECT \"id\" FROM \"characters\" WHERE \"story_id\" = ?1) \
             OR \"character_b_id\" IN (SELECT \"id\" FROM \"characters\" WHERE \"story_id\" = ?1))"
        );
        assert_eq!(p.anchors, vec!["character_a_id", "character_b_id"]);
    }

    #[test]
    fn test_half_a_symmetric_pair_does_not_match() {
        let g = graph();
        let p = Resolver::new(&g).resolve("links", &cols(&["id", "character_a_id"]), "s1");
        assert!(p.is_none());
    }

    #[test]
    fn test_named_exception() {
        let g = graph();
        let p = Resolver::new(&g)
            .resolve("plot_points", &cols(&["id", "plot_arc_id", "title"]), "s1")
            .unwrap();
        assert_eq!(p.pattern, Pattern::NamedException);
        assert!(p.clause.starts_with('(') && p.clause.contains("?1"));
    }

    #[test]
    fn test_column_rules_win_over_named_exception() {
        let g = graph();
        let p = Resolver::new(&g)
            .resolve("plot_points", &cols(&["id", "plot_arc_id", "story_id"]), "s1")
            .unwrap();
        assert_eq!(p.pattern, Pattern::Direct);
    }

    #[test]
    fn test_unrecognised_table_resolves_to_none() {
        let g = graph();
        let p = Resolver::new(&g).resolve("app_settings", &cols(&["id", "key", "value"]), "s1");
        assert!(p.is_none());
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let g = graph();
        let resolver = Resolver::new(&g);
        let columns = cols(&["id", "episode_id", "location_id", "scene_id"]);
        let first = resolver.resolve("scene_location_associations", &columns, "s1");
        for _ in 0..10 {
            assert_eq!(resolver.resolve("scene_location_associations", &columns, "s1"), first);
        }
        assert_eq!(first.unwrap().anchors, vec!["episode_id"]);
    }

    #[test]
    fn test_custom_graph() {
        let g = RelationshipGraph::builder("campaigns", "campaign_id")
            .owner("maps", Anchor::root("campaign_id"))
            .reference("map_id", "maps")
            .build()
            .unwrap();
        let p = Resolver::new(&g)
            .resolve("tiles", &cols(&["id", "map_id"]), "c9")
            .unwrap();
        assert_eq!(p.pattern, Pattern::OneHop);
        assert_eq!(
            p.clause,
            "\"map_id\" IN (SELECT \"id\" FROM \"maps\" WHERE \"campaign_id\" = ?1)"
        );
    }

    #[test]
    fn test_rule_order_is_ranked() {
        assert_eq!(RULE_ORDER[0], Pattern::Direct);
        assert_eq!(RULE_ORDER[4], Pattern::NamedException);
    }

    #[test]
    fn test_require_reports_unresolved_table() {
        let g = graph();
        let err = Resolver::new(&g)
            .require("app_settings", &cols(&["key", "value"]), "s1")
            .unwrap_err();
        assert!(matches!(
            err,
            ExportError::ResolutionUnavailable { ref table } if table == "app_settings"
        ));
    }
}
