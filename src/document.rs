//! Export document model and the assembler that builds it.
//!
//! Assembly is pure: outcomes in, sections out, same order. Rendering to
//! Markdown, CSV or JSON lives in [`crate::render`].

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use serde::Serialize;

use crate::export::{Scope, Stage, TableExport, TableOutcome};
use crate::story::Story;

/// Audit columns left out of rendered tables by default.
pub const NOISE_COLUMNS: [&str; 2] = ["created_at", "updated_at"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub title: String,
    pub story_id: String,
    pub generated_at: DateTime<Utc>,
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    pub table: String,
    pub body: SectionBody,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum SectionBody {
    Table {
        scope: Scope,
        columns: Vec<String>,
        rows: Vec<Vec<String>>,
        /// Columns present in the result set but elided from rendering.
        dropped: Vec<String>,
    },
    /// Scoping ran and found nothing.
    Empty { scope: Scope },
    /// Scoping was not attempted.
    Skipped,
    Error { stage: Stage, reason: String },
}

/// Counts per section kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DocumentSummary {
    pub tables: usize,
    pub rows: usize,
    pub empty: usize,
    pub skipped: usize,
    pub errors: usize,
    pub unscoped: usize,
}

impl Document {
    pub fn summary(&self) -> DocumentSummary {
        self.sections
            .iter()
            .fold(DocumentSummary::default(), |mut acc, s| {
                match &s.body {
                    SectionBody::Table { rows, scope, .. } => {
                        acc.tables += 1;
                        acc.rows += rows.len();
                        if *scope == Scope::Unscoped {
                            acc.unscoped += 1;
                        }
                    }
                    SectionBody::Empty { .. } => acc.empty += 1,
                    SectionBody::Skipped => acc.skipped += 1,
                    SectionBody::Error { .. } => acc.errors += 1,
                }
                acc
            })
    }
}

#[derive(Debug, Clone)]
pub struct AssembleOptions {
    pub drop_columns: Vec<String>,
}

impl Default for AssembleOptions {
    fn default() -> Self {
        Self {
            drop_columns: NOISE_COLUMNS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Display form of a single cell.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => f.to_string(),
        Value::Text(s) => s.clone(),
        Value::Blob(b) => format!("<blob {} bytes>", b.len()),
    }
}

/// Build the document for `story` from per-table outcomes.
pub fn assemble(
    story: &Story,
    generated_at: DateTime<Utc>,
    results: &[TableExport],
    options: &AssembleOptions,
) -> Document {
    let sections = results
        .iter()
        .map(|r| Section {
            table: r.table.clone(),
            body: section_body(&r.outcome, options),
        })
        .collect();

    Document {
        title: story.title.clone(),
        story_id: story.id.clone(),
        generated_at,
        sections,
    }
}

fn section_body(outcome: &TableOutcome, options: &AssembleOptions) -> SectionBody {
    match outcome {
        TableOutcome::Success(set) => {
            let mut keep: Vec<usize> = (0..set.rows.columns.len())
                .filter(|&i| !options.drop_columns.contains(&set.rows.columns[i]))
                .collect();
            // A table made only of noise columns is still shown whole
            if keep.is_empty() {
                keep = (0..set.rows.columns.len()).collect();
            }

            let columns = keep.iter().map(|&i| set.rows.columns[i].clone()).collect();
            let dropped = set
                .rows
                .columns
                .iter()
                .enumerate()
                .filter(|(i, _)| !keep.contains(i))
                .map(|(_, c)| c.clone())
                .collect();
            let rows = set
                .rows
                .rows
                .iter()
                .map(|row| keep.iter().map(|&i| format_value(&row[i])).collect())
                .collect();

            SectionBody::Table {
                scope: set.scope,
                columns,
                rows,
                dropped,
            }
        }
        TableOutcome::Empty { scope } => SectionBody::Empty { scope: *scope },
        TableOutcome::Skipped => SectionBody::Skipped,
        TableOutcome::Failed { reached, error } => SectionBody::Error {
            stage: *reached,
            reason: error.to_string(),
        },
    }
}
