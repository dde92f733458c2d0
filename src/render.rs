//! Serialisation of an export [`Document`] to Markdown, CSV-in-Markdown or JSON.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::document::{Document, Section, SectionBody};
use crate::error::{ExportError, Result};
use crate::export::Scope;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Format {
    /// Markdown with pipe tables.
    #[default]
    Markdown,
    /// Markdown with each table as a fenced CSV block.
    Csv,
    Json,
}

impl Format {
    pub fn extension(self) -> &'static str {
        match self {
            Format::Markdown | Format::Csv => "md",
            Format::Json => "json",
        }
    }
}

impl FromStr for Format {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "md" | "markdown" => Ok(Format::Markdown),
            "csv" => Ok(Format::Csv),
            "json" => Ok(Format::Json),
            other => Err(ExportError::InvalidInput(format!(
                "Unknown format '{}' (expected markdown, csv or json)",
                other
            ))),
        }
    }
}

pub fn render(doc: &Document, format: Format) -> Result<String> {
    match format {
        Format::Markdown | Format::Csv => Ok(render_markdown(doc, format == Format::Csv)),
        Format::Json => Ok(serde_json::to_string_pretty(doc)?),
    }
}

fn render_markdown(doc: &Document, csv_tables: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Raw Database Dump: {}", doc.title);
    let _ = writeln!(out, "**Story ID:** `{}`", doc.story_id);
    let _ = writeln!(
        out,
        "**Generated:** {}\n",
        doc.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );

    for section in &doc.sections {
        render_section(&mut out, section, csv_tables);
        out.push_str("\n---\n\n");
    }
    out
}

fn render_section(out: &mut String, section: &Section, csv_tables: bool) {
    let _ = writeln!(out, "## Table: `{}`", section.table);

    match &section.body {
        SectionBody::Table {
            scope,
            columns,
            rows,
            ..
        } => {
            if *scope == Scope::Unscoped {
                out.push_str(
                    "> **Warning:** unscoped full-table dump; rows may belong to other stories.\n\n",
                );
            }
            if csv_tables {
                let body = csv_table(columns, rows);
                let fence = code_fence(&body);
                let _ = write!(out, "{}csv\n{}{}\n", fence, body, fence);
            } else {
                out.push_str(&pipe_table(columns, rows));
            }
        }
        SectionBody::Empty { .. } => out.push_str("_No rows for this story scope._\n"),
        SectionBody::Skipped => out.push_str(
            "_Skipped: no relationship to the story could be resolved for this table._\n",
        ),
        SectionBody::Error { stage, reason } => {
            let _ = writeln!(
                out,
                "**Error reading table `{}`** (after {}): {}",
                section.table,
                stage,
                reason.replace('\n', " ")
            );
        }
    }
}

/// A backtick fence longer than any backtick run in `body`.
fn code_fence(body: &str) -> String {
    let longest = body
        .split(|c: char| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    "`".repeat(longest.max(2) + 1)
}

fn pipe_cell(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('\r', "")
        .replace('|', "\\|")
        .replace('\n', "<br>")
}

/// GitHub-style pipe table.
pub fn pipe_table(columns: &[String], rows: &[Vec<String>]) -> String {
    let mut out = String::new();
    let header: Vec<String> = columns.iter().map(|c| pipe_cell(c)).collect();
    let _ = writeln!(out, "| {} |", header.join(" | "));
    let _ = writeln!(
        out,
        "|{}|",
        columns.iter().map(|_| ":---").collect::<Vec<_>>().join("|")
    );
    for row in rows {
        let cells: Vec<String> = row.iter().map(|c| pipe_cell(c)).collect();
        let _ = writeln!(out, "| {} |", cells.join(" | "));
    }
    out
}

fn csv_field(value: &str) -> String {
    if value.contains(&[',', '"', '\n', '\r'][..]) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// RFC 4180 CSV with a header row.
pub fn csv_table(columns: &[String], rows: &[Vec<String>]) -> String {
    let mut out = String::new();
    let line = |cells: &[String]| cells.iter().map(|c| csv_field(c)).collect::<Vec<_>>().join(",");
    out.push_str(&line(columns));
    out.push('\n');
    for row in rows {
        out.push_str(&line(row.as_slice()));
        out.push('\n');
    }
    out
}

fn unsafe_chars_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9 _\-]").expect("Invalid regex pattern"))
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("Invalid regex pattern"))
}

fn sanitize(name: &str) -> String {
    let name = name.replace('&', " and ");
    let name = unsafe_chars_re().replace_all(&name, "");
    let name = whitespace_re().replace_all(name.trim(), "_");
    name.trim_matches('_').to_string()
}

/// File name for a story's dump, e.g. `Cat_and_Daniel_Collapse_Protocol_dump.md`.
pub fn output_file_name(title: &str, story_id: &str, format: Format) -> String {
    let mut stem = sanitize(title);
    if stem.is_empty() {
        stem = sanitize(story_id);
    }
    if stem.is_empty() {
        stem = "story".to_string();
    }
    format!("{}_dump.{}", stem, format.extension())
}

/// Render `doc` and write it to `path`, creating parent directories.
pub fn write_document(doc: &Document, format: Format, path: &Path) -> Result<PathBuf> {
    let rendered = render(doc, format)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, rendered)?;
    log::info!("Saved {} ({} format)", path.display(), format.extension());
    Ok(path.to_path_buf())
}
