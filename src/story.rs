//! Root story lookup.
//!
//! The export needs one story to scope against. It is found by exact id, or
//! by a case-insensitive title fragment; an id-shaped query never falls back
//! to title matching.

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;
use uuid::Uuid;

use crate::db::owned_value;
use crate::document::format_value;
use crate::error::{ExportError, Result};
use crate::schema;

/// The root entity of an export run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Story {
    pub id: String,
    pub title: String,
}

/// One line of the story listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorySummary {
    pub id: String,
    pub title: String,
    pub created_at: Option<String>,
}

/// Display form of a cell, whatever its storage class.
fn cell(row: &Row<'_>, idx: usize) -> rusqlite::Result<String> {
    Ok(format_value(&owned_value(row.get_ref(idx)?)))
}

fn story_from_row(row: &Row<'_>) -> rusqlite::Result<Story> {
    Ok(Story {
        id: cell(row, 0)?,
        title: cell(row, 1)?,
    })
}

fn escape_like(fragment: &str) -> String {
    fragment
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Find the story whose id equals `query`, else the first (by title) whose
/// title contains it.
pub fn find_story(conn: &Connection, query: &str) -> Result<Story> {
    let query = query.trim();
    if query.is_empty() {
        return Err(ExportError::InvalidInput("Story query cannot be empty".to_string()));
    }

    if !schema::table_exists(conn, "stories")? {
        return Err(ExportError::StoryNotFound(
            "database has no stories table".to_string(),
        ));
    }

    let by_id = conn
        .query_row(
            "SELECT id, title FROM stories WHERE id = ?1 LIMIT 1",
            [query],
            story_from_row,
        )
        .optional()?;
    if let Some(story) = by_id {
        log::debug!("Story matched by id: {}", story.id);
        return Ok(story);
    }

    if Uuid::parse_str(query).is_ok() {
        return Err(ExportError::StoryNotFound(format!("no story with id {}", query)));
    }

    let pattern = format!("%{}%", escape_like(query));
    let by_title = conn
        .query_row(
            "SELECT id, title FROM stories WHERE title LIKE ?1 ESCAPE '\\' ORDER BY title LIMIT 1",
            [pattern],
            story_from_row,
        )
        .optional()?;

    match by_title {
        Some(story) => {
            log::debug!("Story matched by title fragment '{}': {}", query, story.title);
            Ok(story)
        }
        None => Err(ExportError::StoryNotFound(format!(
            "no story id or title matches '{}'",
            query
        ))),
    }
}

/// All stories, ordered by title.
pub fn list_stories(conn: &Connection) -> Result<Vec<StorySummary>> {
    let columns = schema::table_columns(conn, "stories")?;
    let sql = if columns.contains("created_at") {
        "SELECT id, title, created_at FROM stories ORDER BY title"
    } else {
        "SELECT id, title, NULL FROM stories ORDER BY title"
    };

    let mut stmt = conn.prepare(sql)?;
    let stories = stmt
        .query_map([], |row| {
            let created_at = match row.get_ref(2)? {
                ValueRef::Null => None,
                value => Some(format_value(&owned_value(value))),
            };
            Ok(StorySummary {
                id: cell(row, 0)?,
                title: cell(row, 1)?,
                created_at,
            })
        })?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
    Ok(stories)
}
