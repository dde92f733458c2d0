//! Story-schema fixtures shared by the in-crate test suites.

use rusqlite::{params, Connection};
use tempfile::TempDir;

use crate::db::Db;

pub const STORY_SCHEMA: &str = r#"
CREATE TABLE stories (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    description TEXT,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP,
    updated_at TEXT DEFAULT CURRENT_TIMESTAMP
);
CREATE TABLE characters (
    id TEXT PRIMARY KEY,
    story_id TEXT NOT NULL REFERENCES stories(id),
    name TEXT NOT NULL,
    role TEXT,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP,
    updated_at TEXT DEFAULT CURRENT_TIMESTAMP
);
CREATE TABLE character_relationships (
    id TEXT PRIMARY KEY,
    character_a_id TEXT REFERENCES characters(id),
    character_b_id TEXT REFERENCES characters(id),
    relationship_type TEXT
);
CREATE TABLE plot_arcs (
    id TEXT PRIMARY KEY,
    story_id TEXT NOT NULL REFERENCES stories(id),
    title TEXT,
    arc_number INTEGER
);
CREATE TABLE plot_points (
    id TEXT PRIMARY KEY,
    plot_arc_id TEXT REFERENCES plot_arcs(id),
    title TEXT
);
CREATE TABLE arc_connections (
    id TEXT PRIMARY KEY,
    parent_arc_id TEXT REFERENCES plot_arcs(id),
    child_arc_id TEXT REFERENCES plot_arcs(id),
    connection_type TEXT
);
CREATE TABLE locations (
    id TEXT PRIMARY KEY,
    story_id TEXT NOT NULL REFERENCES stories(id),
    name TEXT
);
CREATE TABLE location_arcs (
    id TEXT PRIMARY KEY,
    location_id TEXT REFERENCES locations(id),
    summary TEXT
);
CREATE TABLE location_artifacts (
    id TEXT PRIMARY KEY,
    location_id TEXT REFERENCES locations(id),
    name TEXT
);
CREATE TABLE character_location_contexts (
    id TEXT PRIMARY KEY,
    character_id TEXT REFERENCES characters(id),
    location_id TEXT REFERENCES locations(id),
    clothing_description TEXT
);
CREATE TABLE scenes (
    id TEXT PRIMARY KEY,
    story_id TEXT NOT NULL REFERENCES stories(id),
    title TEXT
);
CREATE TABLE scene_location_associations (
    id TEXT PRIMARY KEY,
    scene_id TEXT REFERENCES scenes(id),
    location_id TEXT REFERENCES locations(id)
);
CREATE TABLE ai_location_suggestions (
    id TEXT PRIMARY KEY,
    location_id TEXT REFERENCES locations(id),
    suggestion TEXT,
    confidence REAL
);
CREATE TABLE roadmaps (
    id TEXT PRIMARY KEY,
    story_id TEXT NOT NULL REFERENCES stories(id),
    season_number INTEGER,
    is_active INTEGER
);
CREATE TABLE roadmap_episodes (
    id TEXT PRIMARY KEY,
    roadmap_id TEXT REFERENCES roadmaps(id),
    episode_number INTEGER,
    episode_title TEXT
);
CREATE TABLE roadmap_scenes (
    id TEXT PRIMARY KEY,
    episode_id TEXT REFERENCES roadmap_episodes(id),
    scene_number INTEGER,
    scene_title TEXT
);
CREATE TABLE episodes (
    id TEXT PRIMARY KEY,
    story_id TEXT NOT NULL REFERENCES stories(id),
    episode_number INTEGER,
    status TEXT
);
CREATE TABLE narrative_facts (
    id TEXT PRIMARY KEY,
    story_id TEXT NOT NULL REFERENCES stories(id),
    fact TEXT
);
CREATE TABLE episode_continuity_notes (
    id TEXT PRIMARY KEY,
    episode_id TEXT REFERENCES episodes(id),
    continuity_summary TEXT
);
CREATE TABLE app_settings (
    key TEXT PRIMARY KEY,
    value TEXT
);
"#;

/// Create an on-disk database with the story schema. The returned
/// connection is writable for seeding; `Db` hands out read-only ones.
pub fn story_db() -> (Db, Connection, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("stories.db");
    let conn = Connection::open(&db_path).unwrap();
    conn.execute_batch(STORY_SCHEMA).unwrap();
    (Db::new(&db_path), conn, temp_dir)
}

/// Seed one story keyed `key` with a row in every story table. Every row id
/// starts with `key`.
pub fn seed_story(conn: &Connection, key: &str, title: &str) {
    let id = |suffix: &str| format!("{}-{}", key, suffix);
    conn.execute(
        "INSERT INTO stories (id, title, description) VALUES (?1, ?2, ?3)",
        params![key, title, format!("The {} saga", key)],
    )
    .unwrap();
    for (suffix, name, role) in [
        ("char", "Cat", "protagonist"),
        ("char2", "Daniel", "deuteragonist"),
    ] {
        conn.execute(
            "INSERT INTO characters (id, story_id, name, role) VALUES (?1, ?2, ?3, ?4)",
            params![id(suffix), key, name, role],
        )
        .unwrap();
    }
    conn.execute(
        "INSERT INTO character_relationships VALUES (?1, ?2, ?3, 'allies')",
        params![id("rel"), id("char"), id("char2")],
    )
    .unwrap();
    for (n, suffix) in [(1, "arc"), (2, "arc2")] {
        conn.execute(
            "INSERT INTO plot_arcs (id, story_id, title, arc_number) VALUES (?1, ?2, ?3, ?4)",
            params![id(suffix), key, format!("Arc {}", n), n],
        )
        .unwrap();
    }
    conn.execute(
        "INSERT INTO plot_points VALUES (?1, ?2, 'Inciting incident')",
        params![id("pp"), id("arc")],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO arc_connections VALUES (?1, ?2, ?3, 'escalates')",
        params![id("conn"), id("arc"), id("arc2")],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO locations VALUES (?1, ?2, 'Safehouse')",
        params![id("loc"), key],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO location_arcs VALUES (?1, ?2, 'Falls apart')",
        params![id("larc"), id("loc")],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO location_artifacts VALUES (?1, ?2, 'Radio')",
        params![id("art"), id("loc")],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO character_location_contexts VALUES (?1, ?2, ?3, 'Rain jacket')",
        params![id("clc"), id("char"), id("loc")],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO scenes VALUES (?1, ?2, 'Opening')",
        params![id("scene"), key],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO scene_location_associations VALUES (?1, ?2, ?3)",
        params![id("sla"), id("scene"), id("loc")],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO ai_location_suggestions VALUES (?1, ?2, 'Add a rooftop', 0.7)",
        params![id("ai"), id("loc")],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO roadmaps VALUES (?1, ?2, 1, 1)",
        params![id("rm"), key],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO roadmap_episodes VALUES (?1, ?2, 1, 'Pilot')",
        params![id("rep"), id("rm")],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO roadmap_scenes VALUES (?1, ?2, 1, 'Cold open')",
        params![id("rsc"), id("rep")],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO episodes VALUES (?1, ?2, 1, 'completed')",
        params![id("ep"), key],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO narrative_facts VALUES (?1, ?2, 'The grid is down')",
        params![id("fact"), key],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO episode_continuity_notes VALUES (?1, ?2, 'Cat trusts no one')",
        params![id("note"), id("ep")],
    )
    .unwrap();
}
