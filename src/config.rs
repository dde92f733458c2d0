use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::export::UnscopedPolicy;
use crate::relations::{is_identifier, Exception, RelationshipGraph};
use crate::render::Format;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub storydump: StorydumpConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

/// Store and output locations
#[derive(Debug, Clone, Deserialize)]
pub struct StorydumpConfig {
    /// SQLite database holding the stories. `STORYDUMP_DB` overrides it.
    pub db_path: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// What to export and how
#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
    /// Tables in document order.
    #[serde(default = "default_tables")]
    pub tables: Vec<String>,
    /// Columns left out of rendered tables.
    #[serde(default = "default_drop_columns")]
    pub drop_columns: Vec<String>,
    /// Dump tables no relationship resolves for, instead of skipping them.
    #[serde(default)]
    pub allow_unscoped: bool,
    #[serde(default)]
    pub format: Format,
    /// Extra hand-authored predicates, keyed by table.
    #[serde(default)]
    pub exceptions: Vec<Exception>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            tables: default_tables(),
            drop_columns: default_drop_columns(),
            allow_unscoped: false,
            format: Format::default(),
            exceptions: Vec::new(),
        }
    }
}

/// Story tables in dependency order: core context, locations, the plan,
/// then continuity.
pub fn default_tables() -> Vec<String> {
    [
        "stories",
        "characters",
        "character_relationships",
        "plot_arcs",
        "plot_points",
        "arc_connections",
        "location_arcs",
        "location_artifacts",
        "character_location_contexts",
        "scene_location_associations",
        "ai_location_suggestions",
        "roadmaps",
        "roadmap_episodes",
        "roadmap_scenes",
        "episodes",
        "narrative_facts",
        "episode_continuity_notes",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_drop_columns() -> Vec<String> {
    crate::document::NOISE_COLUMNS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in STORYDUMP_CONFIG environment variable
    /// 2. ./storydump.toml in current directory
    pub fn load() -> Result<Self> {
        // .env is optional
        let _ = dotenv::dotenv();

        let config_path = std::env::var("STORYDUMP_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("storydump.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config = Self::from_toml_str(&config_str)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        if let Ok(db) = std::env::var("STORYDUMP_DB") {
            log::info!("Database path overridden by STORYDUMP_DB: {}", db);
            config.storydump.db_path = PathBuf::from(db);
        }

        config.validate()?;

        Ok(config)
    }

    /// Parse configuration without touching the environment or validating paths
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).context("Invalid configuration")?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !self.storydump.db_path.is_file() {
            anyhow::bail!(
                "db_path does not exist or is not a file: {}. Set db_path in storydump.toml or STORYDUMP_DB.",
                self.storydump.db_path.display()
            );
        }

        if self.storydump.log_level.parse::<log::LevelFilter>().is_err() {
            anyhow::bail!(
                "log_level '{}' is not one of off, error, warn, info, debug, trace",
                self.storydump.log_level
            );
        }

        self.validate_tables(&self.export.tables)?;

        // Surface bad exceptions at startup rather than mid-export
        self.relationship_graph()?;

        Ok(())
    }

    /// Check a table list: non-empty, plain identifiers, no repeats
    pub fn validate_tables(&self, tables: &[String]) -> Result<()> {
        if tables.is_empty() {
            anyhow::bail!("export.tables must list at least one table");
        }
        let mut seen = HashSet::new();
        for table in tables {
            if !is_identifier(table) {
                anyhow::bail!("export.tables entry '{}' is not a plain table name", table);
            }
            if !seen.insert(table.as_str()) {
                anyhow::bail!("export.tables lists '{}' twice", table);
            }
        }
        Ok(())
    }

    /// The story relationship graph with configured exceptions applied
    pub fn relationship_graph(&self) -> Result<RelationshipGraph> {
        RelationshipGraph::story_builder()
            .exceptions(&self.export.exceptions)
            .build()
            .context("Invalid export.exceptions")
    }

    pub fn unscoped_policy(&self) -> UnscopedPolicy {
        if self.export.allow_unscoped {
            UnscopedPolicy::DumpWithWarning
        } else {
            UnscopedPolicy::Skip
        }
    }

    /// Configured log level; `info` when unparseable
    pub fn log_level(&self) -> log::LevelFilter {
        self.storydump
            .log_level
            .parse()
            .unwrap_or(log::LevelFilter::Info)
    }

    /// Get database path
    pub fn db_path(&self) -> &Path {
        &self.storydump.db_path
    }

    pub fn output_dir(&self) -> &Path {
        &self.storydump.output_dir
    }
}
