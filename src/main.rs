use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use storydump::db::Db;
use storydump::document::{assemble, AssembleOptions};
use storydump::export::{Exporter, PlanResolution};
use storydump::render::{output_file_name, write_document, Format};
use storydump::story::{find_story, list_stories};
use storydump::Config;

#[derive(Parser, Debug)]
#[command(name = "storydump")]
#[command(about = "Export one story and everything it owns from the story database")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Export a story to a document
    Export {
        /// Story id or title fragment
        story: String,

        /// Comma-separated tables to export instead of the configured list
        #[arg(long, value_delimiter = ',')]
        tables: Option<Vec<String>>,

        /// Output format: md, csv or json
        #[arg(short, long)]
        format: Option<Format>,

        /// Output file (defaults to <output_dir>/<title>_dump.<ext>)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Dump tables that cannot be scoped to the story, with a warning
        #[arg(long)]
        allow_unscoped: bool,
    },
    /// Show how each table would be scoped, without reading rows
    Plan {
        /// Story id or title fragment
        story: String,

        #[arg(long, value_delimiter = ',')]
        tables: Option<Vec<String>>,
    },
    /// List stories in the database
    Stories,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logger first so config loading can report; RUST_LOG wins over log_level
    let rust_log_set = std::env::var_os("RUST_LOG").is_some();
    env_logger::Builder::from_env(
        env_logger::Env::default()
            .filter_or("RUST_LOG", "trace")
    ).init();
    if !rust_log_set {
        log::set_max_level(log::LevelFilter::Info);
    }

    let args = Args::parse();

    let config = Config::load()?;
    if !rust_log_set {
        log::set_max_level(config.log_level());
    }

    let db = Db::new(config.db_path());
    log::debug!("Database path: {}", db.path().display());

    match args.command {
        Command::Export { story, tables, format, output, allow_unscoped } => {
            let mut config = config;
            if let Some(tables) = tables {
                config.validate_tables(&tables)?;
                config.export.tables = tables;
            }
            if let Some(format) = format {
                config.export.format = format;
            }
            if allow_unscoped {
                config.export.allow_unscoped = true;
            }
            run_export(&config, db, &story, output).await?;
        }
        Command::Plan { story, tables } => {
            let tables = match tables {
                Some(tables) => {
                    config.validate_tables(&tables)?;
                    tables
                }
                None => config.export.tables.clone(),
            };
            run_plan(&config, db, &story, tables).await?;
        }
        Command::Stories => {
            let stories = db.with_connection(|conn| list_stories(conn)).await?;
            if stories.is_empty() {
                println!("No stories found in {}", config.db_path().display());
            }
            for story in stories {
                println!(
                    "{}  {}  {}",
                    story.id,
                    story.created_at.as_deref().unwrap_or("-"),
                    story.title
                );
            }
        }
    }

    Ok(())
}

async fn run_export(config: &Config, db: Db, query: &str, output: Option<PathBuf>) -> Result<()> {
    let graph = config.relationship_graph()?;
    let policy = config.unscoped_policy();
    let format = config.export.format;

    let lookup = query.to_string();
    let story = db
        .with_connection(move |conn| find_story(conn, &lookup))
        .await
        .context("Cannot export without a story")?;
    log::info!("Exporting story '{}' ({})", story.title, story.id);

    let tables = config.export.tables.clone();
    let root_id = story.id.clone();
    let results = tokio::task::spawn_blocking(move || {
        Exporter::new(&graph)
            .with_policy(policy)
            .run(&db, &root_id, &tables)
    })
    .await?;

    let options = AssembleOptions {
        drop_columns: config.export.drop_columns.clone(),
    };
    let doc = assemble(&story, Utc::now(), &results, &options);

    let path = output.unwrap_or_else(|| {
        config
            .output_dir()
            .join(output_file_name(&story.title, &story.id, format))
    });
    let path = write_document(&doc, format, &path)?;

    let summary = doc.summary();
    println!("Exported '{}' to {}", doc.title, path.display());
    println!(
        "  {} tables with rows ({} rows), {} empty, {} skipped, {} errors",
        summary.tables, summary.rows, summary.empty, summary.skipped, summary.errors
    );
    if summary.unscoped > 0 {
        log::warn!("{} tables were dumped without story scoping", summary.unscoped);
    }
    if summary.errors > 0 {
        log::warn!("Some tables failed; see the error sections in {}", path.display());
    }

    Ok(())
}

async fn run_plan(config: &Config, db: Db, query: &str, tables: Vec<String>) -> Result<()> {
    let graph = config.relationship_graph()?;
    let policy = config.unscoped_policy();

    let lookup = query.to_string();
    let story = db
        .with_connection(move |conn| find_story(conn, &lookup))
        .await
        .context("Cannot plan without a story")?;

    let root_id = story.id.clone();
    let plans = tokio::task::spawn_blocking(move || {
        Exporter::new(&graph)
            .with_policy(policy)
            .plan(&db, &root_id, &tables)
    })
    .await?;

    println!("Plan for '{}' ({})", story.title, story.id);
    for plan in plans {
        match plan.resolution {
            PlanResolution::Scoped { predicate, sql } => {
                println!("{:<32} {:<16} {}", plan.table, predicate.pattern, sql);
            }
            PlanResolution::Unresolved { sql } => {
                let action = if config.export.allow_unscoped { "unscoped" } else { "skip" };
                println!("{:<32} {:<16} {}", plan.table, action, sql);
            }
            PlanResolution::Failed { reason } => {
                println!("{:<32} {:<16} {}", plan.table, "error", reason);
            }
        }
    }

    Ok(())
}
