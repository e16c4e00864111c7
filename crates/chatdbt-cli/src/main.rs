use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use chatdbt_core::{snapshot, ArtifactMode, Config};
use chatdbt_dbt::{ArtifactReader, GraphBuilder};
use chatdbt_engine::{QueryEngine, QueryRequest};

const DEFAULT_CONFIG: &str = "chatdbt.toml";

/// chatdbt - Ask questions about your dbt project's metadata
#[derive(Parser)]
#[command(name = "chatdbt")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: chatdbt.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// dbt project directory (overrides DBT_PROJECT_DIR and the config file)
    #[arg(short, long, global = true)]
    project_dir: Option<PathBuf>,

    /// Snapshot file to write or read
    #[arg(short, long, global = true)]
    snapshot: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read dbt artifacts, build the metadata graph and save a snapshot
    Extract {
        /// Artifact mode: auto, manifest or raw
        #[arg(short, long)]
        mode: Option<ArtifactMode>,

        /// Run `dbt compile` first
        #[arg(long)]
        compile: bool,

        /// Where to write the snapshot
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Ask a question in plain language
    Ask {
        /// The question
        query: Vec<String>,

        /// Pre-classified intent (query_model_description, query_column_info,
        /// query_relationships, query_lineage, search)
        #[arg(short, long)]
        intent: Option<String>,

        /// Model name entity
        #[arg(long)]
        model: Option<String>,

        /// Column name entity
        #[arg(long)]
        column: Option<String>,
    },

    /// Describe a model
    Model {
        name: String,
    },

    /// Describe a column of a model
    Column {
        model: String,
        column: String,
    },

    /// List relationships a model takes part in
    Relationships {
        name: String,
    },

    /// Show upstream and downstream models
    Lineage {
        name: String,
    },

    /// Search model and column descriptions
    Search {
        text: Vec<String>,
    },

    /// Check the dbt connection with `dbt debug`
    Debug,

    /// Show counts from the saved snapshot
    Stats {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let config = load_config(&cli)?;

    match cli.command {
        Commands::Extract { mode, compile, output } => {
            extract_command(config, mode, compile, output, cli.verbose)
        }
        Commands::Ask { query, intent, model, column } => {
            let mut request = QueryRequest::new(query.join(" "));
            request.intent = intent;
            request.entities.model_name = model;
            request.entities.column_name = column;
            let engine = open_engine(&config)?;
            print_answer(&engine.answer(&request));
            Ok(())
        }
        Commands::Model { name } => {
            print_answer(&open_engine(&config)?.model_answer(&name));
            Ok(())
        }
        Commands::Column { model, column } => {
            print_answer(&open_engine(&config)?.column_answer(&model, &column));
            Ok(())
        }
        Commands::Relationships { name } => {
            print_answer(&open_engine(&config)?.relationships_answer(&name));
            Ok(())
        }
        Commands::Lineage { name } => {
            print_answer(&open_engine(&config)?.lineage_answer(&name));
            Ok(())
        }
        Commands::Search { text } => {
            print_answer(&open_engine(&config)?.search_answer(&text.join(" ")));
            Ok(())
        }
        Commands::Debug => debug_command(&config),
        Commands::Stats { json } => stats_command(&config, json),
    }
}

/// Config file, then `.env` / `DBT_PROJECT_DIR`, then command-line overrides
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = if let Some(config_path) = &cli.config {
        Config::from_file(config_path)
            .with_context(|| format!("Failed to load config {}", config_path.display()))?
    } else if Path::new(DEFAULT_CONFIG).exists() {
        Config::from_file(Path::new(DEFAULT_CONFIG))?
    } else {
        if cli.verbose {
            eprintln!("{}", "No config file found, using defaults".yellow());
        }
        Config::default()
    };

    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "loaded environment file");
    }

    if let Ok(dir) = std::env::var("DBT_PROJECT_DIR") {
        if !dir.trim().is_empty() {
            config.project_dir = PathBuf::from(dir);
        }
    }

    if let Some(dir) = &cli.project_dir {
        config.project_dir = dir.clone();
    }

    if let Some(path) = &cli.snapshot {
        config.snapshot_path = path.clone();
    }

    Ok(config)
}

fn open_engine(config: &Config) -> Result<QueryEngine> {
    let graph = snapshot::load(&config.snapshot_path)?;
    Ok(QueryEngine::new(Arc::new(graph)).with_search_config(config.search.clone()))
}

fn print_answer(answer: &str) {
    println!("{}", answer);
}

/// Extract command - read artifact, build graph, save snapshot
fn extract_command(
    mut config: Config,
    mode: Option<ArtifactMode>,
    compile: bool,
    output: Option<PathBuf>,
    verbose: bool,
) -> Result<()> {
    if let Some(mode) = mode {
        config.artifacts.mode = mode;
    }
    if compile {
        config.artifacts.compile = true;
    }
    if let Some(output) = output {
        config.snapshot_path = output;
    }

    if verbose {
        eprintln!(
            "{} {} ({} mode)",
            "Reading dbt project at".cyan(),
            config.project_dir.display(),
            config.artifacts.mode
        );
    }

    let reader = ArtifactReader::new(&config);
    let artifact = reader.read()?;

    if verbose {
        eprintln!("{} {}", "Loaded".cyan(), artifact.path().display());
    }

    let graph = GraphBuilder::build(&artifact);
    if graph.is_empty() {
        eprintln!("{}", "Warning: no models or sources found".yellow());
    }

    snapshot::save(&graph, &config.snapshot_path)?;

    println!(
        "{} {} ({})",
        "✓ Snapshot saved to".green(),
        config.snapshot_path.display(),
        graph.stats()
    );

    Ok(())
}

/// Debug command - run `dbt debug` in the project directory
fn debug_command(config: &Config) -> Result<()> {
    let reader = ArtifactReader::new(config);

    match reader.check_connection() {
        Ok(output) => {
            if !output.trim().is_empty() {
                println!("{}", output.trim_end());
            }
            println!("{}", "✓ dbt connection OK".green());
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", e.diagnostic().trim_end());
            Err(anyhow::anyhow!("dbt debug failed in {}", config.project_dir.display()))
        }
    }
}

/// Stats command - counts from the saved snapshot
fn stats_command(config: &Config, json: bool) -> Result<()> {
    let graph = snapshot::load(&config.snapshot_path)?;
    let stats = graph.stats();

    if json {
        let value = serde_json::json!({
            "snapshot": config.snapshot_path.display().to_string(),
            "models": stats.models,
            "columns": stats.columns,
            "sources": stats.sources,
            "relationships": stats.relationships,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("{} {}", "Snapshot:".bold(), config.snapshot_path.display());
    println!("  Models:        {}", stats.models.to_string().cyan());
    println!("  Columns:       {}", stats.columns.to_string().cyan());
    println!("  Sources:       {}", stats.sources.to_string().cyan());
    println!("  Relationships: {}", stats.relationships.to_string().cyan());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn extract_flags_parse() {
        let cli = Cli::parse_from([
            "chatdbt", "extract", "--mode", "raw", "--compile", "-o", "out/meta.json", "-p", "proj",
        ]);
        assert_eq!(cli.project_dir, Some(PathBuf::from("proj")));
        match cli.command {
            Commands::Extract { mode, compile, output } => {
                assert_eq!(mode, Some(ArtifactMode::Raw));
                assert!(compile);
                assert_eq!(output, Some(PathBuf::from("out/meta.json")));
            }
            _ => panic!("expected extract"),
        }
    }

    #[test]
    fn ask_joins_words_and_takes_entities() {
        let cli = Cli::parse_from([
            "chatdbt", "ask", "what", "is", "this", "--intent", "query_column_info", "--model", "orders",
        ]);
        match cli.command {
            Commands::Ask { query, intent, model, column } => {
                assert_eq!(query.join(" "), "what is this");
                assert_eq!(intent.as_deref(), Some("query_column_info"));
                assert_eq!(model.as_deref(), Some("orders"));
                assert!(column.is_none());
            }
            _ => panic!("expected ask"),
        }
    }
}
