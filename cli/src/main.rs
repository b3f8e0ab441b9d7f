mod config;
mod db;
mod input;
mod matching;
mod models;
mod report;
mod schema;
mod store;
mod vocabulary;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use larder_core::{IngredientStore, MemoryStore, SourceKind};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{MatchOptions, RunConfig, DEFAULT_DATABASE_URL};
use crate::input::{read_json, IngredientInput, ProductInput, RecipeInput};
use crate::matching::{PRODUCT_DEFAULTS, RECIPE_DEFAULTS, TAG_DEFAULTS};
use crate::store::SqliteStore;

#[derive(Parser)]
#[command(name = "larder")]
#[command(about = "Link food products and recipes to an ingredient vocabulary", long_about = None)]
struct Cli {
    /// SQLite database path
    #[arg(long, global = true, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
    database_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and run pending migrations
    Init,
    /// Load a scraped ingredient list (JSON array of {name, image_url})
    LoadVocabulary {
        file: PathBuf,
        /// Source label stored with new entries
        #[arg(long, default_value = "marmiton")]
        source: String,
    },
    /// Match product ingredient tags against the vocabulary
    MatchProducts {
        file: PathBuf,
        #[command(flatten)]
        options: MatchOptions,
    },
    /// Match recipe ingredient lists against the vocabulary
    MatchRecipes {
        file: PathBuf,
        #[command(flatten)]
        options: MatchOptions,
    },
    /// Link distinct product ingredient tags to the vocabulary
    LinkTags {
        file: PathBuf,
        #[command(flatten)]
        options: MatchOptions,
    },
    /// Add frequent recipe ingredient names missing from the vocabulary
    Discover {
        file: PathBuf,
        /// Source label stored with discovered entries
        #[arg(long, default_value = "marmiton_recipe")]
        source: String,
        /// How many of the most frequent names to consider
        #[arg(long, default_value_t = larder_core::discovery::DEFAULT_TOP_NAMES)]
        top: usize,
        /// Report what would be added without writing
        #[arg(long)]
        dry_run: bool,
    },
    /// List products whose ingredient text mentions vocabulary keywords
    Usable {
        file: PathBuf,
        /// Only use vocabulary rows from this source
        #[arg(long)]
        vocabulary_source: Option<String>,
    },
    /// Parse ingredient phrases and print the result
    Parse {
        #[arg(required = true)]
        texts: Vec<String>,
    },
    /// Show vocabulary size and match counts per source kind
    Stats {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Dump stored matches of one source kind as JSON
    Export {
        /// product, recipe or tag
        #[arg(value_parser = parse_kind)]
        kind: SourceKind,
    },
}

fn parse_kind(s: &str) -> Result<SourceKind, String> {
    SourceKind::from_str(s).ok_or_else(|| format!("unknown source kind: {}", s))
}

fn init_telemetry() {
    // stdout carries command output.
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn open_store(database_url: &str) -> Result<SqliteStore> {
    let pool = db::create_pool(database_url)
        .with_context(|| format!("Failed to open database {}", database_url))?;
    Ok(SqliteStore::new(pool))
}

/// Copy of the stored vocabulary for runs that must not write.
fn dry_run_store(store: &SqliteStore) -> Result<MemoryStore> {
    let ingredients = store.load_vocabulary(None)?;
    tracing::info!(ingredients = ingredients.len(), "dry run, nothing will be written");
    Ok(MemoryStore::with_ingredients(ingredients))
}

fn main() -> Result<()> {
    init_telemetry();
    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            open_store(&cli.database_url)?;
            println!("Database ready at {}", cli.database_url);
        }
        Commands::LoadVocabulary { file, source } => {
            let store = open_store(&cli.database_url)?;
            let entries: Vec<IngredientInput> = read_json(&file)?;
            print_json(&vocabulary::load_vocabulary(&store, &entries, &source)?)?;
        }
        Commands::MatchProducts { file, options } => {
            let store = open_store(&cli.database_url)?;
            let config = RunConfig::resolve(&options, PRODUCT_DEFAULTS)?;
            tracing::debug!(?config, "resolved match configuration");
            let products: Vec<ProductInput> = read_json(&file)?;
            let report = if options.dry_run {
                matching::match_products(&dry_run_store(&store)?, &products, &config)?
            } else {
                matching::match_products(&store, &products, &config)?
            };
            print_json(&report)?;
        }
        Commands::MatchRecipes { file, options } => {
            let store = open_store(&cli.database_url)?;
            let config = RunConfig::resolve(&options, RECIPE_DEFAULTS)?;
            tracing::debug!(?config, "resolved match configuration");
            let recipes: Vec<RecipeInput> = read_json(&file)?;
            let report = if options.dry_run {
                matching::match_recipes(&dry_run_store(&store)?, &recipes, &config)?
            } else {
                matching::match_recipes(&store, &recipes, &config)?
            };
            print_json(&report)?;
        }
        Commands::LinkTags { file, options } => {
            let store = open_store(&cli.database_url)?;
            let config = RunConfig::resolve(&options, TAG_DEFAULTS)?;
            tracing::debug!(?config, "resolved match configuration");
            let products: Vec<ProductInput> = read_json(&file)?;
            let report = if options.dry_run {
                matching::link_tags(&dry_run_store(&store)?, &products, &config)?
            } else {
                matching::link_tags(&store, &products, &config)?
            };
            print_json(&report)?;
        }
        Commands::Discover {
            file,
            source,
            top,
            dry_run,
        } => {
            let store = open_store(&cli.database_url)?;
            let recipes: Vec<RecipeInput> = read_json(&file)?;
            let report = if dry_run {
                vocabulary::discover(&dry_run_store(&store)?, &recipes, &source, top)?
            } else {
                vocabulary::discover(&store, &recipes, &source, top)?
            };
            print_json(&report)?;
        }
        Commands::Usable {
            file,
            vocabulary_source,
        } => {
            let store = open_store(&cli.database_url)?;
            let products: Vec<ProductInput> = read_json(&file)?;
            let usable =
                report::usable_products(&store, &products, vocabulary_source.as_deref())?;
            print_json(&usable)?;
        }
        Commands::Parse { texts } => {
            print_json(&report::parse_phrases(&texts))?;
        }
        Commands::Stats { json } => {
            let store = open_store(&cli.database_url)?;
            let stats = report::stats(&store)?;
            if json {
                print_json(&stats)?;
            } else {
                print!("{}", report::format_stats(&stats));
            }
        }
        Commands::Export { kind } => {
            let store = open_store(&cli.database_url)?;
            print_json(&store.matches(kind)?)?;
        }
    }

    Ok(())
}
