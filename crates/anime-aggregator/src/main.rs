//! Anime aggregator CLI application.

use anime_aggregator::adapters::coerce::weekday_from_number;
use anime_aggregator::adapters::DEFAULT_SEARCH_LIMIT;
use anime_aggregator::{build_adapters, spawn_sweeper, Aggregator};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use shared::{Config, LogConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Merged catalog listing
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,

        #[arg(long, default_value_t = 20)]
        page_size: u32,

        /// Bypass the cache
        #[arg(long)]
        force_refresh: bool,
    },

    /// Search every source by keyword
    Search {
        keyword: String,

        #[arg(long, default_value_t = DEFAULT_SEARCH_LIMIT)]
        limit: usize,
    },

    /// Airing schedule
    Schedule {
        /// Weekday, 1 = Monday .. 7 = Sunday (whole week if omitted)
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=7))]
        day: Option<u8>,
    },

    /// One title from one platform
    Detail { platform: String, id: String },

    /// Registered platforms
    Platforms,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Initialize logging; stdout is reserved for results
    let mut log_config = LogConfig::from_config(&config.logging, "anime-aggregator");
    if args.verbose {
        log_config.default_level = Level::DEBUG;
    }
    shared::logging::init(log_config)?;

    info!(config_file = %args.config.display(), "Loaded configuration");

    let adapters = build_adapters(&config).context("Failed to initialize source adapters")?;
    let aggregator = Aggregator::from_config(adapters, &config.aggregator);

    let sweeper = spawn_sweeper(
        Arc::clone(aggregator.cache()),
        std::time::Duration::from_secs(config.aggregator.sweep_interval_seconds),
    );

    match args.command {
        Command::List {
            page,
            page_size,
            force_refresh,
        } => {
            anyhow::ensure!(page > 0 && page_size > 0, "page and page size must be positive");
            print_json(&aggregator.list(page, page_size, force_refresh).await)?;
        }
        Command::Search { keyword, limit } => {
            print_json(&aggregator.search(&keyword, limit).await)?;
        }
        Command::Schedule { day } => {
            let day = day.and_then(weekday_from_number);
            print_json(&aggregator.schedule(day).await)?;
        }
        Command::Detail { platform, id } => {
            anyhow::ensure!(
                aggregator.has_platform(&platform),
                "Unknown or disabled platform: {} (available: {})",
                platform,
                aggregator.platforms().join(", ")
            );
            print_json(&aggregator.detail(&platform, &id).await)?;
        }
        Command::Platforms => {
            print_json(&aggregator.platforms())?;
        }
    }

    sweeper.abort();

    let stats = aggregator.cache().stats();
    info!(
        entries = stats.entries,
        hits = stats.hits,
        misses = stats.misses,
        "Cache statistics"
    );

    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let output = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", output);
    Ok(())
}
