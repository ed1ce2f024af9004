//! Sumi-Swarm main entry point
//!
//! This is the command-line interface for the Sumi-Swarm distributed crawler.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use sumi_swarm::config::{load_config_with_hash, validate, validate_seed_url, Config};
use sumi_swarm::crawler::Coordinator;
use sumi_swarm::store::{RedisStore, SharedStore, StoreKeys};
use tracing_subscriber::EnvFilter;

/// Sumi-Swarm: a distributed image crawler
///
/// Crawls every same-host page reachable from a seed URL and collects the
/// images they show. Coordination state lives in Redis, so any number of
/// sumi-swarm processes pointed at the same Redis cooperate on one crawl.
#[derive(Parser, Debug)]
#[command(name = "sumi-swarm")]
#[command(version)]
#[command(about = "A distributed image crawler", long_about = None)]
struct Cli {
    /// The seed URL to crawl from
    #[arg(long, value_name = "URL")]
    url: String,

    /// Redis address as host:port or a redis:// URL (overrides the config file)
    #[arg(long, value_name = "ADDR")]
    redis_addr: Option<String>,

    /// Number of concurrent workers in this process (overrides the config file)
    #[arg(long, short = 'w')]
    workers: Option<usize>,

    /// Namespace for the shared store keys (overrides the config file)
    #[arg(long)]
    key_prefix: Option<String>,

    /// Path to TOML configuration file
    #[arg(long, short = 'c', value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Delete any previous crawl state in the store before seeding
    #[arg(long)]
    fresh: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config = resolve_config(&cli)?;
    let seed = validate_seed_url(&cli.url)?;

    let keys = StoreKeys::with_prefix(&config.store.key_prefix);
    let store = RedisStore::connect(&config.store.url, keys)
        .await
        .with_context(|| format!("connecting to shared store at {}", config.store.url))?;
    let store: Arc<dyn SharedStore> = Arc::new(store);

    if cli.fresh {
        tracing::info!("Starting fresh crawl (clearing previous state)");
        store.clear().await.context("clearing previous crawl state")?;
    } else {
        tracing::info!("Starting crawl (joins any crawl already in the store)");
    }

    let coordinator = Coordinator::from_config(&config, Arc::clone(&store))?;
    coordinator.seed(seed.as_str()).await?;
    let report = coordinator.run_n(config.crawler.workers).await?;

    if report.failed_workers() > 0 {
        tracing::error!(
            "{} of {} workers stopped on store failures; results may be incomplete",
            report.failed_workers(),
            report.workers.len()
        );
    }

    print_results(store.as_ref()).await?;

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_swarm=info,warn"),
            1 => EnvFilter::new("sumi_swarm=debug,info"),
            2 => EnvFilter::new("sumi_swarm=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads the config file (if any) and applies command-line overrides
fn resolve_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("loading configuration from {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => Config::default(),
    };

    if let Some(addr) = &cli.redis_addr {
        config.store.set_address(addr);
    }
    if let Some(workers) = cli.workers {
        config.crawler.workers = workers;
    }
    if let Some(prefix) = &cli.key_prefix {
        config.store.key_prefix = prefix.clone();
    }

    validate(&config)?;
    Ok(config)
}

/// Reports the visited pages and found images, sorted for stable output
async fn print_results(store: &dyn SharedStore) -> anyhow::Result<()> {
    let mut visited = store.visited().await.context("reading visited set")?;
    let mut images = store.image_results().await.context("reading image results")?;
    visited.sort();
    images.sort();

    println!("Crawling Complete");
    println!("\nVisited HREFs ({}):", visited.len());
    for url in &visited {
        println!("  {}", url);
    }
    println!("\nFound Images ({}):", images.len());
    for url in &images {
        println!("  {}", url);
    }

    Ok(())
}
