//! Crawler module for distributed page extraction
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching and Content-Type filtering
//! - HTML parsing and reference extraction
//! - The per-worker claim/extract/enqueue state machine
//! - Seeding and running a pool of workers

mod coordinator;
mod fetcher;
mod parser;
mod worker;

pub use coordinator::{Coordinator, CrawlReport};
pub use fetcher::{
    build_http_client, fetch_and_extract, FetchError, FetchOutcome, FetchedResource, Fetcher,
    HttpFetcher,
};
pub use parser::{extract_refs, ExtractedRefs};
pub use worker::{Worker, WorkerOptions, WorkerReport, WorkerState, WorkerStats};

use crate::config::Config;
use crate::store::SharedStore;
use crate::SwarmError;
use std::sync::Arc;

/// Runs a complete crawl from one seed
///
/// This is the main entry point for a crawl process. It will:
/// 1. Build the HTTP fetcher from configuration
/// 2. Add the seed URL to the shared frontier
/// 3. Run `config.crawler.workers` workers until they all stop
///
/// Other processes pointed at the same store may seed and run workers
/// concurrently; they all join the same crawl.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use sumi_swarm::config::Config;
/// use sumi_swarm::crawler::crawl;
/// use sumi_swarm::store::{RedisStore, StoreKeys};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Config::default();
/// let store = RedisStore::connect(&config.store.url, StoreKeys::default()).await?;
/// let report = crawl(&config, Arc::new(store), "https://example.com/").await?;
/// println!("{} pages extracted", report.totals().pages_extracted);
/// # Ok(())
/// # }
/// ```
pub async fn crawl(
    config: &Config,
    store: Arc<dyn SharedStore>,
    seed: &str,
) -> Result<CrawlReport, SwarmError> {
    let coordinator = Coordinator::from_config(config, store)?;
    coordinator.seed(seed).await?;
    coordinator.run_n(config.crawler.workers).await
}
