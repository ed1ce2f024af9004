//! Crawler coordinator - seeds the frontier and runs the worker pool
//!
//! The coordinator holds no crawl state of its own. Seeding writes to the
//! shared store and every worker it launches coordinates only through that
//! store, so several processes may each run a coordinator against the same
//! store and cooperate on one crawl.

use crate::config::Config;
use crate::crawler::fetcher::{Fetcher, HttpFetcher};
use crate::crawler::worker::{Worker, WorkerOptions, WorkerReport, WorkerStats};
use crate::store::SharedStore;
use crate::url::canonicalize_str;
use crate::SwarmError;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::Instrument;

/// Summary of one `run_n` call
#[derive(Debug)]
pub struct CrawlReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// One report per worker, ordered by worker id
    pub workers: Vec<WorkerReport>,
}

impl CrawlReport {
    /// Counters summed across all workers
    pub fn totals(&self) -> WorkerStats {
        let mut totals = WorkerStats::default();
        for report in &self.workers {
            totals.merge(&report.stats);
        }
        totals
    }

    /// Number of workers that stopped on a store failure
    pub fn failed_workers(&self) -> usize {
        self.workers.iter().filter(|r| r.is_failed()).count()
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Main crawler coordinator structure
pub struct Coordinator {
    store: Arc<dyn SharedStore>,
    fetcher: Arc<dyn Fetcher>,
    options: WorkerOptions,
}

impl Coordinator {
    /// Creates a coordinator from explicit parts
    pub fn new(
        store: Arc<dyn SharedStore>,
        fetcher: Arc<dyn Fetcher>,
        options: WorkerOptions,
    ) -> Self {
        Self {
            store,
            fetcher,
            options,
        }
    }

    /// Creates a coordinator that fetches over HTTP as configured
    pub fn from_config(config: &Config, store: Arc<dyn SharedStore>) -> Result<Self, SwarmError> {
        let fetcher = HttpFetcher::new(&config.fetch, &config.user_agent)?;
        Ok(Self::new(
            store,
            Arc::new(fetcher),
            WorkerOptions::from(&config.crawler),
        ))
    }

    /// Canonicalizes `url` and adds it to the frontier, returning the stored form
    pub async fn seed(&self, url: &str) -> Result<String, SwarmError> {
        let canonical = canonicalize_str(url)?;
        self.store.enqueue_seed(&canonical).await?;
        tracing::info!("Seeded frontier with {}", canonical);
        Ok(canonical)
    }

    /// Launches `n` workers in parallel and waits for every one to stop
    ///
    /// There is no deadline: this returns once all workers have terminated
    /// or exited on a store failure. A worker panic is reported as an error
    /// after the remaining workers have finished.
    pub async fn run_n(&self, n: usize) -> Result<CrawlReport, SwarmError> {
        let started_at = Utc::now();
        tracing::info!("Starting {} workers", n);

        let mut set = JoinSet::new();
        for id in 0..n {
            let worker = Worker::new(
                id,
                Arc::clone(&self.store),
                Arc::clone(&self.fetcher),
                self.options.clone(),
            );
            set.spawn(worker.run().instrument(tracing::info_span!("worker", id)));
        }

        let mut workers = Vec::with_capacity(n);
        let mut panicked = None;

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(report) => workers.push(report),
                Err(e) => {
                    tracing::error!("Worker task failed: {}", e);
                    panicked.get_or_insert(e);
                }
            }
        }

        if let Some(e) = panicked {
            return Err(e.into());
        }

        workers.sort_by_key(|r| r.id);

        let report = CrawlReport {
            started_at,
            finished_at: Utc::now(),
            workers,
        };

        let totals = report.totals();
        tracing::info!(
            "Crawl finished in {}ms: {} pages extracted, {} duplicates, {} non-HTML, {} fetch failures, {} failed workers",
            report.duration().num_milliseconds(),
            totals.pages_extracted,
            totals.duplicates_skipped,
            totals.non_html_skipped,
            totals.fetch_failures,
            report.failed_workers()
        );

        Ok(report)
    }
}
