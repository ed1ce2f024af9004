//! Crawl worker and its lifecycle state machine
//!
//! A worker repeatedly claims one URL from the shared frontier, dedups it
//! against the visited set, extracts it and enqueues what it found. When the
//! frontier runs dry it steps out of the active count and polls until
//! either new work shows up or no worker anywhere is active.
//!
//! ```text
//!            incr                       frontier empty, decr
//!   Idle ──────────▶ Active ───────────────────────────────▶ QuiescenceCheck
//!                      ▲                                       │        ▲
//!                      │ frontier non-empty, incr   active > 0 │        │ frontier empty,
//!                      └──────────────────────── Sleeping ◀────┘        │ re-read active
//!                                                    └──────────────────┘
//!                                           active == 0
//!                          QuiescenceCheck ─────────────▶ Terminated
//! ```
//!
//! Quiescence is declared by whichever worker observes the active count at
//! zero with the frontier empty. This is a polling approximation of
//! distributed termination detection: any new work would have to be
//! enqueued by a worker that is still counted as active.

use crate::config::CrawlerConfig;
use crate::crawler::fetcher::{fetch_and_extract, FetchOutcome, Fetcher};
use crate::store::{SharedStore, StoreError, StoreResult};
use crate::url::resolve;
use std::sync::Arc;
use std::time::Duration;

/// Position of a worker in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Not yet counted as active
    Idle,

    /// Counted as active; claiming and extracting until the frontier is empty
    Active,

    /// Just left the active count; `active` is the last observed counter value
    QuiescenceCheck { active: i64 },

    /// Waiting one poll interval before looking at the frontier again
    Sleeping,

    /// Finished; never left once entered
    Terminated,
}

impl WorkerState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminated)
    }
}

/// Tunables for a worker
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    /// Sleep between quiescence checks
    pub poll_interval: Duration,

    /// Give back the active slot when exiting on a store failure
    pub release_on_store_failure: bool,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self::from(&CrawlerConfig::default())
    }
}

impl From<&CrawlerConfig> for WorkerOptions {
    fn from(config: &CrawlerConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            release_on_store_failure: config.release_on_store_failure,
        }
    }
}

/// Counters for the work one worker performed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// HTML pages whose references were extracted
    pub pages_extracted: u64,
    /// Claims dropped because the URL was already visited
    pub duplicates_skipped: u64,
    /// Claims skipped because the page was not HTML
    pub non_html_skipped: u64,
    /// Claims whose fetch failed
    pub fetch_failures: u64,
    /// Same-host links pushed to the frontier
    pub links_enqueued: u64,
    /// Image URLs added to the result set
    pub images_found: u64,
    /// Times the worker left `Sleeping` to resume claiming
    pub wakeups: u64,
}

impl WorkerStats {
    /// Adds another worker's counters to this one
    pub fn merge(&mut self, other: &WorkerStats) {
        self.pages_extracted += other.pages_extracted;
        self.duplicates_skipped += other.duplicates_skipped;
        self.non_html_skipped += other.non_html_skipped;
        self.fetch_failures += other.fetch_failures;
        self.links_enqueued += other.links_enqueued;
        self.images_found += other.images_found;
        self.wakeups += other.wakeups;
    }
}

/// What a worker reports once it stops
#[derive(Debug)]
pub struct WorkerReport {
    pub id: usize,
    pub stats: WorkerStats,
    /// The store failure that ended the worker early, if any
    pub failure: Option<StoreError>,
}

impl WorkerReport {
    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }
}

/// A single crawl loop coordinating through the shared store
pub struct Worker {
    id: usize,
    store: Arc<dyn SharedStore>,
    fetcher: Arc<dyn Fetcher>,
    options: WorkerOptions,
    state: WorkerState,
    /// Whether this worker currently holds an increment of the active counter
    counted_active: bool,
    stats: WorkerStats,
}

impl Worker {
    pub fn new(
        id: usize,
        store: Arc<dyn SharedStore>,
        fetcher: Arc<dyn Fetcher>,
        options: WorkerOptions,
    ) -> Self {
        Self {
            id,
            store,
            fetcher,
            options,
            state: WorkerState::Idle,
            counted_active: false,
            stats: WorkerStats::default(),
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    /// Runs the state machine until `Terminated` or a store failure
    ///
    /// A store failure ends the loop immediately without passing through
    /// quiescence. Unless `release_on_store_failure` is set, an active slot
    /// held at that moment is never given back, which can leave other
    /// workers polling forever.
    pub async fn run(mut self) -> WorkerReport {
        tracing::debug!("Worker {} starting", self.id);

        while !self.state.is_terminal() {
            if let Err(e) = self.step().await {
                tracing::error!("Worker {} stopping on store failure: {}", self.id, e);
                self.release_after_failure().await;
                return WorkerReport {
                    id: self.id,
                    stats: self.stats,
                    failure: Some(e),
                };
            }
        }

        tracing::debug!("Worker {} terminated: {:?}", self.id, self.stats);

        WorkerReport {
            id: self.id,
            stats: self.stats,
            failure: None,
        }
    }

    /// Performs one state transition and returns the new state
    pub async fn step(&mut self) -> StoreResult<WorkerState> {
        let next = match self.state {
            WorkerState::Idle => {
                self.enter_active().await?;
                WorkerState::Active
            }

            WorkerState::Active => {
                self.drain_frontier().await?;
                let active = self.store.decr_active().await?;
                self.counted_active = false;
                WorkerState::QuiescenceCheck { active }
            }

            WorkerState::QuiescenceCheck { active } => {
                if active <= 0 {
                    tracing::debug!("Worker {} observed quiescence", self.id);
                    WorkerState::Terminated
                } else {
                    WorkerState::Sleeping
                }
            }

            WorkerState::Sleeping => {
                tokio::time::sleep(self.options.poll_interval).await;

                if self.store.frontier_size().await? > 0 {
                    self.stats.wakeups += 1;
                    self.enter_active().await?;
                    WorkerState::Active
                } else {
                    let active = self.store.get_active().await?;
                    WorkerState::QuiescenceCheck { active }
                }
            }

            WorkerState::Terminated => WorkerState::Terminated,
        };

        self.state = next;
        Ok(next)
    }

    async fn enter_active(&mut self) -> StoreResult<()> {
        self.store.incr_active().await?;
        self.counted_active = true;
        Ok(())
    }

    /// Claims and processes URLs until the frontier is observed empty
    async fn drain_frontier(&mut self) -> StoreResult<()> {
        while let Some(url) = self.store.claim_next().await? {
            self.process(&url).await?;
        }
        Ok(())
    }

    /// Dedups, fetches and extracts one claimed URL
    ///
    /// Fetch failures are logged and swallowed; only store failures propagate.
    async fn process(&mut self, url: &str) -> StoreResult<()> {
        if !self.store.mark_visited(url).await? {
            tracing::debug!("Skipping already visited: {}", url);
            self.stats.duplicates_skipped += 1;
            return Ok(());
        }

        tracing::info!("Crawling: {}", url);

        let refs = match fetch_and_extract(self.fetcher.as_ref(), url).await {
            Ok(FetchOutcome::Extracted(refs)) => refs,
            Ok(FetchOutcome::SkippedNonHtml { content_type }) => {
                tracing::info!(
                    "Skipping non-HTML page: {} with content-type: {}",
                    url,
                    content_type
                );
                self.stats.non_html_skipped += 1;
                return Ok(());
            }
            Err(e) => {
                tracing::warn!("Fetch failed: {}", e);
                self.stats.fetch_failures += 1;
                return Ok(());
            }
        };

        let images = resolve(url, &refs.image_srcs, false);
        let links = resolve(url, &refs.links, true);

        self.store.add_image_results(&images).await?;
        self.store.enqueue_links(&links).await?;

        self.stats.pages_extracted += 1;
        self.stats.images_found += images.len() as u64;
        self.stats.links_enqueued += links.len() as u64;

        Ok(())
    }

    async fn release_after_failure(&mut self) {
        if !self.counted_active {
            return;
        }

        if !self.options.release_on_store_failure {
            tracing::warn!(
                "Worker {} exited while counted active; other workers may not detect quiescence",
                self.id
            );
            return;
        }

        match self.store.decr_active().await {
            Ok(_) => self.counted_active = false,
            Err(e) => tracing::error!(
                "Worker {} could not release its active slot: {}",
                self.id,
                e
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::fetcher::{FetchError, FetchedResource};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves canned pages and records every URL it was asked for
    #[derive(Default)]
    struct CannedFetcher {
        pages: HashMap<String, FetchedResource>,
        requests: Mutex<Vec<String>>,
    }

    impl CannedFetcher {
        fn html(mut self, url: &str, body: &str) -> Self {
            self.pages.insert(
                url.to_string(),
                FetchedResource {
                    content_type: "text/html".to_string(),
                    body: body.to_string(),
                },
            );
            self
        }

        fn other(mut self, url: &str, content_type: &str) -> Self {
            self.pages.insert(
                url.to_string(),
                FetchedResource {
                    content_type: content_type.to_string(),
                    body: String::new(),
                },
            );
            self
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Fetcher for CannedFetcher {
        async fn fetch(&self, url: &str) -> Result<FetchedResource, FetchError> {
            self.requests.lock().unwrap().push(url.to_string());
            self.pages.get(url).cloned().ok_or(FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
        }
    }

    fn fast_options() -> WorkerOptions {
        WorkerOptions {
            poll_interval: Duration::from_millis(5),
            release_on_store_failure: false,
        }
    }

    fn worker(store: &Arc<MemoryStore>, fetcher: &Arc<CannedFetcher>) -> Worker {
        Worker::new(0, store.clone(), fetcher.clone(), fast_options())
    }

    #[tokio::test]
    async fn test_single_worker_crawls_graph() {
        let store = Arc::new(MemoryStore::new());
        let fetcher = Arc::new(
            CannedFetcher::default()
                .html(
                    "http://a.com/",
                    r#"<a href="/x">x</a><a href="http://b.com/">ext</a><img src="/logo.png">"#,
                )
                .html("http://a.com/x", r#"<a href="/">home</a><img src="http://cdn.com/p.jpg">"#),
        );
        store.enqueue_seed("http://a.com/").await.unwrap();

        let report = worker(&store, &fetcher).run().await;

        assert!(!report.is_failed());
        assert_eq!(report.stats.pages_extracted, 2);
        assert_eq!(report.stats.duplicates_skipped, 1);

        let mut visited = store.visited().await.unwrap();
        visited.sort();
        assert_eq!(visited, vec!["http://a.com/", "http://a.com/x"]);

        let mut images = store.image_results().await.unwrap();
        images.sort();
        assert_eq!(images, vec!["http://a.com/logo.png", "http://cdn.com/p.jpg"]);

        assert!(!fetcher.requests().contains(&"http://b.com/".to_string()));
        assert_eq!(store.get_active().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_visited_url_never_refetched() {
        let store = Arc::new(MemoryStore::new());
        let fetcher = Arc::new(CannedFetcher::default().html("http://a.com/", "<p>done</p>"));
        store.mark_visited("http://a.com/").await.unwrap();
        store.enqueue_seed("http://a.com/").await.unwrap();

        let report = worker(&store, &fetcher).run().await;

        assert_eq!(report.stats.duplicates_skipped, 1);
        assert!(fetcher.requests().is_empty());
    }

    #[tokio::test]
    async fn test_non_html_enqueues_nothing() {
        let store = Arc::new(MemoryStore::new());
        let fetcher =
            Arc::new(CannedFetcher::default().other("http://a.com/doc.pdf", "application/pdf"));
        store.enqueue_seed("http://a.com/doc.pdf").await.unwrap();

        let report = worker(&store, &fetcher).run().await;

        assert_eq!(report.stats.non_html_skipped, 1);
        assert_eq!(report.stats.links_enqueued, 0);
        assert!(store.image_results().await.unwrap().is_empty());
        assert_eq!(store.visited().await.unwrap(), vec!["http://a.com/doc.pdf"]);
    }

    #[tokio::test]
    async fn test_inline_images_recorded_and_mailto_not_followed() {
        let store = Arc::new(MemoryStore::new());
        let fetcher = Arc::new(CannedFetcher::default().html(
            "http://a.com/",
            r#"<a href="mailto:me@a.com">mail</a><a href="javascript:void(0)">js</a>
               <img src="data:image/png;base64,AAAA">"#,
        ));
        store.enqueue_seed("http://a.com/").await.unwrap();

        let report = worker(&store, &fetcher).run().await;

        assert_eq!(report.stats.links_enqueued, 0);
        assert_eq!(report.stats.images_found, 1);
        assert_eq!(
            store.image_results().await.unwrap(),
            vec!["data:image/png;base64,AAAA"]
        );
        assert_eq!(store.visited().await.unwrap(), vec!["http://a.com/"]);
        assert_eq!(fetcher.requests(), vec!["http://a.com/"]);
    }

    #[tokio::test]
    async fn test_fetch_failure_does_not_stop_loop() {
        let store = Arc::new(MemoryStore::new());
        let fetcher = Arc::new(
            CannedFetcher::default()
                .html("http://a.com/", r#"<a href="/missing">m</a><a href="/ok">ok</a>"#)
                .html("http://a.com/ok", "<p>fine</p>"),
        );
        store.enqueue_seed("http://a.com/").await.unwrap();

        let report = worker(&store, &fetcher).run().await;

        assert!(!report.is_failed());
        assert_eq!(report.stats.fetch_failures, 1);
        assert_eq!(report.stats.pages_extracted, 2);
        assert_eq!(store.visited().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_state_transitions_on_empty_frontier() {
        let store = Arc::new(MemoryStore::new());
        let fetcher = Arc::new(CannedFetcher::default());
        let mut worker = worker(&store, &fetcher);

        assert_eq!(worker.state(), WorkerState::Idle);
        assert_eq!(worker.step().await.unwrap(), WorkerState::Active);
        assert_eq!(store.get_active().await.unwrap(), 1);
        assert_eq!(
            worker.step().await.unwrap(),
            WorkerState::QuiescenceCheck { active: 0 }
        );
        assert_eq!(worker.step().await.unwrap(), WorkerState::Terminated);
        assert_eq!(worker.step().await.unwrap(), WorkerState::Terminated);
    }

    #[tokio::test]
    async fn test_sleeps_while_others_active_then_wakes_for_new_work() {
        let store = Arc::new(MemoryStore::new());
        let fetcher = Arc::new(CannedFetcher::default().html("http://a.com/late", "<p>late</p>"));
        let mut worker = worker(&store, &fetcher);

        // Another worker is mid-extraction
        store.incr_active().await.unwrap();

        worker.step().await.unwrap();
        assert_eq!(
            worker.step().await.unwrap(),
            WorkerState::QuiescenceCheck { active: 1 }
        );
        assert_eq!(worker.step().await.unwrap(), WorkerState::Sleeping);
        assert_eq!(
            worker.step().await.unwrap(),
            WorkerState::QuiescenceCheck { active: 1 }
        );
        assert_eq!(worker.step().await.unwrap(), WorkerState::Sleeping);

        // The other worker discovers a link and finishes
        store.enqueue_seed("http://a.com/late").await.unwrap();
        store.decr_active().await.unwrap();

        assert_eq!(worker.step().await.unwrap(), WorkerState::Active);
        assert_eq!(worker.stats().wakeups, 1);
        assert_eq!(
            worker.step().await.unwrap(),
            WorkerState::QuiescenceCheck { active: 0 }
        );
        assert_eq!(worker.step().await.unwrap(), WorkerState::Terminated);
        assert_eq!(worker.stats().pages_extracted, 1);
    }

    #[tokio::test]
    async fn test_sleeping_worker_terminates_when_others_finish() {
        let store = Arc::new(MemoryStore::new());
        let fetcher = Arc::new(CannedFetcher::default());
        let mut worker = worker(&store, &fetcher);

        store.incr_active().await.unwrap();
        worker.step().await.unwrap();
        worker.step().await.unwrap();
        assert_eq!(worker.step().await.unwrap(), WorkerState::Sleeping);

        store.decr_active().await.unwrap();

        assert_eq!(
            worker.step().await.unwrap(),
            WorkerState::QuiescenceCheck { active: 0 }
        );
        assert_eq!(worker.step().await.unwrap(), WorkerState::Terminated);
    }

    #[tokio::test]
    async fn test_store_failure_keeps_active_slot_by_default() {
        let store = Arc::new(MemoryStore::new());
        let fetcher = Arc::new(CannedFetcher::default());
        let mut worker = worker(&store, &fetcher);

        worker.step().await.unwrap();
        store.set_unavailable(true);

        let report = worker.run().await;
        assert!(matches!(report.failure, Some(StoreError::Unavailable(_))));

        store.set_unavailable(false);
        assert_eq!(store.get_active().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_store_failure_releases_slot_when_configured() {
        let store = Arc::new(MemoryStore::new());
        let fetcher = Arc::new(CannedFetcher::default());
        let options = WorkerOptions {
            release_on_store_failure: true,
            ..fast_options()
        };
        let mut worker = Worker::new(3, store.clone(), fetcher, options);

        worker.step().await.unwrap();
        assert_eq!(store.get_active().await.unwrap(), 1);

        // Fail the next claim, then let the release go through
        store.set_unavailable(true);
        let result = worker.step().await;
        assert!(result.is_err());
        store.set_unavailable(false);
        worker.release_after_failure().await;

        assert_eq!(store.get_active().await.unwrap(), 0);
    }
}
