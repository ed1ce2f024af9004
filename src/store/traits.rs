//! Shared store trait and error types
//!
//! This module defines the atomic operation set every worker uses to
//! coordinate through the shared store, and the associated error types.

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur talking to the shared store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to connect to store at {url}: {reason}")]
    Connection { url: String, reason: String },

    #[error("Store command failed: {0}")]
    Command(#[from] redis::RedisError),

    #[error("Store state lock poisoned")]
    Poisoned,

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Key names for the four pieces of shared crawl state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreKeys {
    /// Counter of workers currently inside an extraction cycle
    pub active_workers: String,
    /// Set of canonical URLs waiting to be claimed
    pub frontier: String,
    /// Set of canonical URLs ever claimed; the dedup ledger
    pub visited: String,
    /// Set of canonical image URLs found so far
    pub image_srcs: String,
}

impl Default for StoreKeys {
    fn default() -> Self {
        Self {
            active_workers: "activeWorkers".to_string(),
            frontier: "crawlQ".to_string(),
            visited: "visitedHREFs".to_string(),
            image_srcs: "imageSrcs".to_string(),
        }
    }
}

impl StoreKeys {
    /// Namespaces every key as `prefix:key`; an empty prefix keeps the defaults
    pub fn with_prefix(prefix: &str) -> Self {
        let defaults = Self::default();
        if prefix.is_empty() {
            return defaults;
        }

        Self {
            active_workers: format!("{}:{}", prefix, defaults.active_workers),
            frontier: format!("{}:{}", prefix, defaults.frontier),
            visited: format!("{}:{}", prefix, defaults.visited),
            image_srcs: format!("{}:{}", prefix, defaults.image_srcs),
        }
    }

    /// All keys, for bulk deletion
    pub fn all(&self) -> [&str; 4] {
        [
            self.active_workers.as_str(),
            self.frontier.as_str(),
            self.visited.as_str(),
            self.image_srcs.as_str(),
        ]
    }
}

/// Atomic operations over the shared crawl state
///
/// Each call is atomic with respect to every other call from every worker,
/// in this process or any other. There are no multi-call transactions.
#[async_trait]
pub trait SharedStore: Send + Sync {
    // ===== Frontier =====

    /// Adds a URL to the frontier unconditionally (idempotent)
    async fn enqueue_seed(&self, url: &str) -> StoreResult<()>;

    /// Removes and returns an arbitrary frontier member
    ///
    /// `Ok(None)` means the frontier is empty; it is not an error.
    async fn claim_next(&self) -> StoreResult<Option<String>>;

    /// Cardinality of the frontier at the instant of the call
    ///
    /// Only a hint: it may be stale by the time the caller acts on it.
    async fn frontier_size(&self) -> StoreResult<u64>;

    /// Adds discovered links to the frontier in one batch (idempotent)
    async fn enqueue_links(&self, urls: &[String]) -> StoreResult<()>;

    // ===== Dedup =====

    /// Adds a URL to the visited set, returning whether it was newly inserted
    ///
    /// `false` means an earlier or concurrent claim already processed it.
    async fn mark_visited(&self, url: &str) -> StoreResult<bool>;

    // ===== Liveness =====

    /// Increments the active-worker counter, returning the new value
    async fn incr_active(&self) -> StoreResult<i64>;

    /// Decrements the active-worker counter, returning the new value
    async fn decr_active(&self) -> StoreResult<i64>;

    /// Reads the active-worker counter (a missing counter reads as zero)
    async fn get_active(&self) -> StoreResult<i64>;

    // ===== Results =====

    /// Adds image URLs to the result set in one batch (idempotent)
    async fn add_image_results(&self, urls: &[String]) -> StoreResult<()>;

    /// Every URL in the visited set
    async fn visited(&self) -> StoreResult<Vec<String>>;

    /// Every URL in the image result set
    async fn image_results(&self) -> StoreResult<Vec<String>>;

    // ===== Maintenance =====

    /// Deletes all crawl state so the next run starts from scratch
    async fn clear(&self) -> StoreResult<()>;
}
