//! In-process shared store
//!
//! A mutex-guarded stand-in for the Redis store. Workers in one process can
//! coordinate through it exactly as they would through Redis, which makes
//! it the store of choice for tests and single-machine crawls.

use crate::store::traits::{SharedStore, StoreError, StoreResult};

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct MemoryState {
    frontier: HashSet<String>,
    visited: HashSet<String>,
    active: i64,
    images: HashSet<String>,
}

/// In-memory implementation of [`SharedStore`]
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail (or succeed again) as a dropped
    /// connection would
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn state(&self) -> StoreResult<MutexGuard<'_, MemoryState>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "in-memory store marked unavailable".to_string(),
            ));
        }
        self.state.lock().map_err(|_| StoreError::Poisoned)
    }
}

#[async_trait]
impl SharedStore for MemoryStore {
    async fn enqueue_seed(&self, url: &str) -> StoreResult<()> {
        self.state()?.frontier.insert(url.to_string());
        Ok(())
    }

    async fn claim_next(&self) -> StoreResult<Option<String>> {
        let mut state = self.state()?;
        let claimed = state.frontier.iter().next().cloned();
        if let Some(url) = &claimed {
            state.frontier.remove(url);
        }
        Ok(claimed)
    }

    async fn frontier_size(&self) -> StoreResult<u64> {
        Ok(self.state()?.frontier.len() as u64)
    }

    async fn enqueue_links(&self, urls: &[String]) -> StoreResult<()> {
        self.state()?.frontier.extend(urls.iter().cloned());
        Ok(())
    }

    async fn mark_visited(&self, url: &str) -> StoreResult<bool> {
        Ok(self.state()?.visited.insert(url.to_string()))
    }

    async fn incr_active(&self) -> StoreResult<i64> {
        let mut state = self.state()?;
        state.active += 1;
        Ok(state.active)
    }

    async fn decr_active(&self) -> StoreResult<i64> {
        let mut state = self.state()?;
        state.active -= 1;
        Ok(state.active)
    }

    async fn get_active(&self) -> StoreResult<i64> {
        Ok(self.state()?.active)
    }

    async fn add_image_results(&self, urls: &[String]) -> StoreResult<()> {
        self.state()?.images.extend(urls.iter().cloned());
        Ok(())
    }

    async fn visited(&self) -> StoreResult<Vec<String>> {
        Ok(self.state()?.visited.iter().cloned().collect())
    }

    async fn image_results(&self) -> StoreResult<Vec<String>> {
        Ok(self.state()?.images.iter().cloned().collect())
    }

    async fn clear(&self) -> StoreResult<()> {
        *self.state()? = MemoryState::default();
        Ok(())
    }
}
