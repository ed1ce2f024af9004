//! Shared store module
//!
//! All crawl coordination state lives behind the [`SharedStore`] trait:
//! - the frontier of URLs waiting to be claimed
//! - the visited set used as the only dedup gate
//! - the active-worker counter used for termination detection
//! - the image result set
//!
//! [`RedisStore`] is the production backend shared across processes and
//! machines; [`MemoryStore`] coordinates workers within one process.

mod memory;
mod redis_store;
mod traits;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;
pub use traits::{SharedStore, StoreError, StoreKeys, StoreResult};
