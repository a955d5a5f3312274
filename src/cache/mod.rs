//! Local cache for API responses
//!
//! A persistent, best-effort response cache: entries live in a namespaced
//! key-value store, are served while fresh, refreshed through a caller
//! supplied producer, and dropped by invalidation or quota eviction.
//! Store failures never surface to consumers; the cache degrades to
//! "as if no cache existed".

pub mod adapter;
pub mod bus;
pub mod client;
pub mod codec;
pub mod entry;
pub mod eviction;
pub mod key;
pub mod network;
pub mod policy;
pub mod query;
pub mod retry;
pub mod storage;
pub mod store;

use std::time::Duration;

/// Cache timing defaults
pub struct CacheTtl;

impl CacheTtl {
    /// Validity window for successful entries
    pub const DEFAULT: Duration = Duration::from_secs(5 * 60); // 5 min

    /// Failure placeholders expire quickly so transient errors self-heal
    pub const ERROR: Duration = Duration::from_secs(30); // 30 sec

    /// Auto-refresh timer period
    pub const AUTO_REFRESH_INTERVAL: Duration = Duration::from_secs(60); // 1 min
}

// Re-export main types
pub use adapter::PersistentStore;
#[cfg(test)]
pub use bus::Invalidation;
pub use client::DataCache;
pub use codec::JsonCodec;
pub use key::cache_key;
pub use network::NetworkStatus;
pub use query::{Query, QueryOptions, QueryState};
pub use storage::SqliteStore;
#[cfg(test)]
pub use store::MemoryStore;
