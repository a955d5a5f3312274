//! Cache handle shared by every query
//!
//! Bundles the persistent store, invalidation bus, network status, clock and
//! policies. Cloning is cheap; all clones share the same state.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use log::debug;

use super::adapter::{CacheStats, PersistentStore};
use super::bus::{Invalidation, InvalidationBus};
use super::codec::Codec;
use super::network::NetworkStatus;
use super::policy::{Clock, StalenessPolicy, SystemClock};
use super::query::{Producer, Query, QueryOptions};
use super::retry::RetryPolicy;
use crate::error::FetchError;

/// Entry point for cached fetching and invalidation.
#[derive(Clone)]
pub struct DataCache {
    store: Arc<PersistentStore>,
    bus: InvalidationBus,
    network: NetworkStatus,
    clock: Arc<dyn Clock>,
    staleness: StalenessPolicy,
    retry: RetryPolicy,
}

impl DataCache {
    /// Create a cache over the given store with default policies
    pub fn new(store: PersistentStore) -> Self {
        Self {
            store: Arc::new(store),
            bus: InvalidationBus::new(),
            network: NetworkStatus::default(),
            clock: Arc::new(SystemClock),
            staleness: StalenessPolicy::default(),
            retry: RetryPolicy::default(),
        }
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_staleness(mut self, staleness: StalenessPolicy) -> Self {
        self.staleness = staleness;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn store(&self) -> &PersistentStore {
        &self.store
    }

    pub fn bus(&self) -> &InvalidationBus {
        &self.bus
    }

    pub fn network(&self) -> &NetworkStatus {
        &self.network
    }

    pub fn staleness(&self) -> &StalenessPolicy {
        &self.staleness
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn now_millis(&self) -> i64 {
        self.clock.now_millis()
    }

    /// Create a query for `key`, served from cache or fetched with `producer`.
    ///
    /// Nothing runs until [`Query::load`], [`Query::refetch`] or
    /// [`Query::spawn`] is called.
    pub fn query<T, C, F, Fut>(
        &self,
        key: impl Into<String>,
        codec: C,
        producer: F,
        options: QueryOptions<T>,
    ) -> Query<T>
    where
        T: Clone + Send + Sync + 'static,
        C: Codec<T> + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        let producer: Producer<T> = Arc::new(move || producer().boxed());
        Query::new(self.clone(), key.into(), Arc::new(codec), producer, options)
    }

    /// Drop the entry for `key` and notify its subscribers
    pub fn invalidate_key(&self, key: &str) -> bool {
        let removed = self.store.remove(key);
        debug!("Invalidated key {} (entry removed: {})", key, removed);
        self.bus.publish(Invalidation::Key(key.to_string()));
        removed
    }

    /// Drop every entry whose key contains `pattern` and notify subscribers
    pub fn invalidate_pattern(&self, pattern: &str) -> usize {
        let removed = self.store.remove_matching(pattern);
        debug!("Invalidated {} entries matching {:?}", removed.len(), pattern);
        self.bus.publish(Invalidation::Pattern(pattern.to_string()));
        removed.len()
    }

    /// Drop a batch of keys and notify their subscribers
    pub fn invalidate_multiple(&self, keys: &[String]) -> usize {
        let removed = self.store.remove_many(keys);
        debug!("Invalidated {} of {} keys", removed, keys.len());
        self.bus.publish(Invalidation::Keys(keys.to_vec()));
        removed
    }

    /// Statistics as of now, judging validity against `ttl`
    pub fn stats(&self, ttl: Duration) -> CacheStats {
        self.store.stats(&self.staleness, ttl, self.now_millis())
    }

    /// Remove every entry without notifying subscribers
    pub fn clear(&self) -> usize {
        self.store.clear()
    }
}
