//! Cached query orchestration
//!
//! A [`Query`] binds one cache key to a producer. Loading serves a valid
//! cache entry when there is one, otherwise calls the producer, persists the
//! outcome and retries transient failures with backoff. A spawned query also
//! reacts to invalidation notices, network changes and the auto-refresh
//! ticker.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use futures::future::BoxFuture;
use log::{debug, warn};
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;

use super::CacheTtl;
use super::bus::Invalidation;
use super::client::DataCache;
use super::codec::Codec;
use super::entry::{CacheEntry, StoredEntry, content_hash};
use super::policy::{EARLY_REFRESH_RATIO, RECONNECT_REFRESH_RATIO};
use crate::error::FetchError;

/// Asynchronous data source for a query
pub type Producer<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, FetchError>> + Send + Sync>;

type SuccessHook<T> = Arc<dyn Fn(&T) + Send + Sync>;
type ErrorHook = Arc<dyn Fn(&FetchError) + Send + Sync>;

/// Per-query behaviour
pub struct QueryOptions<T> {
    /// A disabled query never fetches
    pub enabled: bool,
    /// Requested TTL for successful entries
    pub expiration: Duration,
    /// Called when new data (by content hash) arrives
    pub on_success: Option<SuccessHook<T>>,
    /// Called after every failed attempt
    pub on_error: Option<ErrorHook>,
    /// Retry transient failures with backoff
    pub retry_on_error: bool,
    /// Refresh ahead of expiry while online
    pub auto_refresh: bool,
    pub auto_refresh_interval: Duration,
}

impl<T> Default for QueryOptions<T> {
    fn default() -> Self {
        Self {
            enabled: true,
            expiration: CacheTtl::DEFAULT,
            on_success: None,
            on_error: None,
            retry_on_error: true,
            auto_refresh: false,
            auto_refresh_interval: CacheTtl::AUTO_REFRESH_INTERVAL,
        }
    }
}

impl<T> QueryOptions<T> {
    #[allow(dead_code)]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn expiration(mut self, expiration: Duration) -> Self {
        self.expiration = expiration;
        self
    }

    pub fn on_success(mut self, hook: impl Fn(&T) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(hook));
        self
    }

    pub fn on_error(mut self, hook: impl Fn(&FetchError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(hook));
        self
    }

    pub fn retry_on_error(mut self, retry: bool) -> Self {
        self.retry_on_error = retry;
        self
    }

    /// Turn on auto-refresh, checking every `interval`
    pub fn auto_refresh(mut self, interval: Duration) -> Self {
        self.auto_refresh = true;
        self.auto_refresh_interval = interval;
        self
    }
}

/// What a query currently exposes to its consumer
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState<T> {
    /// Last data obtained; kept across failures
    pub data: Option<T>,
    pub is_loading: bool,
    /// Most recent failure; cleared by any success
    pub error: Option<FetchError>,
    pub is_online: bool,
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self {
            data: None,
            is_loading: false,
            error: None,
            is_online: true,
        }
    }
}

/// Outcome of a single fetch cycle
enum Attempt {
    Served,
    Fetched,
    Failed(FetchError),
}

struct QueryInner<T> {
    key: String,
    cache: DataCache,
    codec: Arc<dyn Codec<T>>,
    producer: Producer<T>,
    options: QueryOptions<T>,
    state: watch::Sender<QueryState<T>>,
    retries: AtomicU32,
    // one fetch cycle at a time per query
    gate: Mutex<()>,
}

/// A cached data source bound to one key
pub struct Query<T> {
    inner: Arc<QueryInner<T>>,
}

impl<T> Clone for Query<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Query<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(
        cache: DataCache,
        key: String,
        codec: Arc<dyn Codec<T>>,
        producer: Producer<T>,
        options: QueryOptions<T>,
    ) -> Self {
        let initial = QueryState {
            is_online: cache.network().is_online(),
            ..QueryState::default()
        };
        let (state, _) = watch::channel(initial);
        Self {
            inner: Arc::new(QueryInner {
                key,
                cache,
                codec,
                producer,
                options,
                state,
                retries: AtomicU32::new(0),
                gate: Mutex::new(()),
            }),
        }
    }

    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// Snapshot of the current state
    pub fn state(&self) -> QueryState<T> {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<QueryState<T>> {
        self.inner.state.subscribe()
    }

    /// Serve from cache when valid, otherwise fetch
    pub async fn load(&self) {
        self.run(false).await;
    }

    /// Fetch regardless of the cache
    pub async fn refetch(&self) {
        self.run(true).await;
    }

    /// Remove this query's persisted entry without fetching
    pub fn invalidate_cache(&self) -> bool {
        self.inner.cache.store().remove(&self.inner.key)
    }

    /// React to an invalidation notice
    pub async fn handle_invalidation(&self, notice: &Invalidation) {
        if !notice.matches(&self.inner.key) {
            return;
        }
        if self.inner.cache.network().is_online() {
            debug!("Invalidation hit {}; refetching", self.inner.key);
            self.refetch().await;
        } else {
            // Refetched lazily on the next load once back online
            self.invalidate_cache();
            debug!("Offline; dropped cached entry for {}", self.inner.key);
        }
    }

    /// React to the network coming up or going down
    pub async fn handle_network_change(&self, online: bool) {
        self.inner.state.send_modify(|s| s.is_online = online);
        if online && self.cached_past(RECONNECT_REFRESH_RATIO) {
            debug!("Back online with stale data for {}; refreshing", self.inner.key);
            self.refetch().await;
        }
    }

    /// One auto-refresh check
    pub async fn auto_refresh_tick(&self) {
        if !self.inner.options.auto_refresh || !self.inner.cache.network().is_online() {
            return;
        }
        if self.cached_past(EARLY_REFRESH_RATIO) {
            debug!("Auto-refreshing {}", self.inner.key);
            self.refetch().await;
        }
    }

    /// Load now, then keep reacting to invalidations, network changes and
    /// the auto-refresh ticker until the returned task is dropped.
    pub fn spawn(&self) -> QueryTask {
        let query = self.clone();
        let mut notices = self.inner.cache.bus().subscribe();
        let mut network = self.inner.cache.network().subscribe();
        let auto_refresh = self.inner.options.auto_refresh;
        let period = self
            .inner
            .options
            .auto_refresh_interval
            .max(Duration::from_millis(1));

        let handle = tokio::spawn(async move {
            query.load().await;

            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;

            loop {
                tokio::select! {
                    notice = notices.recv() => match notice {
                        Ok(notice) => query.handle_invalidation(&notice).await,
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            warn!("Missed {} invalidations for {}", missed, query.key());
                            if query.inner.cache.network().is_online() {
                                query.refetch().await;
                            }
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    changed = network.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let online = *network.borrow_and_update();
                        query.handle_network_change(online).await;
                    }
                    _ = ticker.tick(), if auto_refresh => query.auto_refresh_tick().await,
                }
            }
        });

        QueryTask { handle }
    }

    /// No entry at all counts as past any ratio
    fn cached_past(&self, ratio: f64) -> bool {
        let cache = &self.inner.cache;
        match cache.store().read(&self.inner.key, self.inner.codec.as_ref()) {
            Some(entry) => cache.staleness().is_past(
                &entry,
                self.inner.options.expiration,
                ratio,
                cache.now_millis(),
            ),
            None => true,
        }
    }

    async fn run(&self, force: bool) {
        let inner = &self.inner;
        if !inner.options.enabled {
            return;
        }
        let _gate = inner.gate.lock().await;

        let retry = *inner.cache.retry();
        let mut force = force;
        loop {
            let error = match self.attempt(force).await {
                Attempt::Served | Attempt::Fetched => return,
                Attempt::Failed(error) => error,
            };

            let used = inner.retries.load(Ordering::SeqCst);
            if !inner.options.retry_on_error || !retry.should_retry(&error, used) {
                return;
            }
            let delay = retry.delay_for(used);
            inner.retries.store(used + 1, Ordering::SeqCst);
            debug!(
                "Retrying {} in {:?} (retry {}/{})",
                inner.key,
                delay,
                used + 1,
                retry.max_retries
            );
            tokio::time::sleep(delay).await;
            force = true;
        }
    }

    async fn attempt(&self, force: bool) -> Attempt {
        let inner = &self.inner;
        let cache = &inner.cache;
        let cached = cache.store().read(&inner.key, inner.codec.as_ref());

        if !force
            && let Some(entry) = &cached
            && cache
                .staleness()
                .is_valid(entry, inner.options.expiration, cache.now_millis())
        {
            if let Some(data) = &entry.data {
                let data = data.clone();
                inner.state.send_modify(|s| s.data = Some(data));
            }
            if !entry.is_error {
                debug!("Cache hit: {}", inner.key);
                return Attempt::Served;
            }
        }

        inner.state.send_modify(|s| s.is_loading = true);
        debug!("Fetching {}", inner.key);
        match (inner.producer)().await {
            Ok(data) => {
                self.apply_success(data, cached);
                Attempt::Fetched
            }
            Err(error) => {
                self.apply_failure(&error, cached);
                Attempt::Failed(error)
            }
        }
    }

    fn apply_success(&self, data: T, cached: Option<CacheEntry<T>>) {
        let inner = &self.inner;
        let store = inner.cache.store();
        let now = inner.cache.now_millis();
        inner.retries.store(0, Ordering::SeqCst);

        let encoded = match inner.codec.encode(&data) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!("Not caching {}: {}", inner.key, e);
                None
            }
        };
        let hash = encoded.as_deref().map(content_hash);
        let previous = cached
            .as_ref()
            .filter(|entry| !entry.is_error)
            .and_then(|entry| entry.data_hash.as_deref());

        if hash.is_some() && hash.as_deref() == previous {
            debug!("Unchanged data for {}; refreshing timestamp", inner.key);
            if let Some(stored) = store.read_stored(&inner.key) {
                store.write_stored(&stored.touched(now));
            }
            inner.state.send_modify(|s| {
                if s.data.is_none() {
                    s.data = Some(data);
                }
                s.is_loading = false;
                s.error = None;
            });
            return;
        }

        if let (Some(bytes), Some(hash)) = (&encoded, hash) {
            store.write_stored(&StoredEntry::success(&inner.key, bytes, hash, now));
        }
        let notify = data.clone();
        inner.state.send_modify(|s| {
            s.data = Some(data);
            s.is_loading = false;
            s.error = None;
        });
        if let Some(hook) = &inner.options.on_success {
            hook(&notify);
        }
    }

    fn apply_failure(&self, error: &FetchError, cached: Option<CacheEntry<T>>) {
        let inner = &self.inner;
        debug!("Fetch failed for {}: {}", inner.key, error);

        let last_good = cached.and_then(|entry| entry.data);
        let mut retained = None;
        inner.state.send_modify(|s| {
            if s.data.is_none() {
                s.data = last_good;
            }
            s.is_loading = false;
            s.error = Some(error.clone());
            retained = s.data.clone();
        });

        let entry = CacheEntry {
            key: inner.key.clone(),
            data: retained,
            timestamp: inner.cache.now_millis(),
            is_error: true,
            data_hash: None,
        };
        inner.cache.store().write(&entry, inner.codec.as_ref());

        if let Some(hook) = &inner.options.on_error {
            hook(error);
        }
    }
}

/// Background task driving a spawned [`Query`]; stops when dropped
pub struct QueryTask {
    handle: JoinHandle<()>,
}

impl Drop for QueryTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
