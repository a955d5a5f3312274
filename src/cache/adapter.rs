//! Persistent store adapter
//!
//! Wraps a [`Store`] with entry (de)serialization, namespacing, size limits
//! and quota recovery. Every method is infallible from the caller's point of
//! view: read problems are cache misses, write problems are dropped writes.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};

use super::codec::Codec;
use super::entry::{CacheEntry, StoredEntry};
use super::eviction::evict_oldest;
use super::policy::StalenessPolicy;
use super::store::Store;
use crate::error::CacheError;

/// Namespace prefix for every record the cache owns
pub const KEY_PREFIX: &str = "stockcache:";

/// Hard cap on a single serialized record
pub const MAX_ENTRY_BYTES: usize = 4 * 1024 * 1024; // 4 MiB

/// Best-effort entry store shared by all queries.
///
/// A disabled adapter (no backend) reads nothing and drops every write.
pub struct PersistentStore {
    backend: Option<Arc<dyn Store>>,
    max_entry_bytes: usize,
}

impl PersistentStore {
    pub fn new(backend: Arc<dyn Store>) -> Self {
        Self {
            backend: Some(backend),
            max_entry_bytes: MAX_ENTRY_BYTES,
        }
    }

    /// Adapter with no backing store (`--no-cache`, or no store could be opened)
    pub fn disabled() -> Self {
        Self {
            backend: None,
            max_entry_bytes: MAX_ENTRY_BYTES,
        }
    }

    pub fn with_max_entry_bytes(mut self, max_entry_bytes: usize) -> Self {
        self.max_entry_bytes = max_entry_bytes;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    fn record_key(key: &str) -> String {
        format!("{}{}", KEY_PREFIX, key)
    }

    /// Read and decode the entry for `key`
    pub fn read<T>(&self, key: &str, codec: &dyn Codec<T>) -> Option<CacheEntry<T>> {
        let stored = self.read_stored(key)?;
        match stored.decode(codec) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Ignoring undecodable cache entry {}: {}", key, e);
                None
            }
        }
    }

    /// Read the raw envelope for `key`
    pub fn read_stored(&self, key: &str) -> Option<StoredEntry> {
        let backend = self.backend.as_ref()?;
        let bytes = match backend.get(&Self::record_key(key)) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                warn!("Cache read failed for {}: {}", key, e);
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(stored) => Some(stored),
            Err(e) => {
                debug!("Corrupt cache record {}: {}", key, e);
                None
            }
        }
    }

    /// Encode and store a typed entry; returns whether it was persisted
    pub fn write<T>(&self, entry: &CacheEntry<T>, codec: &dyn Codec<T>) -> bool {
        match StoredEntry::encode(entry, codec) {
            Ok(stored) => self.write_stored(&stored),
            Err(e) => {
                warn!("Not caching {}: {}", entry.key, e);
                false
            }
        }
    }

    /// Store an envelope, evicting and retrying once on quota exhaustion
    pub fn write_stored(&self, stored: &StoredEntry) -> bool {
        let Some(backend) = self.backend.as_ref() else {
            return false;
        };

        let bytes = match serde_json::to_vec(stored) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Not caching {}: {}", stored.key, e);
                return false;
            }
        };

        if bytes.len() > self.max_entry_bytes {
            debug!(
                "{}",
                CacheError::EntryTooLarge {
                    size: bytes.len(),
                    limit: self.max_entry_bytes
                }
            );
            return false;
        }

        let record_key = Self::record_key(&stored.key);
        match backend.set(&record_key, &bytes) {
            Ok(()) => true,
            Err(CacheError::QuotaExceeded { .. }) => {
                let report = evict_oldest(backend.as_ref(), KEY_PREFIX, self.max_entry_bytes / 2);
                debug!(
                    "Quota exceeded writing {}; evicted {} entries",
                    stored.key,
                    report.removed.len()
                );
                match backend.set(&record_key, &bytes) {
                    Ok(()) => true,
                    Err(e) => {
                        warn!("Dropping cache write for {}: {}", stored.key, e);
                        false
                    }
                }
            }
            Err(e) => {
                warn!("Dropping cache write for {}: {}", stored.key, e);
                false
            }
        }
    }

    /// Serialized size of an envelope in bytes
    pub fn estimate_size(stored: &StoredEntry) -> usize {
        serde_json::to_vec(stored)
            .map(|bytes| bytes.len())
            .unwrap_or(usize::MAX)
    }

    /// Remove the entry for `key`; returns whether one existed
    pub fn remove(&self, key: &str) -> bool {
        let Some(backend) = self.backend.as_ref() else {
            return false;
        };
        match backend.delete(&Self::record_key(key)) {
            Ok(removed) => removed,
            Err(e) => {
                warn!("Failed to remove cache entry {}: {}", key, e);
                false
            }
        }
    }

    /// Remove every entry whose key contains `pattern`; returns removed keys
    pub fn remove_matching(&self, pattern: &str) -> Vec<String> {
        self.keys()
            .into_iter()
            .filter(|key| key.contains(pattern))
            .filter(|key| self.remove(key))
            .collect()
    }

    /// Remove a batch of keys; returns how many existed
    pub fn remove_many(&self, keys: &[String]) -> usize {
        keys.iter().filter(|key| self.remove(key)).count()
    }

    /// All cache keys (without prefix), sorted
    pub fn keys(&self) -> Vec<String> {
        let Some(backend) = self.backend.as_ref() else {
            return Vec::new();
        };
        let mut keys: Vec<String> = match backend.keys() {
            Ok(keys) => keys
                .into_iter()
                .filter_map(|k| k.strip_prefix(KEY_PREFIX).map(str::to_string))
                .collect(),
            Err(e) => {
                warn!("Failed to list cache keys: {}", e);
                Vec::new()
            }
        };
        keys.sort();
        keys
    }

    /// Remove every cache entry; returns how many were removed
    pub fn clear(&self) -> usize {
        let keys = self.keys();
        self.remove_many(&keys)
    }

    /// Summarize stored entries as of `now`
    pub fn stats(&self, staleness: &StalenessPolicy, ttl: Duration, now: i64) -> CacheStats {
        let mut stats = CacheStats::default();

        for key in self.keys() {
            let Some(stored) = self.read_stored(&key) else {
                stats.unreadable_entries += 1;
                continue;
            };

            stats.total_entries += 1;
            stats.total_size_bytes += Self::estimate_size(&stored);
            if stored.is_error {
                stats.error_entries += 1;
            }

            let header = stored.header();
            if staleness.is_valid(&header, ttl, now) {
                stats.valid_entries += 1;
            } else {
                stats.expired_entries += 1;
            }

            let ts = header.timestamp;
            stats.oldest_entry = Some(stats.oldest_entry.map_or(ts, |t| t.min(ts)));
            stats.newest_entry = Some(stats.newest_entry.map_or(ts, |t| t.max(ts)));
        }

        stats
    }
}

/// Statistics about cache state
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub total_entries: usize,
    pub valid_entries: usize,
    pub expired_entries: usize,
    pub error_entries: usize,
    pub unreadable_entries: usize,
    pub total_size_bytes: usize,
    /// Capture time of the oldest entry, epoch milliseconds
    pub oldest_entry: Option<i64>,
    /// Capture time of the newest entry, epoch milliseconds
    pub newest_entry: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheTtl;
    use crate::cache::codec::JsonCodec;
    use crate::cache::entry::content_hash;
    use crate::cache::store::MemoryStore;

    fn adapter(quota: usize) -> (PersistentStore, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::with_quota(quota));
        (PersistentStore::new(store.clone()), store)
    }

    fn entry(key: &str, data: &str, timestamp: i64) -> CacheEntry<String> {
        CacheEntry {
            key: key.to_string(),
            data: Some(data.to_string()),
            timestamp,
            is_error: false,
            data_hash: Some(content_hash(data.as_bytes())),
        }
    }

    /// Raw record of exactly `size` bytes
    fn sized_record(key: &str, timestamp: i64, size: usize) -> StoredEntry {
        let mut stored = StoredEntry {
            key: key.to_string(),
            data: Some(String::new()),
            timestamp,
            is_error: false,
            data_hash: None,
        };
        let overhead = PersistentStore::estimate_size(&stored);
        stored.data = Some("a".repeat(size - overhead));
        stored
    }

    #[test]
    fn test_write_then_read() {
        let (adapter, _) = adapter(1024 * 1024);
        let e = entry("batches_page_1_20", "payload", 1_000);

        assert!(adapter.write(&e, &JsonCodec));
        assert_eq!(adapter.read::<String>("batches_page_1_20", &JsonCodec), Some(e));
    }

    #[test]
    fn test_records_are_namespaced() {
        let (adapter, store) = adapter(1024 * 1024);
        adapter.write(&entry("k", "v", 1), &JsonCodec);

        assert_eq!(store.keys().unwrap(), vec![format!("{}k", KEY_PREFIX)]);
        assert_eq!(adapter.keys(), vec!["k".to_string()]);
    }

    #[test]
    fn test_corrupt_record_is_a_miss() {
        let (adapter, store) = adapter(1024 * 1024);
        store.set(&format!("{}bad", KEY_PREFIX), b"{oops").unwrap();

        assert!(adapter.read::<String>("bad", &JsonCodec).is_none());
    }

    #[test]
    fn test_wrong_payload_type_is_a_miss() {
        let (adapter, _) = adapter(1024 * 1024);
        adapter.write(&entry("k", "not a number", 1), &JsonCodec);

        assert!(adapter.read::<u64>("k", &JsonCodec).is_none());
    }

    #[test]
    fn test_oversized_entry_rejected_without_write() {
        let store = Arc::new(MemoryStore::with_quota(10 * 1024 * 1024));
        let adapter = PersistentStore::new(store.clone()).with_max_entry_bytes(1024);
        let big = entry("big", &"x".repeat(2048), 1);

        assert!(!adapter.write(&big, &JsonCodec));
        assert_eq!(store.usage_bytes(), 0);
    }

    #[test]
    fn test_disabled_adapter_is_noop() {
        let adapter = PersistentStore::disabled();

        assert!(!adapter.write(&entry("k", "v", 1), &JsonCodec));
        assert!(adapter.read::<String>("k", &JsonCodec).is_none());
        assert!(adapter.keys().is_empty());
        assert_eq!(adapter.clear(), 0);
    }

    #[test]
    fn test_quota_exhaustion_evicts_oldest_until_half_cap_freed() {
        // 3.9 MB of 100 KB records in a 4 MB store
        let (adapter, store) = adapter(4_000_000);
        for i in 0..39 {
            let record = sized_record(&format!("old_{:02}", i), 1_000_000 + i, 100_000);
            assert!(adapter.write_stored(&record));
        }
        assert_eq!(store.usage_bytes(), 3_900_000);

        // ~267 KB once base64-encoded: does not fit without eviction
        let fresh = entry("fresh", &"y".repeat(200_000), 2_000_000);
        assert!(adapter.write(&fresh, &JsonCodec));

        // 21 records (2.1 MB) is the first count reaching half of the 4 MiB cap
        let keys = adapter.keys();
        for i in 0..21 {
            assert!(!keys.contains(&format!("old_{:02}", i)), "old_{:02} kept", i);
        }
        for i in 21..39 {
            assert!(keys.contains(&format!("old_{:02}", i)), "old_{:02} evicted", i);
        }
        assert_eq!(adapter.read::<String>("fresh", &JsonCodec), Some(fresh));
    }

    #[test]
    fn test_write_dropped_when_eviction_cannot_free_enough() {
        // Foreign records are never evicted and hold most of the quota
        let store = Arc::new(MemoryStore::with_quota(1_000_000));
        let adapter = PersistentStore::new(store.clone()).with_max_entry_bytes(400_000);
        store.set("other-app:blob", &vec![b'z'; 700_000]).unwrap();
        for i in 0..5 {
            let record = sized_record(&format!("old_{}", i), 1_000 + i, 50_000);
            assert!(adapter.write_stored(&record));
        }

        // Eviction frees 200 KB, leaving 250 KB for a 350 KB record
        let fresh = sized_record("fresh", 2_000, 350_000);
        assert!(!adapter.write_stored(&fresh));

        assert_eq!(adapter.keys(), vec!["old_4".to_string()]);
        assert!(adapter.read_stored("fresh").is_none());
        assert_eq!(store.get("other-app:blob").unwrap().map(|v| v.len()), Some(700_000));
    }

    #[test]
    fn test_remove_matching_and_many() {
        let (adapter, _) = adapter(1024 * 1024);
        for key in ["batches_page_1_20", "batches_page_2_20", "invoices_page_1_20"] {
            adapter.write(&entry(key, "v", 1), &JsonCodec);
        }

        let removed = adapter.remove_matching("batches");
        assert_eq!(removed.len(), 2);
        assert_eq!(adapter.keys(), vec!["invoices_page_1_20".to_string()]);

        let count = adapter.remove_many(&["invoices_page_1_20".to_string(), "nope".to_string()]);
        assert_eq!(count, 1);
        assert!(adapter.keys().is_empty());
    }

    #[test]
    fn test_stats() {
        let (adapter, _) = adapter(1024 * 1024);
        adapter.write(&entry("fresh", "v", 1_000_000), &JsonCodec);
        adapter.write(&entry("stale", "v", 0), &JsonCodec);
        adapter.write_stored(&StoredEntry::failure("failed", None, 1_000_000));

        let stats = adapter.stats(&StalenessPolicy::default(), CacheTtl::DEFAULT, 1_000_001);

        assert_eq!(stats.total_entries, 3);
        assert_eq!(stats.valid_entries, 2);
        assert_eq!(stats.expired_entries, 1);
        assert_eq!(stats.error_entries, 1);
        assert_eq!(stats.oldest_entry, Some(0));
        assert_eq!(stats.newest_entry, Some(1_000_000));
        assert!(stats.total_size_bytes > 0);
    }
}
