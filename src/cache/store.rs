//! Key-value store abstraction behind the cache
//!
//! The cache never touches a concrete backend directly; it is handed a
//! [`Store`] so each process or test can supply its own instance.

#[cfg(test)]
use std::collections::HashMap;
#[cfg(test)]
use std::sync::Mutex;

use crate::error::CacheError;

type Result<T> = std::result::Result<T, CacheError>;

/// Synchronous key-value store with a byte quota.
///
/// `set` fails with [`CacheError::QuotaExceeded`] when the write would push
/// total stored bytes over the store's quota.
pub trait Store: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Returns whether a record was removed
    fn delete(&self, key: &str) -> Result<bool>;

    fn keys(&self) -> Result<Vec<String>>;
}

/// Default quota, matching the usual per-origin local storage allowance
pub const DEFAULT_QUOTA_BYTES: usize = 5 * 1024 * 1024;

/// In-memory store with the same quota semantics as the SQLite store
#[cfg(test)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, Vec<u8>>>,
    quota_bytes: usize,
}

#[cfg(test)]
impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::with_quota(DEFAULT_QUOTA_BYTES)
    }

    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            quota_bytes,
        }
    }

    /// Total bytes held across all records
    pub fn usage_bytes(&self) -> usize {
        self.records
            .lock()
            .map(|records| records.values().map(Vec::len).sum())
            .unwrap_or(0)
    }
}

#[cfg(test)]
impl Store for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let records = self.records.lock().map_err(|_| CacheError::Poisoned)?;
        Ok(records.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut records = self.records.lock().map_err(|_| CacheError::Poisoned)?;

        // The record being replaced does not count against the new write
        let used: usize = records
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(_, v)| v.len())
            .sum();
        let available = self.quota_bytes.saturating_sub(used);
        if value.len() > available {
            return Err(CacheError::QuotaExceeded {
                needed: value.len(),
                available,
            });
        }

        records.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        let mut records = self.records.lock().map_err(|_| CacheError::Poisoned)?;
        Ok(records.remove(key).is_some())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let records = self.records.lock().map_err(|_| CacheError::Poisoned)?;
        Ok(records.keys().cloned().collect())
    }
}
