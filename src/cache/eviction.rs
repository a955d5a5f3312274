//! Oldest-first eviction under quota pressure

use log::{debug, warn};
use serde::Deserialize;

use super::store::Store;

/// Outcome of an eviction pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EvictionReport {
    /// Store keys removed, oldest first
    pub removed: Vec<String>,
    pub freed_bytes: usize,
}

#[derive(Deserialize)]
struct Stamp {
    timestamp: i64,
}

/// Delete namespaced records, oldest `timestamp` first, until at least
/// `target_bytes` have been freed or nothing is left.
///
/// Records whose envelope cannot be parsed are skipped and left in place.
pub fn evict_oldest(store: &dyn Store, prefix: &str, target_bytes: usize) -> EvictionReport {
    let keys = match store.keys() {
        Ok(keys) => keys,
        Err(e) => {
            warn!("Eviction could not list cache keys: {}", e);
            return EvictionReport::default();
        }
    };

    let mut candidates: Vec<(i64, String, usize)> = keys
        .into_iter()
        .filter(|k| k.starts_with(prefix))
        .filter_map(|k| {
            let bytes = store.get(&k).ok().flatten()?;
            let stamp: Stamp = serde_json::from_slice(&bytes).ok()?;
            Some((stamp.timestamp, k, bytes.len()))
        })
        .collect();

    candidates.sort_by_key(|(timestamp, _, _)| *timestamp);

    let mut report = EvictionReport::default();
    for (_, key, size) in candidates {
        if report.freed_bytes >= target_bytes {
            break;
        }
        match store.delete(&key) {
            Ok(true) => {
                report.freed_bytes += size;
                report.removed.push(key);
            }
            Ok(false) => {}
            Err(e) => warn!("Failed to evict {}: {}", key, e),
        }
    }

    debug!(
        "Evicted {} entries, freed {} bytes (target {})",
        report.removed.len(),
        report.freed_bytes,
        target_bytes
    );
    report
}
