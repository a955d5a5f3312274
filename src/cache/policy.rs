//! Staleness and refresh timing policy

use std::time::Duration;

use chrono::Utc;

use super::CacheTtl;
use super::entry::CacheEntry;

/// Fraction of the TTL after which auto-refresh re-fetches early
pub const EARLY_REFRESH_RATIO: f64 = 0.75;

/// Fraction of the TTL after which reconnecting forces a refresh
pub const RECONNECT_REFRESH_RATIO: f64 = 0.5;

/// Source of wall-clock time in milliseconds since the Unix epoch
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// System wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Decides whether an entry may be served without calling its producer
#[derive(Debug, Clone, Copy)]
pub struct StalenessPolicy {
    /// Validity window for failure placeholders, regardless of the caller TTL
    pub error_ttl: Duration,
}

impl Default for StalenessPolicy {
    fn default() -> Self {
        Self {
            error_ttl: CacheTtl::ERROR,
        }
    }
}

impl StalenessPolicy {
    /// TTL that applies to this entry
    pub fn effective_ttl<T>(&self, entry: &CacheEntry<T>, requested: Duration) -> Duration {
        if entry.is_error {
            self.error_ttl
        } else {
            requested
        }
    }

    /// `now - timestamp < effective_ttl`
    pub fn is_valid<T>(&self, entry: &CacheEntry<T>, requested: Duration, now: i64) -> bool {
        let ttl = self.effective_ttl(entry, requested);
        entry.age_millis(now) < millis(ttl)
    }

    /// Whether more than `ratio` of the entry's effective TTL has elapsed
    pub fn is_past<T>(
        &self,
        entry: &CacheEntry<T>,
        requested: Duration,
        ratio: f64,
        now: i64,
    ) -> bool {
        let ttl = self.effective_ttl(entry, requested);
        entry.age_millis(now) as f64 > millis(ttl) as f64 * ratio
    }
}

fn millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

/// Clock that only moves when told to
#[cfg(test)]
pub struct ManualClock(std::sync::atomic::AtomicI64);

#[cfg(test)]
impl ManualClock {
    pub fn new(start: i64) -> Self {
        Self(std::sync::atomic::AtomicI64::new(start))
    }

    pub fn advance(&self, by: Duration) {
        self.0
            .fetch_add(millis(by), std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.0.load(std::sync::atomic::Ordering::SeqCst)
    }
}
