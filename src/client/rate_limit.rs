//! Per-endpoint rate limiting for the inventory API
//!
//! Limiting is reactive: a category is only throttled after the API has
//! answered one of its requests with a 429.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicBool, Ordering};

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use log::debug;

/// Groups of endpoints sharing a server-side limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointCategory {
    /// /reports.* - aggregated queries, 2 req/sec
    Reports,
    /// /users.*, /roles.* - account administration, 5 req/sec
    Admin,
    /// Everything else, 10 req/sec
    Default,
}

impl EndpointCategory {
    pub const ALL: [EndpointCategory; 3] = [
        EndpointCategory::Reports,
        EndpointCategory::Admin,
        EndpointCategory::Default,
    ];

    /// Categorize a request path relative to the base URL (e.g. "/reports/stock").
    pub fn from_path(path: &str) -> Self {
        let path = path.strip_prefix("/api").unwrap_or(path);

        if path.starts_with("/reports") {
            return EndpointCategory::Reports;
        }

        if path.starts_with("/users") || path.starts_with("/roles") {
            return EndpointCategory::Admin;
        }

        EndpointCategory::Default
    }

    /// Requests per second once throttled
    pub fn rate_limit(&self) -> u32 {
        match self {
            EndpointCategory::Reports => 2,
            EndpointCategory::Admin => 5,
            EndpointCategory::Default => 10,
        }
    }
}

/// Rate limiter state for a single endpoint category.
pub struct EndpointRateLimiter {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    active: AtomicBool,
    category: EndpointCategory,
}

impl EndpointRateLimiter {
    pub fn new(category: EndpointCategory) -> Self {
        let rate = NonZeroU32::new(category.rate_limit()).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: RateLimiter::direct(Quota::per_second(rate)),
            active: AtomicBool::new(false),
            category,
        }
    }

    pub fn activate(&self) {
        let was_active = self.active.swap(true, Ordering::SeqCst);
        if !was_active {
            debug!("Rate limiting activated for {:?}", self.category);
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Wait for permission if rate limiting is active.
    pub async fn wait_if_active(&self) {
        if self.is_active() {
            debug!("Waiting for rate limiter {:?}", self.category);
            self.limiter.until_ready().await;
        }
    }
}

/// One limiter per endpoint category.
pub struct RateLimiterSet {
    limiters: HashMap<EndpointCategory, EndpointRateLimiter>,
}

impl Default for RateLimiterSet {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiterSet {
    pub fn new() -> Self {
        let limiters = EndpointCategory::ALL
            .into_iter()
            .map(|category| (category, EndpointRateLimiter::new(category)))
            .collect();
        Self { limiters }
    }

    pub async fn wait_for(&self, category: EndpointCategory) {
        if let Some(limiter) = self.limiters.get(&category) {
            limiter.wait_if_active().await;
        }
    }

    /// Start throttling a category (called on 429).
    pub fn activate(&self, category: EndpointCategory) {
        if let Some(limiter) = self.limiters.get(&category) {
            limiter.activate();
        }
    }

    #[cfg(test)]
    pub fn is_active(&self, category: EndpointCategory) -> bool {
        self.limiters
            .get(&category)
            .is_some_and(EndpointRateLimiter::is_active)
    }
}
