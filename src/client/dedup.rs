//! In-flight request de-duplication
//!
//! Concurrent identical GETs share one HTTP round trip. The first caller
//! starts the request and every caller arriving while it runs awaits the same
//! shared future. The slot is released when the leader finishes, whether the
//! request succeeded, failed or was cancelled.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use log::debug;

use crate::error::ApiError;

type SharedRequest<T> = Shared<BoxFuture<'static, Result<T, ApiError>>>;

/// Map of request key to the shared in-flight future
pub struct RequestDeduplicator<T: Clone> {
    in_flight: Mutex<HashMap<String, SharedRequest<T>>>,
}

impl<T: Clone> Default for RequestDeduplicator<T> {
    fn default() -> Self {
        Self {
            in_flight: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> RequestDeduplicator<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Key identifying a request: URL plus parameters sorted by name
    pub fn request_key(url: &str, params: &[(String, String)]) -> String {
        let mut sorted: Vec<_> = params.iter().collect();
        sorted.sort();
        let query: Vec<String> = sorted.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        format!("{}?{}", url, query.join("&"))
    }

    /// Run `start` unless an identical request is already in flight, in
    /// which case await that one instead.
    pub async fn run<F, Fut>(&self, key: String, start: F) -> Result<T, ApiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let (request, leader) = {
            let mut in_flight = self.lock();
            match in_flight.get(&key) {
                Some(existing) => {
                    debug!("Joining in-flight request {}", key);
                    (existing.clone(), false)
                }
                None => {
                    let request = start().boxed().shared();
                    in_flight.insert(key.clone(), request.clone());
                    (request, true)
                }
            }
        };

        if !leader {
            return request.await;
        }
        let _release = Release { owner: self, key };
        request.await
    }

    /// Number of requests currently in flight
    #[cfg(test)]
    pub fn in_flight(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SharedRequest<T>>> {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Drops the in-flight slot when the leading caller is done
struct Release<'a, T>
where
    T: Clone + Send + Sync + 'static,
{
    owner: &'a RequestDeduplicator<T>,
    key: String,
}

impl<T> Drop for Release<'_, T>
where
    T: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.owner.lock().remove(&self.key);
    }
}
