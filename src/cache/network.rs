//! Shared online/offline status

use std::sync::Arc;

use log::info;
use tokio::sync::watch;

/// Observable network reachability flag shared by every query.
///
/// Fetches are attempted regardless of this flag; it only gates proactive
/// refreshes and decides how invalidations are handled.
#[derive(Clone)]
pub struct NetworkStatus {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for NetworkStatus {
    fn default() -> Self {
        Self::new(true)
    }
}

impl NetworkStatus {
    pub fn new(online: bool) -> Self {
        let (tx, _) = watch::channel(online);
        Self { tx: Arc::new(tx) }
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Record the current reachability; returns whether it changed
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            info!("Network is now {}", if online { "online" } else { "offline" });
        }
        changed
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}
