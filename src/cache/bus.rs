//! Invalidation bus
//!
//! Process-wide broadcast of "this data is stale" notices. Publishers do not
//! need a handle on the queries that hold the data; each running query
//! subscribes and checks whether a notice covers its key.

use log::debug;
use tokio::sync::broadcast;

/// Buffered notices per subscriber before it starts lagging
pub(crate) const BUS_CAPACITY: usize = 64;

/// An invalidation notice
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invalidation {
    /// Exactly this key
    Key(String),
    /// Every key containing this substring
    Pattern(String),
    /// Any of these keys
    Keys(Vec<String>),
}

impl Invalidation {
    pub fn matches(&self, key: &str) -> bool {
        match self {
            Invalidation::Key(k) => k == key,
            Invalidation::Pattern(p) => key.contains(p.as_str()),
            Invalidation::Keys(keys) => keys.iter().any(|k| k == key),
        }
    }
}

/// Broadcast channel for [`Invalidation`] notices
#[derive(Clone)]
pub struct InvalidationBus {
    tx: broadcast::Sender<Invalidation>,
}

impl Default for InvalidationBus {
    fn default() -> Self {
        Self::new()
    }
}

impl InvalidationBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }

    /// Publish a notice; returns how many subscribers received it
    pub fn publish(&self, notice: Invalidation) -> usize {
        debug!("Publishing invalidation {:?}", notice);
        // No subscribers is not an error: nothing is displaying the data
        self.tx.send(notice).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Invalidation> {
        self.tx.subscribe()
    }
}
