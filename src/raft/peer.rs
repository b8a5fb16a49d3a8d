use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Unique identifier of a cluster node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        NodeId::new(value)
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        NodeId::new(value)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Cached replication progress for one follower, shared between the
/// dispatch worker and the completion callbacks that advance it.
#[derive(Debug)]
pub struct Peer {
    match_index: AtomicU64,
    next_index: AtomicU64,
}

impl Peer {
    /// A fresh peer starts sending from the leader's last log index.
    pub fn new(last_log_index: u64) -> Self {
        Self {
            match_index: AtomicU64::new(0),
            next_index: AtomicU64::new(last_log_index),
        }
    }

    pub fn match_index(&self) -> u64 {
        self.match_index.load(Ordering::Acquire)
    }

    /// Raises the matched index; acknowledgements may arrive out of order,
    /// so regressions are ignored.
    pub fn advance_match_index(&self, index: u64) {
        self.match_index.fetch_max(index, Ordering::AcqRel);
    }

    pub fn next_index(&self) -> u64 {
        self.next_index.load(Ordering::Acquire)
    }

    pub fn set_next_index(&self, index: u64) {
        self.next_index.store(index, Ordering::Release);
    }
}

/// Lazily-populated map of follower peer state, keyed by node identity.
#[derive(Debug, Default)]
pub struct PeerMap {
    inner: Mutex<HashMap<NodeId, Arc<Peer>>>,
}

impl PeerMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the peer for `node`, creating it on first sight with the
    /// index produced by `init` (the leader's last log index).
    pub fn get_or_insert(&self, node: &NodeId, init: impl FnOnce() -> u64) -> Arc<Peer> {
        let mut inner = self.inner.lock();
        inner
            .entry(node.clone())
            .or_insert_with(|| Arc::new(Peer::new(init())))
            .clone()
    }

    pub fn get(&self, node: &NodeId) -> Option<Arc<Peer>> {
        self.inner.lock().get(node).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
