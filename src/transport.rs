//! Transport seams for shipping AppendEntries batches to followers.
//!
//! The dispatch core never opens sockets itself: the surrounding node
//! provides clients through [`crate::raft::RaftMember`]. Two shapes exist
//! because their completion semantics differ. The synchronous client
//! blocks the dispatch worker until the follower answers; the asynchronous
//! client returns immediately and drives the completion handler from its
//! own context.

use crate::dispatch::BatchCompletionHandler;
use crate::raft::AppendEntriesRequest;
use parking_lot::Mutex;
use thiserror::Error;

/// Errors surfaced by follower transports.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("follower {follower} unreachable: {detail}")]
    Unreachable { follower: String, detail: String },
    #[error("connection closed before a response arrived")]
    ConnectionClosed,
}

/// Blocking append client: one request, one `i64` response (`-1` or the
/// follower's reported term).
pub trait SyncAppendClient: Send {
    fn append_entries(&mut self, request: &AppendEntriesRequest) -> Result<i64, TransportError>;
}

/// Fire-and-forget append client. `append_entries` must return without
/// waiting for the follower; the transport later consumes `handler` with
/// the single result or error for the whole batch.
pub trait AsyncAppendClient: Send + Sync {
    fn append_entries(&self, request: AppendEntriesRequest, handler: BatchCompletionHandler);
}

/// Check-out / return pool of synchronous clients for one follower.
///
/// Idle clients are reused LIFO; when the pool is empty the factory builds
/// a fresh one (or reports the follower unavailable with `None`).
pub struct SyncClientPool<C> {
    idle: Mutex<Vec<C>>,
    factory: Box<dyn Fn() -> Option<C> + Send + Sync>,
}

impl<C> SyncClientPool<C> {
    pub fn new(factory: impl Fn() -> Option<C> + Send + Sync + 'static) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            factory: Box::new(factory),
        }
    }

    /// Takes an idle client or builds a new one.
    pub fn checkout(&self) -> Option<C> {
        if let Some(client) = self.idle.lock().pop() {
            return Some(client);
        }
        (self.factory)()
    }

    /// Hands a checked-out client back for reuse.
    pub fn put_back(&self, client: C) {
        self.idle.lock().push(client);
    }

    pub fn idle_len(&self) -> usize {
        self.idle.lock().len()
    }
}
