use super::log::LogEntry;
use super::peer::{NodeId, Peer, PeerMap};
use super::rpc::{AppendEntryRequest, GroupHeader};
use crate::transport::{AsyncAppendClient, SyncAppendClient, TransportError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64};
use std::sync::Arc;

/// Read-only view of the leader's log manager.
pub trait LogManager: Send + Sync {
    fn commit_index(&self) -> u64;

    fn last_log_index(&self) -> u64;
}

/// Per-entry completion callback synthesized by the Raft member.
///
/// One callback fires exactly once per (entry, follower); it alone decides
/// whether to count a quorum vote, raise the stale-leadership flag, or
/// record an observed higher term.
pub trait EntryCallback: Send {
    /// `result` is `-1` or the follower's reported term; the callback
    /// interprets it.
    fn on_complete(&self, result: i64);

    fn on_error(&self, error: &TransportError);
}

/// The surrounding Raft member, as consumed by the dispatch core.
///
/// The dispatcher never drives elections, commits, or persistence; it reads
/// the member's cluster view and hands entries to the member's transports.
pub trait RaftMember: Send + Sync {
    /// Display name used in logs.
    fn name(&self) -> &str;

    /// Every node in the group, including this one.
    fn all_nodes(&self) -> Vec<NodeId>;

    fn this_node(&self) -> &NodeId;

    fn header(&self) -> Option<GroupHeader>;

    /// Current term. Callers lock it for a consistent snapshot while
    /// building a request, so a concurrent term bump cannot tear the read.
    fn term(&self) -> &Mutex<u64>;

    fn log_manager(&self) -> &dyn LogManager;

    fn peer_map(&self) -> &PeerMap;

    /// Async transport client for `node`. Absent only while the node is
    /// being torn down.
    fn async_client(&self, node: &NodeId) -> Option<Arc<dyn AsyncAppendClient>>;

    /// Checks a synchronous client out of the pool for `node`.
    fn sync_client(&self, node: &NodeId) -> Option<Box<dyn SyncAppendClient>>;

    /// Returns a checked-out synchronous client to its pool. Must be called
    /// on every exit path once a client has been checked out.
    fn return_sync_client(&self, node: &NodeId, client: Box<dyn SyncAppendClient>);

    /// Bounded wait until `peer` is known to have acknowledged the entry
    /// preceding `log`. Returns false on timeout.
    fn wait_for_prev_log(&self, peer: &Peer, log: &dyn LogEntry) -> bool;

    /// Single-entry fast path: the member ships the already-prepared
    /// request itself and runs its own completion handling.
    fn send_log_to_follower(
        &self,
        log: Arc<dyn LogEntry>,
        vote_counter: Arc<AtomicI32>,
        receiver: &NodeId,
        leadership_stale: Arc<AtomicBool>,
        new_leader_term: Arc<AtomicU64>,
        request: AppendEntryRequest,
    );

    /// Synthesizes the completion callback for one (entry, follower) pair,
    /// bound to the entry's shared vote cells and the follower's peer state.
    fn append_callback(
        &self,
        log: Arc<dyn LogEntry>,
        vote_counter: Arc<AtomicI32>,
        receiver: NodeId,
        leadership_stale: Arc<AtomicBool>,
        new_leader_term: Arc<AtomicU64>,
        peer: Arc<Peer>,
    ) -> Box<dyn EntryCallback>;
}
