#![allow(dead_code)]

//! Shared mock Raft member, transports, and callbacks for dispatcher
//! checkpoint tests.

use bytes::Bytes;
use chronoraft::{
    AppendEntriesRequest, AppendEntryRequest, AsyncAppendClient, BatchCompletionHandler,
    EntryCallback, GroupHeader, LogEntry, LogManager, NodeId, Peer, PeerMap, RaftMember,
    SendRequest, SerializeError, SyncAppendClient, SyncClientPool, TransportError,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex as StdMutex};
use std::thread;
use std::time::{Duration, Instant};

/// Reusable latch used to hold a dispatch worker inside a send call.
pub struct Gate {
    open: StdMutex<bool>,
    cv: Condvar,
    entered: AtomicUsize,
}

impl Gate {
    pub fn closed() -> Arc<Self> {
        Arc::new(Self {
            open: StdMutex::new(false),
            cv: Condvar::new(),
            entered: AtomicUsize::new(0),
        })
    }

    pub fn wait(&self) {
        self.entered.fetch_add(1, Ordering::SeqCst);
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.cv.wait(open).unwrap();
        }
    }

    pub fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.cv.notify_all();
    }

    pub fn close(&self) {
        *self.open.lock().unwrap() = false;
    }

    /// How many waiters have ever entered the gate.
    pub fn entered(&self) -> usize {
        self.entered.load(Ordering::SeqCst)
    }
}

/// Polls `predicate` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut predicate: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if predicate() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    predicate()
}

/// In-memory log entry with instrumented serialization.
#[derive(Debug)]
pub struct TestLog {
    index: u64,
    term: u64,
    created: Instant,
    payload: Bytes,
    serialize_calls: Arc<AtomicUsize>,
    forbidden_during: Option<(Arc<AtomicBool>, Arc<AtomicUsize>)>,
}

impl TestLog {
    pub fn new(index: u64, term: u64, payload: impl Into<Bytes>) -> Self {
        Self {
            index,
            term,
            created: Instant::now(),
            payload: payload.into(),
            serialize_calls: Arc::new(AtomicUsize::new(0)),
            forbidden_during: None,
        }
    }

    /// Counts a violation whenever `flag` is raised while `serialize` runs.
    pub fn forbid_serialize_during(
        mut self,
        flag: Arc<AtomicBool>,
        violations: Arc<AtomicUsize>,
    ) -> Self {
        self.forbidden_during = Some((flag, violations));
        self
    }

    pub fn serialize_calls(&self) -> Arc<AtomicUsize> {
        self.serialize_calls.clone()
    }
}

impl LogEntry for TestLog {
    fn index(&self) -> u64 {
        self.index
    }

    fn term(&self) -> u64 {
        self.term
    }

    fn create_time(&self) -> Instant {
        self.created
    }

    fn serialize(&self) -> Result<Bytes, SerializeError> {
        self.serialize_calls.fetch_add(1, Ordering::SeqCst);
        if let Some((flag, violations)) = &self.forbidden_during {
            if flag.load(Ordering::SeqCst) {
                violations.fetch_add(1, Ordering::SeqCst);
            }
        }
        Ok(self.payload.clone())
    }
}

/// What the mock member observed being sent to one follower.
#[derive(Debug, Clone)]
pub enum SendEvent {
    Single(AppendEntryRequest),
    Batch(AppendEntriesRequest),
}

impl SendEvent {
    pub fn payloads(&self) -> Vec<Bytes> {
        match self {
            SendEvent::Single(request) => vec![request.entry.clone()],
            SendEvent::Batch(request) => request.entries.clone(),
        }
    }
}

/// One per-entry completion observed by a recording callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackRecord {
    pub follower: NodeId,
    pub index: u64,
    pub result: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    pub follower: NodeId,
    pub index: u64,
    pub detail: String,
}

/// Mutable transcript and behavior switches shared by the mock member and
/// its transports.
#[derive(Default)]
pub struct MemberState {
    events: Mutex<HashMap<NodeId, Vec<SendEvent>>>,
    gates: Mutex<HashMap<NodeId, Arc<Gate>>>,
    allow_prev_log: AtomicBool,
    prev_log_calls: AtomicUsize,
    sync_fail: AtomicBool,
    sync_result: AtomicI64,
    sync_checkouts: AtomicUsize,
    sync_returns: AtomicUsize,
    async_batches: Mutex<HashMap<NodeId, Vec<(AppendEntriesRequest, BatchCompletionHandler)>>>,
    completes: Mutex<Vec<CallbackRecord>>,
    errors: Mutex<Vec<ErrorRecord>>,
    pools: Mutex<HashMap<NodeId, Arc<SyncClientPool<Box<dyn SyncAppendClient>>>>>,
}

impl MemberState {
    fn record(&self, node: &NodeId, event: SendEvent) {
        self.events.lock().entry(node.clone()).or_default().push(event);
    }
}

struct RecordingSyncClient {
    node: NodeId,
    state: Arc<MemberState>,
}

impl SyncAppendClient for RecordingSyncClient {
    fn append_entries(&mut self, request: &AppendEntriesRequest) -> Result<i64, TransportError> {
        self.state
            .record(&self.node, SendEvent::Batch(request.clone()));
        if self.state.sync_fail.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionClosed);
        }
        Ok(self.state.sync_result.load(Ordering::SeqCst))
    }
}

struct RecordingAsyncClient {
    node: NodeId,
    state: Arc<MemberState>,
}

impl AsyncAppendClient for RecordingAsyncClient {
    fn append_entries(&self, request: AppendEntriesRequest, handler: BatchCompletionHandler) {
        self.state
            .async_batches
            .lock()
            .entry(self.node.clone())
            .or_default()
            .push((request, handler));
    }
}

/// Callback with the vote-counting semantics the member would install:
/// `-1` counts a vote, anything else marks leadership stale and records
/// the observed term.
struct RecordingCallback {
    follower: NodeId,
    index: u64,
    vote_counter: Arc<AtomicI32>,
    leadership_stale: Arc<AtomicBool>,
    new_leader_term: Arc<AtomicU64>,
    state: Arc<MemberState>,
}

impl EntryCallback for RecordingCallback {
    fn on_complete(&self, result: i64) {
        self.state.completes.lock().push(CallbackRecord {
            follower: self.follower.clone(),
            index: self.index,
            result,
        });
        if result == -1 {
            self.vote_counter.fetch_sub(1, Ordering::SeqCst);
        } else {
            self.leadership_stale.store(true, Ordering::SeqCst);
            self.new_leader_term
                .fetch_max(result as u64, Ordering::SeqCst);
        }
    }

    fn on_error(&self, error: &TransportError) {
        self.state.errors.lock().push(ErrorRecord {
            follower: self.follower.clone(),
            index: self.index,
            detail: error.to_string(),
        });
    }
}

struct MockLogManager {
    commit_index: AtomicU64,
    last_log_index: AtomicU64,
    critical_section: Arc<AtomicBool>,
}

impl LogManager for MockLogManager {
    fn commit_index(&self) -> u64 {
        self.critical_section.store(true, Ordering::SeqCst);
        let value = self.commit_index.load(Ordering::SeqCst);
        self.critical_section.store(false, Ordering::SeqCst);
        value
    }

    fn last_log_index(&self) -> u64 {
        self.critical_section.store(true, Ordering::SeqCst);
        let value = self.last_log_index.load(Ordering::SeqCst);
        self.critical_section.store(false, Ordering::SeqCst);
        value
    }
}

pub struct MockMember {
    name: String,
    this_node: NodeId,
    nodes: Vec<NodeId>,
    header: Option<GroupHeader>,
    term: Mutex<u64>,
    log_manager: MockLogManager,
    peer_map: PeerMap,
    state: Arc<MemberState>,
}

impl MockMember {
    pub fn new(name: &str, followers: &[&str]) -> Arc<Self> {
        let this_node = NodeId::new(name);
        let mut nodes = vec![this_node.clone()];
        nodes.extend(followers.iter().map(|id| NodeId::new(*id)));
        let state = Arc::new(MemberState {
            allow_prev_log: AtomicBool::new(true),
            sync_result: AtomicI64::new(-1),
            ..MemberState::default()
        });
        Arc::new(Self {
            name: name.to_string(),
            this_node,
            nodes,
            header: None,
            term: Mutex::new(1),
            log_manager: MockLogManager {
                commit_index: AtomicU64::new(0),
                last_log_index: AtomicU64::new(0),
                critical_section: Arc::new(AtomicBool::new(false)),
            },
            peer_map: PeerMap::new(),
            state,
        })
    }

    pub fn with_header(name: &str, followers: &[&str], group_id: &str) -> Arc<Self> {
        let member = Self::new(name, followers);
        // Arc not yet shared; safe to unwrap and edit.
        let mut inner = Arc::try_unwrap(member).ok().unwrap();
        inner.header = Some(GroupHeader::new(group_id));
        Arc::new(inner)
    }

    pub fn set_term(&self, term: u64) {
        *self.term.lock() = term;
    }

    pub fn set_commit_index(&self, index: u64) {
        self.log_manager.commit_index.store(index, Ordering::SeqCst);
    }

    pub fn set_last_log_index(&self, index: u64) {
        self.log_manager
            .last_log_index
            .store(index, Ordering::SeqCst);
    }

    pub fn critical_section_flag(&self) -> Arc<AtomicBool> {
        self.log_manager.critical_section.clone()
    }

    /// Installs a closed gate that stalls single-entry sends to `node`.
    pub fn stall_single_sends(&self, node: &str) -> Arc<Gate> {
        let gate = Gate::closed();
        self.state
            .gates
            .lock()
            .insert(NodeId::new(node), gate.clone());
        gate
    }

    pub fn set_allow_prev_log(&self, allow: bool) {
        self.state.allow_prev_log.store(allow, Ordering::SeqCst);
    }

    pub fn prev_log_calls(&self) -> usize {
        self.state.prev_log_calls.load(Ordering::SeqCst)
    }

    pub fn set_sync_fail(&self, fail: bool) {
        self.state.sync_fail.store(fail, Ordering::SeqCst);
    }

    pub fn set_sync_result(&self, result: i64) {
        self.state.sync_result.store(result, Ordering::SeqCst);
    }

    pub fn sync_checkouts(&self) -> usize {
        self.state.sync_checkouts.load(Ordering::SeqCst)
    }

    pub fn sync_returns(&self) -> usize {
        self.state.sync_returns.load(Ordering::SeqCst)
    }

    pub fn events_for(&self, node: &str) -> Vec<SendEvent> {
        self.state
            .events
            .lock()
            .get(&NodeId::new(node))
            .cloned()
            .unwrap_or_default()
    }

    /// Every payload shipped to `node`, flattened across singles and
    /// batches in send order.
    pub fn payloads_for(&self, node: &str) -> Vec<Bytes> {
        self.events_for(node)
            .iter()
            .flat_map(SendEvent::payloads)
            .collect()
    }

    pub fn take_async_batches(
        &self,
        node: &str,
    ) -> Vec<(AppendEntriesRequest, BatchCompletionHandler)> {
        self.state
            .async_batches
            .lock()
            .remove(&NodeId::new(node))
            .unwrap_or_default()
    }

    pub fn async_batch_count(&self, node: &str) -> usize {
        self.state
            .async_batches
            .lock()
            .get(&NodeId::new(node))
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn completes(&self) -> Vec<CallbackRecord> {
        self.state.completes.lock().clone()
    }

    pub fn errors(&self) -> Vec<ErrorRecord> {
        self.state.errors.lock().clone()
    }

    fn gate_for(&self, node: &NodeId) -> Option<Arc<Gate>> {
        self.state.gates.lock().get(node).cloned()
    }
}

impl RaftMember for MockMember {
    fn name(&self) -> &str {
        &self.name
    }

    fn all_nodes(&self) -> Vec<NodeId> {
        self.nodes.clone()
    }

    fn this_node(&self) -> &NodeId {
        &self.this_node
    }

    fn header(&self) -> Option<GroupHeader> {
        self.header.clone()
    }

    fn term(&self) -> &Mutex<u64> {
        &self.term
    }

    fn log_manager(&self) -> &dyn LogManager {
        &self.log_manager
    }

    fn peer_map(&self) -> &PeerMap {
        &self.peer_map
    }

    fn async_client(&self, node: &NodeId) -> Option<Arc<dyn AsyncAppendClient>> {
        Some(Arc::new(RecordingAsyncClient {
            node: node.clone(),
            state: self.state.clone(),
        }))
    }

    fn sync_client(&self, node: &NodeId) -> Option<Box<dyn SyncAppendClient>> {
        let pool = {
            let mut pools = self.state.pools.lock();
            pools
                .entry(node.clone())
                .or_insert_with(|| {
                    let state = self.state.clone();
                    let node = node.clone();
                    Arc::new(SyncClientPool::new(move || {
                        Some(Box::new(RecordingSyncClient {
                            node: node.clone(),
                            state: state.clone(),
                        }) as Box<dyn SyncAppendClient>)
                    }))
                })
                .clone()
        };
        let client = pool.checkout();
        if client.is_some() {
            self.state.sync_checkouts.fetch_add(1, Ordering::SeqCst);
        }
        client
    }

    fn return_sync_client(&self, node: &NodeId, client: Box<dyn SyncAppendClient>) {
        self.state.sync_returns.fetch_add(1, Ordering::SeqCst);
        if let Some(pool) = self.state.pools.lock().get(node) {
            pool.put_back(client);
        }
    }

    fn wait_for_prev_log(&self, _peer: &Peer, _log: &dyn LogEntry) -> bool {
        self.state.prev_log_calls.fetch_add(1, Ordering::SeqCst);
        self.state.allow_prev_log.load(Ordering::SeqCst)
    }

    fn send_log_to_follower(
        &self,
        _log: Arc<dyn LogEntry>,
        _vote_counter: Arc<AtomicI32>,
        receiver: &NodeId,
        _leadership_stale: Arc<AtomicBool>,
        _new_leader_term: Arc<AtomicU64>,
        request: AppendEntryRequest,
    ) {
        if let Some(gate) = self.gate_for(receiver) {
            gate.wait();
        }
        self.state.record(receiver, SendEvent::Single(request));
    }

    fn append_callback(
        &self,
        log: Arc<dyn LogEntry>,
        vote_counter: Arc<AtomicI32>,
        receiver: NodeId,
        leadership_stale: Arc<AtomicBool>,
        new_leader_term: Arc<AtomicU64>,
        _peer: Arc<Peer>,
    ) -> Box<dyn EntryCallback> {
        Box::new(RecordingCallback {
            follower: receiver,
            index: log.index(),
            vote_counter,
            leadership_stale,
            new_leader_term,
            state: self.state.clone(),
        })
    }
}

/// A submission plus handles onto its shared completion cells.
pub struct BuiltRequest {
    pub request: Arc<SendRequest>,
    pub serialize_calls: Arc<AtomicUsize>,
    pub vote_counter: Arc<AtomicI32>,
    pub leadership_stale: Arc<AtomicBool>,
    pub new_leader_term: Arc<AtomicU64>,
    pub payload: Bytes,
}

pub fn build_request(member: &MockMember, index: u64, prev_log_term: u64) -> BuiltRequest {
    build_request_with_log(member, TestLog::new(index, 1, payload_for(index)), prev_log_term)
}

pub fn build_request_with_log(
    member: &MockMember,
    log: TestLog,
    prev_log_term: u64,
) -> BuiltRequest {
    let payload = Bytes::from(payload_for(log.index()));
    let serialize_calls = log.serialize_calls();
    let index = log.index();
    let vote_counter = Arc::new(AtomicI32::new(2));
    let leadership_stale = Arc::new(AtomicBool::new(false));
    let new_leader_term = Arc::new(AtomicU64::new(0));
    let request = Arc::new(SendRequest::new(
        Arc::new(log),
        vote_counter.clone(),
        leadership_stale.clone(),
        new_leader_term.clone(),
        AppendEntryRequest {
            header: member.header(),
            term: *member.term().lock(),
            leader: member.this_node().clone(),
            prev_log_index: index.saturating_sub(1),
            prev_log_term,
            leader_commit: 0,
            entry: Bytes::new(),
        },
    ));
    BuiltRequest {
        request,
        serialize_calls,
        vote_counter,
        leadership_stale,
        new_leader_term,
        payload,
    }
}

pub fn payload_for(index: u64) -> Vec<u8> {
    format!("entry-{index}").into_bytes()
}
