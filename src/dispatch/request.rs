use crate::raft::{AppendEntryRequest, LogEntry, SerializeError};
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

/// Monotonic nanoseconds since the first call in this process.
pub(crate) fn monotonic_nanos() -> u64 {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    EPOCH.get_or_init(Instant::now).elapsed().as_nanos() as u64
}

/// One (entry, fan-out) submission to the dispatcher.
///
/// A single request is shared by reference across every follower queue it
/// enters; the vote counter, staleness flag, and higher-term slot are the
/// cells all follower completion callbacks converge on.
#[derive(Debug)]
pub struct SendRequest {
    log: Arc<dyn LogEntry>,
    vote_counter: Arc<AtomicI32>,
    leadership_stale: Arc<AtomicBool>,
    new_leader_term: Arc<AtomicU64>,
    single_request: AppendEntryRequest,
    serialized: Mutex<Option<Bytes>>,
    enqueue_time: AtomicU64,
}

impl SendRequest {
    pub fn new(
        log: Arc<dyn LogEntry>,
        vote_counter: Arc<AtomicI32>,
        leadership_stale: Arc<AtomicBool>,
        new_leader_term: Arc<AtomicU64>,
        single_request: AppendEntryRequest,
    ) -> Self {
        Self {
            log,
            vote_counter,
            leadership_stale,
            new_leader_term,
            single_request,
            serialized: Mutex::new(None),
            enqueue_time: AtomicU64::new(0),
        }
    }

    pub fn log(&self) -> &Arc<dyn LogEntry> {
        &self.log
    }

    pub fn vote_counter(&self) -> &Arc<AtomicI32> {
        &self.vote_counter
    }

    pub fn leadership_stale(&self) -> &Arc<AtomicBool> {
        &self.leadership_stale
    }

    pub fn new_leader_term(&self) -> &Arc<AtomicU64> {
        &self.new_leader_term
    }

    /// The prepared single-entry payload; its `entry` bytes stay empty
    /// until a worker fills a copy via [`AppendEntryRequest::with_entry`].
    pub fn single_request(&self) -> &AppendEntryRequest {
        &self.single_request
    }

    /// Serialized entry bytes, produced exactly once per request no matter
    /// how many follower workers race here. Runs outside the log manager's
    /// critical section.
    pub fn ensure_serialized(&self) -> Result<Bytes, SerializeError> {
        let mut slot = self.serialized.lock();
        if let Some(bytes) = slot.as_ref() {
            return Ok(bytes.clone());
        }
        let bytes = self.log.serialize()?;
        *slot = Some(bytes.clone());
        Ok(bytes)
    }

    /// Stamps the enqueue timestamp. The request is shared across the
    /// follower fan-out, so the last successful enqueue wins; the value is
    /// coarse telemetry, not per-follower state.
    pub fn stamp_enqueue(&self) {
        self.enqueue_time
            .store(monotonic_nanos(), Ordering::Relaxed);
    }

    /// Monotonic nanoseconds of the most recent successful enqueue; zero
    /// until the request enters a queue.
    pub fn enqueue_time(&self) -> u64 {
        self.enqueue_time.load(Ordering::Relaxed)
    }
}
