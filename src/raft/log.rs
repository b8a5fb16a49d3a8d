use bytes::Bytes;
use std::fmt;
use std::time::Instant;
use thiserror::Error;

/// A leader log entry as seen by the dispatch core.
///
/// Entries stay opaque here: the core needs their position in the log, the
/// term they were appended under, a creation timestamp for latency samples,
/// and the ability to produce the wire payload.
pub trait LogEntry: fmt::Debug + Send + Sync {
    /// Index of this entry in the leader's log.
    fn index(&self) -> u64;

    /// Term under which the entry was appended.
    fn term(&self) -> u64;

    /// Monotonic creation timestamp.
    fn create_time(&self) -> Instant;

    /// Produces the wire payload. Dispatch workers call this off the log
    /// manager's critical section.
    fn serialize(&self) -> Result<Bytes, SerializeError>;
}

#[derive(Debug, Error)]
#[error("log entry {index} failed to serialize: {detail}")]
pub struct SerializeError {
    pub index: u64,
    pub detail: String,
}
