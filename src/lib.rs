//! Chronoraft: the Raft-leader log dispatch core of a clustered
//! time-series database.
//!
//! A leader appends log entries concurrently, but every follower must see
//! them in order: if three entries are sent in parallel they may arrive as
//! log3, log2, log1, and the follower stalls on the missing predecessor.
//! This crate turns the leader's append stream into one ordered, batched
//! delivery stream per follower, with bounded queues (drop on full, Raft's
//! catch-up path retransmits), dual sync/async transports, and a fan-out
//! completion path that decomposes a batch acknowledgement into per-entry
//! quorum votes.
#![deny(unreachable_pub)]
#![deny(unused_must_use)]

pub mod config;
pub mod dispatch;
pub mod raft;
pub mod telemetry;
pub mod transport;

pub use config::DispatchConfig;
pub use dispatch::{
    bounded, BatchCompletionHandler, BoundedQueue, LogDispatcher, QueueConsumer, SendRequest,
};
pub use raft::{
    AppendEntriesRequest, AppendEntryRequest, EntryCallback, GroupHeader, LogEntry, LogManager,
    NodeId, Peer, PeerMap, RaftMember, SerializeError,
};
pub use telemetry::{MetricsRegistry, MetricsSnapshot, TimerSnapshot};
pub use transport::{AsyncAppendClient, SyncAppendClient, SyncClientPool, TransportError};
