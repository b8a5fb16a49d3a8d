//! Leader-side Raft surfaces consumed by the dispatch core: log entries,
//! the member seam, follower peer state, and AppendEntries payloads.

pub mod log;
pub mod member;
pub mod peer;
pub mod rpc;

pub use log::{LogEntry, SerializeError};
pub use member::{EntryCallback, LogManager, RaftMember};
pub use peer::{NodeId, Peer, PeerMap};
pub use rpc::{AppendEntriesRequest, AppendEntryRequest, GroupHeader};
