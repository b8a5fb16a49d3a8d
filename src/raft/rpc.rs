use super::peer::NodeId;
use bytes::Bytes;

/// Identifies the raft group a request belongs to. Members of a
/// single-group cluster carry no header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupHeader {
    pub group_id: String,
}

impl GroupHeader {
    pub fn new(group_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
        }
    }
}

/// Pre-built single-entry append payload, prepared by the Raft member when
/// the entry is accepted. The `entry` bytes stay empty until a dispatch
/// worker fills a copy just before send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendEntryRequest {
    pub header: Option<GroupHeader>,
    pub term: u64,
    pub leader: NodeId,
    pub prev_log_index: u64,
    pub prev_log_term: u64,
    pub leader_commit: u64,
    pub entry: Bytes,
}

impl AppendEntryRequest {
    /// Copy of this payload carrying the serialized entry bytes.
    pub fn with_entry(&self, entry: Bytes) -> Self {
        let mut request = self.clone();
        request.entry = entry;
        request
    }
}

/// Batched AppendEntries payload shipped to one follower. `entries` holds
/// the serialized buffers in enqueue order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendEntriesRequest {
    pub header: Option<GroupHeader>,
    pub term: u64,
    pub leader: NodeId,
    pub prev_log_index: u64,
    pub prev_log_term: u64,
    pub entries: Vec<Bytes>,
    pub leader_commit: u64,
}
