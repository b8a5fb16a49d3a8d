use super::request::SendRequest;
use crate::raft::{EntryCallback, NodeId, Peer, RaftMember};
use crate::transport::TransportError;
use std::sync::Arc;

/// Decomposes one batch acknowledgement into per-entry completions.
///
/// The follower acknowledges (or fails) a batched AppendEntries call as a
/// unit; Raft still needs one vote decision per entry. At construction the
/// handler synthesizes one callback per batch member through the member's
/// factory, then replays the single transport outcome onto all of them.
/// `on_complete` and `on_error` consume the handler, so a second delivery
/// is unrepresentable.
pub struct BatchCompletionHandler {
    callbacks: Vec<Box<dyn EntryCallback>>,
}

impl BatchCompletionHandler {
    /// Builds the per-entry callbacks for `batch`, each bound to its
    /// entry's shared vote cells, the receiving follower, and its peer
    /// state. The handler owns its callbacks outright; the caller is free
    /// to clear the batch buffer afterwards.
    pub fn new(
        member: &dyn RaftMember,
        receiver: &NodeId,
        peer: &Arc<Peer>,
        batch: &[Arc<SendRequest>],
    ) -> Self {
        let mut callbacks = Vec::with_capacity(batch.len());
        for request in batch {
            callbacks.push(member.append_callback(
                request.log().clone(),
                request.vote_counter().clone(),
                receiver.clone(),
                request.leadership_stale().clone(),
                request.new_leader_term().clone(),
                peer.clone(),
            ));
        }
        Self { callbacks }
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Replays `result` onto every per-entry callback, in batch order.
    pub fn on_complete(self, result: i64) {
        for callback in &self.callbacks {
            callback.on_complete(result);
        }
    }

    /// Replays the transport failure onto every per-entry callback. No
    /// partial-success inference: the batch is atomic at this layer.
    pub fn on_error(self, error: &TransportError) {
        for callback in &self.callbacks {
            callback.on_error(error);
        }
    }
}
