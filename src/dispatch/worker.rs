use super::handler::BatchCompletionHandler;
use super::queue::QueueConsumer;
use super::request::SendRequest;
use crate::config::DispatchConfig;
use crate::raft::{AppendEntriesRequest, NodeId, Peer, RaftMember};
use crate::telemetry::{
    MetricsRegistry, STAT_FROM_CREATE_TO_END, STAT_LOG_IN_QUEUE, STAT_SEND_BATCH,
    STAT_WAIT_PREV_LOG,
};
use bytes::Bytes;
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// A batch member whose entry bytes have already been produced.
struct PreparedRequest {
    request: Arc<SendRequest>,
    entry: Bytes,
}

/// Per-follower dispatch loop, pinned to one OS thread for its lifetime.
///
/// Single-threaded per follower by construction: the wire order to this
/// follower equals the queue's enqueue order.
pub(crate) struct DispatcherWorker {
    member: Arc<dyn RaftMember>,
    receiver: NodeId,
    queue: QueueConsumer<Arc<SendRequest>>,
    peer: Arc<Peer>,
    config: DispatchConfig,
    metrics: MetricsRegistry,
    stop: Arc<AtomicBool>,
    batch: Vec<PreparedRequest>,
}

impl DispatcherWorker {
    pub(crate) fn new(
        member: Arc<dyn RaftMember>,
        receiver: NodeId,
        queue: QueueConsumer<Arc<SendRequest>>,
        config: DispatchConfig,
        metrics: MetricsRegistry,
        stop: Arc<AtomicBool>,
    ) -> Self {
        let peer = member
            .peer_map()
            .get_or_insert(&receiver, || member.log_manager().last_log_index());
        Self {
            member,
            receiver,
            queue,
            peer,
            config,
            metrics,
            stop,
            batch: Vec::new(),
        }
    }

    pub(crate) fn run(mut self) {
        let mut staged: Vec<Arc<SendRequest>> = Vec::new();
        while let Some(request) = self.queue.take() {
            if self.stop.load(Ordering::Relaxed) {
                // Shutdown discards anything still queued.
                break;
            }
            staged.push(request);
            self.queue.drain_to(&mut staged);

            for request in staged.drain(..) {
                match request.ensure_serialized() {
                    Ok(entry) => self.batch.push(PreparedRequest { request, entry }),
                    Err(err) => error!(
                        "event=dispatch_serialize_failed member={} follower={} error={}",
                        self.member.name(),
                        self.receiver,
                        err
                    ),
                }
            }
            debug!(
                "event=dispatch_batch member={} follower={} size={}",
                self.member.name(),
                self.receiver,
                self.batch.len()
            );

            match self.batch.len() {
                0 => {}
                1 => self.send_single(),
                _ => self.send_batch(),
            }
            self.batch.clear();
        }
        info!(
            "event=dispatcher_exit member={} follower={}",
            self.member.name(),
            self.receiver
        );
    }

    /// A lone request ships through the member's prepared single-entry
    /// path; rebatching work buys nothing under light load.
    fn send_single(&self) {
        let prepared = &self.batch[0];
        let create_time = prepared.request.log().create_time();
        if self.config.enable_instrumenting {
            self.metrics
                .observe_nanos(STAT_LOG_IN_QUEUE, nanos_since(create_time));
        }
        self.member.send_log_to_follower(
            prepared.request.log().clone(),
            prepared.request.vote_counter().clone(),
            &self.receiver,
            prepared.request.leadership_stale().clone(),
            prepared.request.new_leader_term().clone(),
            prepared
                .request
                .single_request()
                .with_entry(prepared.entry.clone()),
        );
        if self.config.enable_instrumenting {
            self.metrics
                .observe_nanos(STAT_FROM_CREATE_TO_END, nanos_since(create_time));
        }
    }

    fn send_batch(&self) {
        if self.config.enable_instrumenting {
            for prepared in &self.batch {
                self.metrics.observe_nanos(
                    STAT_LOG_IN_QUEUE,
                    nanos_since(prepared.request.log().create_time()),
                );
            }
        }
        let entries: Vec<Bytes> = self.batch.iter().map(|p| p.entry.clone()).collect();
        let request = self.build_request(entries);

        if self.config.use_async_server {
            self.append_entries_async(request);
        } else {
            self.append_entries_sync(request);
        }

        if self.config.enable_instrumenting {
            for prepared in &self.batch {
                self.metrics.observe_nanos(
                    STAT_FROM_CREATE_TO_END,
                    nanos_since(prepared.request.log().create_time()),
                );
            }
        }
    }

    fn build_request(&self, entries: Vec<Bytes>) -> AppendEntriesRequest {
        let first = &self.batch[0].request;
        // Term is snapshotted under the member's lock so a concurrent term
        // bump cannot tear the read.
        let term = *self.member.term().lock();
        AppendEntriesRequest {
            header: self.member.header(),
            term,
            leader: self.member.this_node().clone(),
            prev_log_index: first.log().index().saturating_sub(1),
            prev_log_term: first.single_request().prev_log_term,
            entries,
            leader_commit: self.member.log_manager().commit_index(),
        }
    }

    fn append_entries_async(&self, request: AppendEntriesRequest) {
        let Some(client) = self.member.async_client(&self.receiver) else {
            warn!(
                "event=dispatch_async_client_missing member={} follower={}",
                self.member.name(),
                self.receiver
            );
            return;
        };
        let handler = self.completion_handler();
        debug!(
            "event=dispatch_batch_async member={} follower={} entries={}",
            self.member.name(),
            self.receiver,
            request.entries.len()
        );
        client.append_entries(request, handler);
    }

    fn append_entries_sync(&self, request: AppendEntriesRequest) {
        let first = &self.batch[0].request;
        let wait_start = Instant::now();
        if !self.member.wait_for_prev_log(&self.peer, first.log().as_ref()) {
            // Abandoning the batch is safe: Raft's catch-up path retransmits.
            warn!(
                "event=dispatch_prev_log_timeout member={} follower={} first_index={}",
                self.member.name(),
                self.receiver,
                first.log().index()
            );
            return;
        }
        if self.config.enable_instrumenting {
            self.metrics
                .observe_nanos(STAT_WAIT_PREV_LOG, nanos_since(wait_start));
        }

        let Some(mut client) = self.member.sync_client(&self.receiver) else {
            warn!(
                "event=dispatch_sync_client_missing member={} follower={}",
                self.member.name(),
                self.receiver
            );
            return;
        };
        let handler = self.completion_handler();
        let first_index = request.prev_log_index + 1;
        let entry_count = request.entries.len();
        let send_start = Instant::now();
        match client.append_entries(&request) {
            Ok(result) => {
                if self.config.enable_instrumenting {
                    self.metrics
                        .observe_nanos(STAT_SEND_BATCH, nanos_since(send_start));
                }
                if result != -1 {
                    info!(
                        "event=dispatch_batch_applied member={} follower={} entries={} resp={}",
                        self.member.name(),
                        self.receiver,
                        entry_count,
                        result
                    );
                }
                handler.on_complete(result);
            }
            Err(err) => {
                handler.on_error(&err);
                warn!(
                    "event=dispatch_batch_failed member={} follower={} first_index={} error={}",
                    self.member.name(),
                    self.receiver,
                    first_index,
                    err
                );
            }
        }
        self.member.return_sync_client(&self.receiver, client);
    }

    fn completion_handler(&self) -> BatchCompletionHandler {
        let requests: Vec<Arc<SendRequest>> =
            self.batch.iter().map(|p| p.request.clone()).collect();
        BatchCompletionHandler::new(self.member.as_ref(), &self.receiver, &self.peer, &requests)
    }
}

fn nanos_since(start: Instant) -> u64 {
    Instant::now().saturating_duration_since(start).as_nanos() as u64
}
