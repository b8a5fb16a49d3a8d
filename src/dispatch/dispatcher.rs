use super::queue::{bounded, BoundedQueue};
use super::request::SendRequest;
use super::worker::DispatcherWorker;
use crate::config::DispatchConfig;
use crate::raft::{NodeId, RaftMember};
use crate::telemetry::MetricsRegistry;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

struct FollowerQueue {
    node: NodeId,
    queue: BoundedQueue<Arc<SendRequest>>,
}

/// Fans newly appended leader log entries out to one ordered queue per
/// follower, each drained by its own dispatch worker thread.
///
/// Per-follower queues keep one slow or disconnected follower from
/// blocking progress to healthy ones. A full queue drops the request for
/// that follower only; Raft's catch-up path covers the gap later.
pub struct LogDispatcher {
    member: Arc<dyn RaftMember>,
    queues: Vec<FollowerQueue>,
    workers: Vec<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
    metrics: MetricsRegistry,
}

impl LogDispatcher {
    /// Builds one queue and spawns one worker per follower of `member`.
    pub fn new(member: Arc<dyn RaftMember>, config: DispatchConfig) -> Self {
        let metrics = MetricsRegistry::new("chronoraft");
        let stop = Arc::new(AtomicBool::new(false));
        let mut queues = Vec::new();
        let mut workers = Vec::new();
        for node in member.all_nodes() {
            if node == *member.this_node() {
                continue;
            }
            let (queue, consumer) = bounded(config.min_logs_in_memory);
            let worker = DispatcherWorker::new(
                member.clone(),
                node.clone(),
                consumer,
                config.clone(),
                metrics.clone(),
                stop.clone(),
            );
            workers.push(thread::spawn(move || worker.run()));
            queues.push(FollowerQueue { node, queue });
        }
        info!(
            "event=dispatcher_start member={} followers={} queue_capacity={}",
            member.name(),
            queues.len(),
            config.min_logs_in_memory
        );
        Self {
            member,
            queues,
            workers,
            stop,
            metrics,
        }
    }

    /// Multicasts `request` to every follower queue without blocking.
    ///
    /// Each successful enqueue restamps the shared enqueue time (last
    /// write wins). A full queue drops the request for that follower at
    /// debug level; nothing is reported back to the producer.
    pub fn offer(&self, request: Arc<SendRequest>) {
        for follower in &self.queues {
            if follower.queue.try_offer(request.clone()) {
                request.stamp_enqueue();
            } else {
                debug!(
                    "event=dispatch_queue_full member={} follower={}",
                    self.member.name(),
                    follower.node
                );
                self.metrics
                    .inc_counter(format!("dispatch.queue_full.{}", follower.node), 1);
            }
        }
    }

    pub fn follower_count(&self) -> usize {
        self.queues.len()
    }

    /// Registry backing the dispatcher's counters and timing samples.
    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    /// Stops every worker. Queued-but-unsent requests are discarded;
    /// in-flight transport calls finish on their own.
    pub fn shutdown(&mut self) {
        if self.stop.swap(true, Ordering::SeqCst) {
            return;
        }
        // Dropping the producer halves disconnects the queues and wakes
        // any worker blocked in take().
        self.queues.clear();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!(
                    "event=dispatcher_worker_panic member={}",
                    self.member.name()
                );
            }
        }
    }
}

impl Drop for LogDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}
