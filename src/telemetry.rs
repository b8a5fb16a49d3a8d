//! In-process metrics registry for dispatcher telemetry.
//!
//! Counters, gauges, and nanosecond timer accumulators live behind sharded
//! locks so follower workers record samples without contending on a single
//! map. The registry is cheap to clone and hand to every worker; snapshots
//! are serializable for operator endpoints.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const METRICS_SHARD_COUNT: usize = 8;

/// Time an entry spent in a follower queue before its send started.
pub const STAT_LOG_IN_QUEUE: &str = "dispatch.log_in_queue_ns";
/// End-to-end time from entry creation to dispatch completion.
pub const STAT_FROM_CREATE_TO_END: &str = "dispatch.from_create_to_end_ns";
/// Time spent waiting for the predecessor entry on the sync path.
pub const STAT_WAIT_PREV_LOG: &str = "dispatch.wait_prev_log_ns";
/// Time spent inside the synchronous append_entries call.
pub const STAT_SEND_BATCH: &str = "dispatch.send_batch_ns";

#[derive(Debug, Clone)]
pub struct MetricsRegistry {
    prefix: Arc<String>,
    shards: Arc<Vec<Mutex<MetricsShard>>>,
}

#[derive(Debug, Default)]
struct MetricsShard {
    counters: HashMap<String, Arc<AtomicU64>>,
    gauges: HashMap<String, Arc<AtomicU64>>,
    timers: HashMap<String, Arc<TimerCell>>,
}

#[derive(Debug, Default)]
struct TimerCell {
    count: AtomicU64,
    total_ns: AtomicU64,
}

/// Point-in-time view of every registered metric.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub counters: HashMap<String, u64>,
    pub gauges: HashMap<String, u64>,
    pub timers: HashMap<String, TimerSnapshot>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimerSnapshot {
    pub count: u64,
    pub total_ns: u64,
}

impl MetricsRegistry {
    pub fn new(namespace: impl Into<String>) -> Self {
        let raw = namespace.into();
        let prefix = if raw.ends_with('.') {
            raw
        } else {
            format!("{raw}.")
        };
        let shards = (0..METRICS_SHARD_COUNT)
            .map(|_| Mutex::new(MetricsShard::default()))
            .collect();
        Self {
            prefix: Arc::new(prefix),
            shards: Arc::new(shards),
        }
    }

    /// Adds `delta` to a counter, creating it on first use. Returns the new
    /// value.
    pub fn inc_counter(&self, name: impl Into<String>, delta: u64) -> u64 {
        let key = self.qualify(name.into());
        let cell = {
            let mut shard = self.shard_for(&key).lock();
            shard
                .counters
                .entry(key)
                .or_insert_with(|| Arc::new(AtomicU64::new(0)))
                .clone()
        };
        atomic_saturating_add(&cell, delta)
    }

    pub fn set_gauge(&self, name: impl Into<String>, value: u64) {
        let key = self.qualify(name.into());
        let cell = {
            let mut shard = self.shard_for(&key).lock();
            shard
                .gauges
                .entry(key)
                .or_insert_with(|| Arc::new(AtomicU64::new(0)))
                .clone()
        };
        cell.store(value, Ordering::Relaxed);
    }

    /// Records one nanosecond sample into a timer accumulator.
    pub fn observe_nanos(&self, name: impl Into<String>, nanos: u64) {
        let key = self.qualify(name.into());
        let cell = {
            let mut shard = self.shard_for(&key).lock();
            shard
                .timers
                .entry(key)
                .or_insert_with(|| Arc::new(TimerCell::default()))
                .clone()
        };
        atomic_saturating_add(&cell.count, 1);
        atomic_saturating_add(&cell.total_ns, nanos);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut counters = HashMap::new();
        let mut gauges = HashMap::new();
        let mut timers = HashMap::new();
        for shard in self.shards.iter() {
            let shard = shard.lock();
            for (name, cell) in shard.counters.iter() {
                counters.insert(name.clone(), cell.load(Ordering::Relaxed));
            }
            for (name, cell) in shard.gauges.iter() {
                gauges.insert(name.clone(), cell.load(Ordering::Relaxed));
            }
            for (name, cell) in shard.timers.iter() {
                timers.insert(
                    name.clone(),
                    TimerSnapshot {
                        count: cell.count.load(Ordering::Relaxed),
                        total_ns: cell.total_ns.load(Ordering::Relaxed),
                    },
                );
            }
        }
        MetricsSnapshot {
            counters,
            gauges,
            timers,
        }
    }

    fn shard_for(&self, key: &str) -> &Mutex<MetricsShard> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let idx = (hasher.finish() as usize) % self.shards.len();
        &self.shards[idx]
    }

    fn qualify(&self, name: String) -> String {
        if name.starts_with(self.prefix.as_str()) {
            name
        } else {
            format!("{}{}", self.prefix, name)
        }
    }
}

fn atomic_saturating_add(cell: &AtomicU64, delta: u64) -> u64 {
    let mut current = cell.load(Ordering::Relaxed);
    loop {
        let next = current.saturating_add(delta);
        match cell.compare_exchange(current, next, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(actual) => current = actual,
        }
    }
}
