use serde::{Deserialize, Serialize};

/// Tuning knobs for the log dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Capacity of each follower queue. Offers beyond this are dropped for
    /// the affected follower only.
    pub min_logs_in_memory: usize,
    /// Ship batches through the async transport instead of pooled
    /// synchronous clients.
    pub use_async_server: bool,
    /// Record queue and send timing samples into the metrics registry.
    pub enable_instrumenting: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            min_logs_in_memory: 100,
            use_async_server: false,
            enable_instrumenting: false,
        }
    }
}
