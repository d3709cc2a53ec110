use serde::{Deserialize, Serialize};

/// Fan-out configuration for a task dispatch.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct DispatchConfig {
    /// Number of concurrent workers the workload is partitioned across.
    ///
    /// Zero is accepted and makes a dispatch a no-op.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// Number of work items, indexed `0..total_items`.
    #[serde(default)]
    pub total_items: usize,
}

impl DispatchConfig {
    /// Default number of workers.
    pub const DEFAULT_WORKER_COUNT: usize = 8;
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            total_items: 0,
        }
    }
}

fn default_worker_count() -> usize {
    DispatchConfig::DEFAULT_WORKER_COUNT
}
