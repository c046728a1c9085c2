use serde::Deserialize;

/// Queue and fan-out settings, loaded from the `queue` config section
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct QueueSettings {
    /// Number of long-lived dispatch workers
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// Capacity of the pending-job channel
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// Per-attempt network timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Cap on concurrently in-flight sends within one job
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_per_platform: usize,
    /// Reserved batching knob carried from the config schema
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            buffer_size: default_buffer_size(),
            timeout: default_timeout(),
            max_concurrent_per_platform: default_max_concurrent(),
            batch_size: default_batch_size(),
        }
    }
}

const fn default_worker_count() -> usize {
    4
}

const fn default_buffer_size() -> usize {
    100
}

const fn default_timeout() -> u64 {
    10
}

const fn default_max_concurrent() -> usize {
    5
}

const fn default_batch_size() -> usize {
    10
}
