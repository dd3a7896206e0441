//! Retention sweep configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the retention policy engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Days before expiry at which records are archived.
    #[serde(default = "default_archive_window_days")]
    pub archive_window_days: i64,

    /// Records fetched per sweep batch.
    #[serde(default = "default_sweep_batch_size")]
    pub sweep_batch_size: usize,

    /// Seconds between periodic sweeps. Zero disables the periodic task.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            archive_window_days: default_archive_window_days(),
            sweep_batch_size: default_sweep_batch_size(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn default_archive_window_days() -> i64 {
    30
}

fn default_sweep_batch_size() -> usize {
    500
}

fn default_sweep_interval_secs() -> u64 {
    3600
}
