//! Audit query configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the audit query engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Page size used when the caller doesn't give one.
    #[serde(default = "default_limit")]
    pub default_limit: usize,

    /// Upper bound on page size.
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,

    /// Milliseconds after which an in-flight query is abandoned.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Window (minutes either side) for related events on detail fetches.
    #[serde(default = "default_related_window_minutes")]
    pub related_window_minutes: i64,

    /// Maximum related events returned on detail fetches.
    #[serde(default = "default_related_limit")]
    pub related_limit: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            timeout_ms: default_timeout_ms(),
            related_window_minutes: default_related_window_minutes(),
            related_limit: default_related_limit(),
        }
    }
}

fn default_limit() -> usize {
    50
}

fn default_max_limit() -> usize {
    100
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_related_window_minutes() -> i64 {
    30
}

fn default_related_limit() -> usize {
    20
}
