//! Escalation channel configuration.

use serde::{Deserialize, Serialize};

/// Where high-risk entries are sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationConfig {
    /// Whether escalation is enabled at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Webhook receiving `{entry, triggered_at}`. Escalations are only logged when unset.
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Request timeout for the webhook.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            webhook_url: None,
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_timeout_ms() -> u64 {
    3000
}
