//! Dashboard configuration.
//!
//! This module defines configuration for the HTTP API over the audit trail.

use serde::{Deserialize, Serialize};

/// Configuration for the HTTP API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Whether the API is served.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            host: default_host(),
            port: default_port(),
        }
    }
}

impl DashboardConfig {
    /// Socket address string, e.g. `127.0.0.1:8080`.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_enabled() -> bool {
    true
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}
