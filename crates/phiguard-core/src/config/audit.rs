//! Audit recording and storage configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the audit write path and its stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Whether audit recording is enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Storage backend configuration.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Path of the write-once archive (JSON Lines). Archives are kept in
    /// memory when unset.
    #[serde(default)]
    pub cold_store_path: Option<String>,

    /// Populate the store with generated sample entries at startup.
    /// Development only; never consulted by the query path.
    #[serde(default)]
    pub seed_fixtures: bool,

    /// Number of sample entries generated when `seed_fixtures` is on.
    #[serde(default = "default_fixture_count")]
    pub fixture_count: usize,

    /// Keys in an event's `details` whose values are hashed before persisting.
    #[serde(default = "default_phi_detail_keys")]
    pub phi_detail_keys: Vec<String>,
}

/// Storage backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// Storage backend type.
    #[serde(default)]
    pub backend: StorageBackend,

    /// File path (for file backend).
    #[serde(default)]
    pub file_path: Option<String>,

    /// Database URL (for database backend).
    #[serde(default)]
    pub database_url: Option<String>,

    /// Environment variable holding the database URL. Checked before `database_url`.
    #[serde(default)]
    pub database_url_env: Option<String>,
}

impl StorageConfig {
    /// Resolve the database URL, preferring the environment variable.
    pub fn resolve_database_url(&self) -> Option<String> {
        if let Some(var) = &self.database_url_env
            && let Ok(url) = std::env::var(var)
        {
            return Some(url);
        }
        self.database_url.clone()
    }
}

/// Storage backend type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Keep entries in process memory.
    #[default]
    Memory,
    /// Append to a JSON Lines file.
    File,
    /// Store in Postgres.
    Database,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            storage: StorageConfig::default(),
            cold_store_path: None,
            seed_fixtures: false,
            fixture_count: default_fixture_count(),
            phi_detail_keys: default_phi_detail_keys(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_fixture_count() -> usize {
    200
}

fn default_phi_detail_keys() -> Vec<String> {
    [
        "patient_name",
        "ssn",
        "date_of_birth",
        "dob",
        "diagnosis",
        "email",
        "phone",
        "address",
        "biomarker_value",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
