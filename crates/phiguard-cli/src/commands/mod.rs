//! CLI command implementations.

pub mod check;
pub mod evaluate;
pub mod serve;
pub mod sweep;

use anyhow::{Context, Result};
use std::path::Path;

use phiguard_core::PhiguardConfig;

/// Load and validate the configuration. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<PhiguardConfig> {
    if !path.exists() {
        tracing::warn!(
            config = %path.display(),
            "Configuration file not found, using defaults"
        );
        let config = PhiguardConfig::default();
        config.validate()?;
        return Ok(config);
    }

    let config = PhiguardConfig::load_with_context(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    tracing::info!(config = %path.display(), "Loaded configuration");
    Ok(config)
}
