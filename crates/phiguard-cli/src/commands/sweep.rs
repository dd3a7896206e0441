//! `phiguard sweep` - one retention sweep over the configured store.

use anyhow::Result;
use std::path::Path;

use phiguard_audit::AuditEngine;
use phiguard_core::StorageBackend;

pub async fn run(config_path: &Path) -> Result<()> {
    let config = super::load_config(config_path)?;
    if config.audit.storage.backend == StorageBackend::Memory {
        tracing::warn!("Sweeping the in-memory store; nothing persists past this process");
    }

    let engine = AuditEngine::from_config(config).await?;
    let report = engine.retention().run_sweep().await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    if report.errors > 0 {
        anyhow::bail!("Sweep finished with {} error(s)", report.errors);
    }
    Ok(())
}
