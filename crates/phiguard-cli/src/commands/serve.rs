//! `phiguard serve` - HTTP API plus the periodic retention sweep.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use phiguard_audit::AuditEngine;
use phiguard_dashboard::{AppState, DashboardServer};

pub async fn run(config_path: &Path) -> Result<()> {
    let config = super::load_config(config_path)?;
    let dashboard = config.dashboard.clone();
    let interval_secs = config.retention.sweep_interval_secs;

    let engine = Arc::new(AuditEngine::from_config(config).await?);
    let sweeper = spawn_periodic_sweep(engine.clone(), interval_secs);

    let result = if dashboard.enabled {
        let server = DashboardServer::new(dashboard, AppState::new(engine));
        server.run(shutdown_signal()).await.map_err(anyhow::Error::from)
    } else {
        tracing::info!("HTTP API disabled, running retention sweeps only");
        shutdown_signal().await;
        Ok(())
    };

    if let Some(handle) = sweeper {
        handle.abort();
    }
    result
}

/// Spawn the retention task. `None` when `interval_secs` is zero.
fn spawn_periodic_sweep(engine: Arc<AuditEngine>, interval_secs: u64) -> Option<JoinHandle<()>> {
    if interval_secs == 0 {
        tracing::info!("Periodic retention sweep disabled");
        return None;
    }

    tracing::info!(interval_secs, "Scheduling retention sweeps");
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match engine.retention().run_sweep().await {
                Ok(report) => tracing::info!(
                    scanned = report.scanned,
                    archived = report.archived,
                    deleted = report.deleted,
                    errors = report.errors,
                    duration_ms = report.duration_ms,
                    "Periodic retention sweep finished"
                ),
                Err(e) => tracing::error!(error = %e, "Periodic retention sweep failed"),
            }
        }
    }))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use phiguard_core::PhiguardConfig;

    #[tokio::test]
    async fn zero_interval_disables_sweeps() {
        let engine = Arc::new(
            AuditEngine::from_config(PhiguardConfig::default())
                .await
                .unwrap(),
        );
        assert!(spawn_periodic_sweep(engine, 0).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn sweeps_run_on_the_interval() {
        let engine = Arc::new(
            AuditEngine::from_config(PhiguardConfig::default())
                .await
                .unwrap(),
        );
        let handle = spawn_periodic_sweep(engine, 60).unwrap();
        tokio::time::sleep(Duration::from_secs(121)).await;
        assert!(!handle.is_finished());
        handle.abort();
    }
}
