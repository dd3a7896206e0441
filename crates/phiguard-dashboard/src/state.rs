//! Dashboard application state.

use std::sync::Arc;
use std::time::Instant;

use phiguard_audit::AuditEngine;

/// Shared application state for the dashboard.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    engine: Arc<AuditEngine>,
    started_at: Instant,
}

impl AppState {
    /// Create a new application state around an engine.
    pub fn new(engine: Arc<AuditEngine>) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                engine,
                started_at: Instant::now(),
            }),
        }
    }

    /// The audit engine.
    pub fn engine(&self) -> &AuditEngine {
        &self.inner.engine
    }

    /// Seconds since the state was created.
    pub fn uptime_secs(&self) -> u64 {
        self.inner.started_at.elapsed().as_secs()
    }
}
