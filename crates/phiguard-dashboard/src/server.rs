//! API server.

use std::future::Future;

use tokio::net::TcpListener;

use phiguard_core::DashboardConfig;

use crate::error::DashboardError;
use crate::routes;
use crate::state::AppState;

/// The API server.
pub struct DashboardServer {
    config: DashboardConfig,
    state: AppState,
}

impl DashboardServer {
    /// Create a new server with the given configuration.
    pub fn new(config: DashboardConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Address the server binds to.
    pub fn bind_address(&self) -> String {
        self.config.bind_address()
    }

    /// Serve until `shutdown` resolves.
    pub async fn run<F>(&self, shutdown: F) -> Result<(), DashboardError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.bind_address();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| DashboardError::StartupFailed(format!("{}: {}", addr, e)))?;
        tracing::info!(address = %addr, "Starting phiguard API");

        let app = routes::create_router(self.state.clone());
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| DashboardError::StartupFailed(e.to_string()))?;

        tracing::info!("phiguard API stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phiguard_audit::AuditEngine;
    use phiguard_core::PhiguardConfig;
    use std::sync::Arc;

    #[tokio::test]
    async fn uses_configured_address() {
        let engine = AuditEngine::from_config(PhiguardConfig::default())
            .await
            .unwrap();
        let config = DashboardConfig {
            port: 9191,
            ..Default::default()
        };
        let server = DashboardServer::new(config, AppState::new(Arc::new(engine)));
        assert_eq!(server.bind_address(), "127.0.0.1:9191");
    }

    #[tokio::test]
    async fn bind_failure_is_startup_error() {
        let engine = AuditEngine::from_config(PhiguardConfig::default())
            .await
            .unwrap();
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let config = DashboardConfig {
            port: taken.local_addr().unwrap().port(),
            ..Default::default()
        };
        let server = DashboardServer::new(config, AppState::new(Arc::new(engine)));
        let err = server.run(async {}).await.unwrap_err();
        assert!(matches!(err, DashboardError::StartupFailed(_)));
    }
}
