//! Coordinator server

use crate::common::{shutdown_signal, CoordinatorConfig, Result};
use crate::coordinator::http::{create_router, CoordState};
use crate::coordinator::service::Coordinator;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

pub struct CoordinatorServer {
    config: CoordinatorConfig,
}

impl CoordinatorServer {
    pub fn new(config: CoordinatorConfig) -> Self {
        Self { config }
    }

    /// Bind the configured address and serve until Ctrl-C
    pub async fn serve(self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve_with(listener, shutdown_signal()).await
    }

    /// Serve on an already-bound listener until `shutdown` resolves
    pub async fn serve_with<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tracing::info!("Starting coordinator");
        tracing::info!("  HTTP API: {}", listener.local_addr()?);
        tracing::info!("  Metadata: {}", self.config.metadata_path.display());
        tracing::info!("  Replicas: {}", self.config.replication_factor);
        tracing::info!(
            "  Heartbeat timeout: {}s",
            self.config.heartbeat_timeout_secs
        );
        tracing::info!("  Placement: {:?}", self.config.placement);

        let coordinator = Arc::new(Coordinator::from_config(&self.config)?);
        let router = create_router(CoordState::new(coordinator.clone()));

        tracing::info!(
            "✓ Coordinator ready ({} files known)",
            coordinator.metadata().len()
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .inspect_err(|e| tracing::error!("HTTP server error: {}", e))?;

        tracing::info!("Coordinator stopped");
        Ok(())
    }
}
