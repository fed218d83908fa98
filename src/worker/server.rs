//! Worker server

use crate::client::CoordinatorClient;
use crate::common::{retry_with_backoff, shutdown_signal, Result, WorkerConfig};
use crate::worker::heartbeat::{HeartbeatTask, Registration};
use crate::worker::http::{create_router, BlockApiState};
use crate::worker::store::BlockStore;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

const REGISTER_ATTEMPTS: usize = 5;
const REGISTER_BACKOFF: Duration = Duration::from_millis(500);
const COORDINATOR_TIMEOUT: Duration = Duration::from_secs(3);

pub struct WorkerServer {
    config: WorkerConfig,
}

impl WorkerServer {
    pub fn new(config: WorkerConfig) -> Self {
        Self { config }
    }

    /// Bind the configured address and serve until Ctrl-C
    pub async fn serve(self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve_with(listener, shutdown_signal()).await
    }

    /// Serve on an already-bound listener until `shutdown` resolves.
    ///
    /// The advertised port is the listener's actual port, so binding to
    /// port 0 works.
    pub async fn serve_with<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.config.validate()?;
        let local_addr = listener.local_addr()?;
        let registration = Registration {
            worker_id: self.config.worker_id.clone(),
            host: self.config.advertise_host.clone(),
            port: local_addr.port(),
        };

        tracing::info!("Starting worker: {}", registration.worker_id);
        tracing::info!("  HTTP API: {}", local_addr);
        tracing::info!(
            "  Advertised as: {}:{}",
            registration.host,
            registration.port
        );
        tracing::info!("  Coordinator: {}", self.config.coordinator_url);
        tracing::info!("  Data dir: {}", self.config.data_dir.display());

        let store = Arc::new(BlockStore::open(&self.config.data_dir).await?);
        let router = create_router(
            BlockApiState {
                store,
                worker_id: registration.worker_id.clone(),
            },
            self.config.max_block_size,
        );

        let client = CoordinatorClient::new(&self.config.coordinator_url, COORDINATOR_TIMEOUT)?;
        let registered = retry_with_backoff(
            || client.register(&registration.worker_id, &registration.host, registration.port),
            REGISTER_ATTEMPTS,
            REGISTER_BACKOFF,
        )
        .await;
        match registered {
            Ok(()) => tracing::info!("✓ Registered with coordinator as {}", registration.worker_id),
            // Heartbeats re-register once the coordinator answers
            Err(e) => tracing::error!("Registration with coordinator failed: {}", e),
        }

        let heartbeat =
            HeartbeatTask::new(client, registration, self.config.heartbeat_interval()).start();

        tracing::info!("✓ Worker ready");
        let served = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await;

        heartbeat.stop().await;
        served.inspect_err(|e| tracing::error!("HTTP server error: {}", e))?;

        tracing::info!("Worker stopped");
        Ok(())
    }
}
