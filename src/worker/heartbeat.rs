//! Periodic heartbeat sender
//!
//! Runs as a tokio task until [`HeartbeatHandle::stop`] is called. Shutdown
//! is checked before every tick and raced against the request in flight
//! (`biased` select), so once stop has been observed no further heartbeat
//! leaves the worker and a hung coordinator cannot delay `stop`. If the
//! coordinator answers `unknown_worker` (it restarted and lost its
//! registry), the task re-registers.

use crate::client::CoordinatorClient;
use crate::common::Error;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// What the worker announces to the coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub worker_id: String,
    pub host: String,
    pub port: u16,
}

pub struct HeartbeatTask {
    client: CoordinatorClient,
    registration: Registration,
    interval: Duration,
}

/// Handle to a running heartbeat task
pub struct HeartbeatHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
    beats: Arc<AtomicU64>,
}

impl HeartbeatHandle {
    /// Heartbeats acknowledged by the coordinator so far
    pub fn beats_sent(&self) -> u64 {
        self.beats.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Signal shutdown and wait for the task to exit
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::error!("Heartbeat task panicked: {}", e);
        }
    }
}

impl HeartbeatTask {
    pub fn new(client: CoordinatorClient, registration: Registration, interval: Duration) -> Self {
        Self {
            client,
            registration,
            interval,
        }
    }

    pub fn start(self) -> HeartbeatHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let beats = Arc::new(AtomicU64::new(0));

        let task = tokio::spawn(self.run(shutdown_rx, beats.clone()));
        tracing::info!("Heartbeat task started");

        HeartbeatHandle {
            shutdown: shutdown_tx,
            task,
            beats,
        }
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>, beats: Arc<AtomicU64>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Registration already refreshed liveness; skip the immediate tick.
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;
                // Also fires when the handle is dropped without stop()
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {}
            }
            if *shutdown.borrow() {
                break;
            }

            // Dropping the in-flight request aborts it
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                ok = self.beat() => {
                    if ok {
                        beats.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        }

        tracing::info!("Heartbeat task stopped");
    }

    async fn beat(&self) -> bool {
        let worker_id = &self.registration.worker_id;
        match self.client.heartbeat(worker_id).await {
            Ok(()) => {
                tracing::debug!("Heartbeat sent from worker {}", worker_id);
                true
            }
            Err(Error::UnknownWorker(_)) => {
                tracing::warn!(
                    "Coordinator does not know worker {}, re-registering",
                    worker_id
                );
                let Registration { host, port, .. } = &self.registration;
                match self.client.register(worker_id, host, *port).await {
                    Ok(()) => {
                        tracing::info!("Worker {} re-registered", worker_id);
                        true
                    }
                    Err(e) => {
                        tracing::warn!("Re-registration of {} failed: {}", worker_id, e);
                        false
                    }
                }
            }
            Err(e) => {
                tracing::warn!("Heartbeat from {} failed: {}", worker_id, e);
                false
            }
        }
    }
}
