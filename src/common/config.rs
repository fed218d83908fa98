//! Configuration for minidfs components

use crate::common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file looked up by `Config::load`
pub const DEFAULT_CONFIG_FILE: &str = "minidfs.toml";

/// Prefix for environment overrides, e.g. `MINIDFS__COORDINATOR__REPLICATION_FACTOR=3`
pub const ENV_PREFIX: &str = "MINIDFS";

/// Global configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Coordinator-specific config
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinator: Option<CoordinatorConfig>,

    /// Worker-specific config
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker: Option<WorkerConfig>,

    /// Client-specific config
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<ClientConfig>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            coordinator: None,
            worker: None,
            client: None,
        }
    }
}

/// Which replica selector the placement manager uses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementKind {
    /// First `n` active workers in registration order
    #[default]
    FirstN,
    /// Rotating start offset, advanced once per block
    RoundRobin,
}

impl std::str::FromStr for PlacementKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "first_n" | "first-n" => Ok(PlacementKind::FirstN),
            "round_robin" | "round-robin" => Ok(PlacementKind::RoundRobin),
            other => Err(Error::InvalidConfig(format!(
                "unknown placement strategy: {}",
                other
            ))),
        }
    }
}

/// Coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Bind address for the HTTP API
    #[serde(default = "default_coord_bind")]
    pub bind_addr: SocketAddr,

    /// JSON snapshot of all file records
    #[serde(default = "default_metadata_path")]
    pub metadata_path: PathBuf,

    /// Target replica count per block
    #[serde(default = "default_replication_factor")]
    pub replication_factor: usize,

    /// Seconds without a heartbeat before a worker is demoted
    #[serde(default = "default_heartbeat_timeout")]
    pub heartbeat_timeout_secs: u64,

    #[serde(default)]
    pub placement: PlacementKind,
}

fn default_coord_bind() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8000))
}
fn default_metadata_path() -> PathBuf {
    PathBuf::from("metadata/files_metadata.json")
}
fn default_replication_factor() -> usize {
    2
}
fn default_heartbeat_timeout() -> u64 {
    30
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_coord_bind(),
            metadata_path: default_metadata_path(),
            replication_factor: default_replication_factor(),
            heartbeat_timeout_secs: default_heartbeat_timeout(),
            placement: PlacementKind::default(),
        }
    }
}

impl CoordinatorConfig {
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.replication_factor == 0 {
            return Err(Error::InvalidConfig(
                "replication_factor must be at least 1".into(),
            ));
        }
        if self.heartbeat_timeout_secs == 0 {
            return Err(Error::InvalidConfig(
                "heartbeat_timeout_secs must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Storage worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Cluster-unique worker id
    pub worker_id: String,

    /// Bind address for the block API
    #[serde(default = "default_worker_bind")]
    pub bind_addr: SocketAddr,

    /// Host advertised to the coordinator (clients connect here)
    #[serde(default = "default_advertise_host")]
    pub advertise_host: String,

    /// Coordinator base URL
    #[serde(default = "default_coordinator_url")]
    pub coordinator_url: String,

    /// Directory holding `<block_id>.block` files
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,

    /// Largest block accepted by `store_block`
    #[serde(default = "default_max_block_size")]
    pub max_block_size: usize,
}

fn default_worker_bind() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 5001))
}
fn default_advertise_host() -> String {
    "127.0.0.1".to_string()
}
fn default_coordinator_url() -> String {
    "http://127.0.0.1:8000".to_string()
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_heartbeat_interval() -> u64 {
    5
}
fn default_max_block_size() -> usize {
    64 * 1024 * 1024
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: "worker-1".to_string(),
            bind_addr: default_worker_bind(),
            advertise_host: default_advertise_host(),
            coordinator_url: default_coordinator_url(),
            data_dir: default_data_dir(),
            heartbeat_interval_secs: default_heartbeat_interval(),
            max_block_size: default_max_block_size(),
        }
    }
}

impl WorkerConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    /// Port advertised to the coordinator
    pub fn advertise_port(&self) -> u16 {
        self.bind_addr.port()
    }

    pub fn validate(&self) -> Result<()> {
        if self.worker_id.trim().is_empty() {
            return Err(Error::InvalidConfig("worker_id cannot be empty".into()));
        }
        if self.heartbeat_interval_secs == 0 {
            return Err(Error::InvalidConfig(
                "heartbeat_interval_secs must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_coordinator_url")]
    pub coordinator_url: String,

    /// Bytes per block when splitting files
    #[serde(default = "default_block_size")]
    pub block_size: usize,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_block_size() -> usize {
    1024 * 1024
}
fn default_request_timeout() -> u64 {
    3
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            coordinator_url: default_coordinator_url(),
            block_size: default_block_size(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl ClientConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(Error::InvalidConfig("block_size must be positive".into()));
        }
        Ok(())
    }
}

impl Config {
    /// Load `minidfs.toml` (if present) layered with `MINIDFS__*` env vars
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let cfg: Config = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(coord) = &self.coordinator {
            coord.validate()?;
        }
        if let Some(worker) = &self.worker {
            worker.validate()?;
        }
        if let Some(client) = &self.client {
            client.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let coord = CoordinatorConfig::default();
        assert_eq!(coord.replication_factor, 2);
        assert_eq!(coord.heartbeat_timeout(), Duration::from_secs(30));
        assert_eq!(coord.placement, PlacementKind::FirstN);
        assert_eq!(ClientConfig::default().block_size, 1024 * 1024);
        assert_eq!(WorkerConfig::default().heartbeat_interval_secs, 5);
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let cfg = Config::load_from(dir.path().join("nope.toml")).unwrap();
        assert!(cfg.coordinator.is_none());
        assert!(cfg.worker.is_none());
    }

    #[test]
    fn test_load_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("minidfs.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
log_level = "debug"

[coordinator]
bind_addr = "127.0.0.1:9000"
replication_factor = 3
placement = "round_robin"
"#
        )
        .unwrap();

        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg.log_level, "debug");
        let coord = cfg.coordinator.unwrap();
        assert_eq!(coord.bind_addr.port(), 9000);
        assert_eq!(coord.replication_factor, 3);
        assert_eq!(coord.placement, PlacementKind::RoundRobin);
        assert_eq!(coord.heartbeat_timeout_secs, 30);
    }

    #[test]
    fn test_validate_rejects_zero_replicas() {
        let coord = CoordinatorConfig {
            replication_factor: 0,
            ..Default::default()
        };
        assert!(coord.validate().is_err());

        let client = ClientConfig {
            block_size: 0,
            ..Default::default()
        };
        assert!(client.validate().is_err());
    }

    #[test]
    fn test_placement_kind_from_str() {
        assert_eq!(
            "round-robin".parse::<PlacementKind>().unwrap(),
            PlacementKind::RoundRobin
        );
        assert!("random".parse::<PlacementKind>().is_err());
    }
}
