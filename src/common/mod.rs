//! Common utilities and types shared across minidfs

pub mod config;
pub mod error;
pub mod metrics;
pub mod tracing_middleware;
pub mod utils;

pub use config::{ClientConfig, Config, CoordinatorConfig, PlacementKind, WorkerConfig};
pub use error::{Error, Result};
pub use metrics::CoordinatorMetrics;
pub use utils::{
    format_bytes, parse_duration, retry_with_backoff, shutdown_signal, timestamp_now_millis,
    validate_block_id, validate_file_name, whole_seconds, WorkerState,
};
