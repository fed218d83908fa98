//! Coordinator binary

use clap::{Parser, Subcommand};
use minidfs::common::{parse_duration, whole_seconds, Config, PlacementKind};
use minidfs::CoordinatorServer;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "minidfs-coord")]
#[command(about = "minidfs coordinator: block placement, worker liveness, file metadata")]
#[command(version)]
struct Cli {
    /// Config file (missing file is fine)
    #[arg(long, global = true, default_value = minidfs::common::config::DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start coordinator server
    Serve {
        /// Bind address for HTTP
        #[arg(long)]
        bind: Option<SocketAddr>,

        /// Metadata snapshot path
        #[arg(long)]
        metadata: Option<PathBuf>,

        /// Replication factor
        #[arg(long)]
        replicas: Option<usize>,

        /// Heartbeat timeout in whole seconds (e.g. 30s, 1m)
        #[arg(long, value_parser = parse_duration)]
        heartbeat_timeout: Option<std::time::Duration>,

        /// Replica placement: first_n or round_robin
        #[arg(long)]
        placement: Option<PlacementKind>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    // Load config from file, then override with CLI arguments
    let config = Config::load_from(&cli.config)?;

    let log_level = cli.log_level.unwrap_or(config.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Serve {
            bind,
            metadata,
            replicas,
            heartbeat_timeout,
            placement,
        } => {
            let mut coord_config = config.coordinator.unwrap_or_default();
            if let Some(bind) = bind {
                coord_config.bind_addr = bind;
            }
            if let Some(metadata) = metadata {
                coord_config.metadata_path = metadata;
            }
            if let Some(replicas) = replicas {
                coord_config.replication_factor = replicas;
            }
            if let Some(timeout) = heartbeat_timeout {
                coord_config.heartbeat_timeout_secs =
                    whole_seconds("heartbeat timeout", timeout)?;
            }
            if let Some(placement) = placement {
                coord_config.placement = placement;
            }
            coord_config.validate()?;

            CoordinatorServer::new(coord_config).serve().await?;
        }
    }

    Ok(())
}
