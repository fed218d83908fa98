//! Worker binary

use clap::{Parser, Subcommand};
use minidfs::common::{parse_duration, whole_seconds, Config};
use minidfs::WorkerServer;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "minidfs-worker")]
#[command(about = "minidfs storage worker: keeps blocks on local disk")]
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
    /// Start worker server
    Serve {
        /// Worker ID (unique in the cluster)
        #[arg(long)]
        id: Option<String>,

        /// Bind address for the block API
        #[arg(long)]
        bind: Option<SocketAddr>,

        /// Host clients and the coordinator use to reach this worker
        #[arg(long)]
        advertise_host: Option<String>,

        /// Coordinator base URL
        #[arg(long)]
        coordinator: Option<String>,

        /// Block directory
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Heartbeat interval in whole seconds (e.g. 5s)
        #[arg(long, value_parser = parse_duration)]
        heartbeat_interval: Option<std::time::Duration>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
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
            id,
            bind,
            advertise_host,
            coordinator,
            data_dir,
            heartbeat_interval,
        } => {
            let mut worker_config = config.worker.unwrap_or_default();
            if let Some(id) = id {
                worker_config.worker_id = id;
            }
            if let Some(bind) = bind {
                worker_config.bind_addr = bind;
            }
            if let Some(host) = advertise_host {
                worker_config.advertise_host = host;
            }
            if let Some(url) = coordinator {
                worker_config.coordinator_url = url;
            }
            if let Some(dir) = data_dir {
                worker_config.data_dir = dir;
            }
            if let Some(interval) = heartbeat_interval {
                worker_config.heartbeat_interval_secs =
                    whole_seconds("heartbeat interval", interval)?;
            }
            worker_config.validate()?;

            WorkerServer::new(worker_config).serve().await?;
        }
    }

    Ok(())
}
