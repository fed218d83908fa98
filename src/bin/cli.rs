//! CLI for file operations

use clap::{Parser, Subcommand};
use minidfs::common::{format_bytes, Config};
use minidfs::DfsClient;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "minidfs")]
#[command(about = "minidfs client: upload, download, list and delete files")]
#[command(version)]
struct Cli {
    /// Coordinator URL
    #[arg(long)]
    coordinator: Option<String>,

    /// Block size in bytes for uploads
    #[arg(long)]
    block_size: Option<usize>,

    /// Config file (missing file is fine)
    #[arg(long, default_value = minidfs::common::config::DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a local file
    Upload {
        /// File path
        path: PathBuf,
    },

    /// Download a file
    Download {
        /// File name as stored
        name: String,

        /// Output file
        #[arg(long)]
        output: PathBuf,
    },

    /// List stored files
    List,

    /// Delete a file and its blocks
    Delete {
        /// File name as stored
        name: String,
    },

    /// Show registered workers
    Workers,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load_from(&cli.config)?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut client_config = config.client.unwrap_or_default();
    if let Some(url) = cli.coordinator {
        client_config.coordinator_url = url;
    }
    if let Some(block_size) = cli.block_size {
        client_config.block_size = block_size;
    }
    let client = DfsClient::from_config(&client_config)?;

    match cli.command {
        Commands::Upload { path } => {
            let report = client.upload(&path).await?;
            println!(
                "Uploaded '{}': {} blocks, {}, {} replica writes",
                report.file_name,
                report.blocks,
                format_bytes(report.bytes),
                report.replicas_written
            );
            if let Some(d) = report.degraded {
                println!(
                    "  warning: degraded, {} of {} replicas available",
                    d.available, d.needed
                );
            }
        }

        Commands::Download { name, output } => {
            let report = client.download(&name, &output).await?;
            println!(
                "Downloaded '{}' to {} ({} blocks, {})",
                report.file_name,
                output.display(),
                report.blocks,
                format_bytes(report.bytes)
            );
        }

        Commands::List => {
            let files = client.list().await?;
            if files.is_empty() {
                println!("No files stored yet.");
            } else {
                println!("Files:");
                for name in files {
                    println!("  - {}", name);
                }
            }
        }

        Commands::Delete { name } => {
            let report = client.delete(&name).await?;
            println!("{}", report.message);
            if report.orphaned_replicas > 0 {
                println!(
                    "  warning: {} block replicas could not be deleted",
                    report.orphaned_replicas
                );
            }
        }

        Commands::Workers => {
            let workers = client.workers().await?;
            if workers.is_empty() {
                println!("No workers registered.");
            }
            for w in workers {
                println!(
                    "{:<20} {:<24} {:<8} last heartbeat {} ms",
                    w.worker_id,
                    w.address.to_string(),
                    w.state.to_string(),
                    w.last_heartbeat_ms
                );
            }
        }
    }

    Ok(())
}
