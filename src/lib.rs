//! # minidfs
//!
//! A small master/worker block store:
//! - One coordinator maps file names to ordered block lists and decides
//!   where each block's replicas live
//! - Workers keep blocks on local disk and heartbeat to the coordinator
//! - Clients split files into blocks and move the bytes straight to and
//!   from workers; the coordinator never sees block data
//!
//! ## Architecture

#![allow(clippy::result_large_err)]
//!
//! ```text
//!                 ┌──────────────────────────────┐
//!   allocate /    │         Coordinator          │
//!   get blocks    │  registry · placement ·      │
//!  ┌─────────────►│  metadata (JSON snapshot)    │◄────────┐
//!  │              └──────────────────────────────┘         │
//!  │                                         register /    │
//! ┌┴───────┐     store / read / delete block heartbeat     │
//! │ Client ├──────────────┬──────────────┬─────────────────┤
//! └────────┘              │              │                 │
//!                  ┌──────▼─────┐ ┌──────▼─────┐ ┌─────────┴──┐
//!                  │  Worker 1  │ │  Worker 2  │ │  Worker 3  │
//!                  │  *.block   │ │  *.block   │ │  *.block   │
//!                  └────────────┘ └────────────┘ └────────────┘
//! ```
//!
//! ## Usage
//!
//! ### Start a coordinator
//! ```bash
//! minidfs-coord serve \
//!   --bind 0.0.0.0:8000 \
//!   --metadata ./metadata/files_metadata.json \
//!   --replicas 2
//! ```
//!
//! ### Start a worker
//! ```bash
//! minidfs-worker serve \
//!   --id worker-1 \
//!   --bind 0.0.0.0:5001 \
//!   --data-dir ./data/worker-1 \
//!   --coordinator http://127.0.0.1:8000
//! ```
//!
//! ### Use the CLI
//! ```bash
//! minidfs upload ./report.pdf
//! minidfs download report.pdf --output ./copy.pdf
//! minidfs list
//! minidfs delete report.pdf
//! minidfs workers
//! ```

pub mod client;
pub mod common;
pub mod coordinator;
pub mod worker;

// Re-export commonly used types
pub use client::DfsClient;
pub use common::{Config, Error, Result};
pub use coordinator::{Coordinator, CoordinatorServer};
pub use worker::WorkerServer;

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build info
pub const BUILD_INFO: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("CARGO_PKG_NAME"), ")");
