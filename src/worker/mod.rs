//! Storage worker
//!
//! Holds blocks on local disk and serves them over HTTP. A worker knows
//! nothing about files: it stores, returns, and deletes opaque blocks by id,
//! and keeps itself visible to the coordinator with periodic heartbeats.

pub mod heartbeat;
pub mod http;
pub mod server;
pub mod store;

pub use heartbeat::{HeartbeatHandle, HeartbeatTask, Registration};
pub use server::WorkerServer;
pub use store::BlockStore;
