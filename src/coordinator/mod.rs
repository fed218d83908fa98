//! Coordinator: the single metadata authority of a cluster
//!
//! The coordinator is responsible for:
//! - Worker registration and heartbeat-driven liveness
//! - Placement decisions (which workers hold each block)
//! - The durable file name → block list mapping
//!
//! It never touches block bytes; clients move data to and from workers
//! directly.

pub mod http;
pub mod metadata;
pub mod placement;
pub mod registry;
pub mod server;
pub mod service;

pub use server::CoordinatorServer;
pub use service::{Allocation, AllocationRequest, Coordinator};
