//! Client side: coordinator/worker HTTP clients and the transfer driver

pub mod coordinator_client;
pub mod dfs;
pub mod splitter;
pub mod worker_client;

pub use coordinator_client::CoordinatorClient;
pub use dfs::{DeleteReport, DfsClient, DownloadReport, UploadReport};
pub use worker_client::WorkerClient;
