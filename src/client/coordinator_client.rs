//! HTTP client for the coordinator API
//!
//! Shared by the client CLI and by workers (registration and heartbeats).

use crate::common::{Error, Result};
use crate::coordinator::metadata::BlockDescriptor;
use crate::coordinator::registry::WorkerInfo;
use crate::coordinator::service::{Allocation, AllocationRequest};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    #[serde(default)]
    message: String,
}

/// Turn a non-2xx response into a typed error.
///
/// `{error, message}` bodies keep their code; anything else is a transport
/// failure carrying the status line.
pub(crate) async fn error_from_response(response: reqwest::Response) -> Error {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();

    match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => Error::from_code(&body.error, body.message),
        Err(_) if status == reqwest::StatusCode::NOT_FOUND => Error::NotFound(text),
        Err(_) => Error::Transport(format!("HTTP {}: {}", status, text)),
    }
}

pub(crate) async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    if !response.status().is_success() {
        return Err(error_from_response(response).await);
    }
    Ok(response.json::<T>().await?)
}

pub(crate) fn build_http_client(timeout: Duration) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

#[derive(Debug, Deserialize)]
struct FileBlocksResponse {
    blocks: Vec<BlockDescriptor>,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    message: String,
}

#[derive(Clone)]
pub struct CoordinatorClient {
    http: reqwest::Client,
    base_url: String,
}

impl CoordinatorClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: build_http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn register(&self, worker_id: &str, host: &str, port: u16) -> Result<()> {
        let response = self
            .http
            .post(self.url("/register"))
            .json(&json!({ "node_id": worker_id, "ip": host, "port": port }))
            .send()
            .await?;
        decode::<Value>(response).await.map(|_| ())
    }

    pub async fn heartbeat(&self, worker_id: &str) -> Result<()> {
        let response = self
            .http
            .post(self.url("/heartbeat"))
            .json(&json!({ "node_id": worker_id }))
            .send()
            .await?;
        decode::<Value>(response).await.map(|_| ())
    }

    pub async fn allocate(&self, file_name: &str, request: AllocationRequest) -> Result<Allocation> {
        let body = match request {
            AllocationRequest::Blocks { block_count } => {
                json!({ "file_name": file_name, "num_blocks": block_count })
            }
            AllocationRequest::Sized {
                file_size,
                block_size,
            } => json!({
                "file_name": file_name,
                "file_size": file_size,
                "block_size": block_size,
            }),
        };

        let response = self
            .http
            .post(self.url("/allocate_blocks"))
            .json(&body)
            .send()
            .await?;
        decode(response).await
    }

    pub async fn list_files(&self) -> Result<Vec<String>> {
        let response = self.http.get(self.url("/files")).send().await?;
        decode(response).await
    }

    pub async fn get_file_blocks(&self, file_name: &str) -> Result<Vec<BlockDescriptor>> {
        let response = self
            .http
            .get(self.url("/get_file_blocks"))
            .query(&[("file_name", file_name)])
            .send()
            .await?;
        let body: FileBlocksResponse = decode(response).await?;
        Ok(body.blocks)
    }

    /// Remove the file record; returns the coordinator's message
    pub async fn remove_file(&self, file_name: &str) -> Result<String> {
        let response = self
            .http
            .post(self.url("/delete_file"))
            .json(&json!({ "file_name": file_name }))
            .send()
            .await?;
        let body: MessageResponse = decode(response).await?;
        Ok(body.message)
    }

    pub async fn workers(&self) -> Result<Vec<WorkerInfo>> {
        let response = self.http.get(self.url("/workers")).send().await?;
        decode(response).await
    }

    pub async fn health(&self) -> Result<Value> {
        let response = self.http.get(self.url("/health")).send().await?;
        decode(response).await
    }
}
