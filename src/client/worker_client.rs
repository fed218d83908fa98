//! HTTP client for the worker block API

use crate::client::coordinator_client::{build_http_client, decode, error_from_response};
use crate::common::Result;
use bytes::Bytes;
use serde_json::Value;
use std::time::Duration;

/// Talks to any worker; the base URL is passed per call since replica
/// addresses come from allocations.
#[derive(Clone)]
pub struct WorkerClient {
    http: reqwest::Client,
}

impl WorkerClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: build_http_client(timeout)?,
        })
    }

    fn url(base_url: &str, path: &str) -> String {
        format!("{}{}", base_url.trim_end_matches('/'), path)
    }

    pub async fn store_block(&self, base_url: &str, block_id: &str, data: Bytes) -> Result<()> {
        let response = self
            .http
            .post(Self::url(base_url, "/store_block"))
            .query(&[("block_id", block_id)])
            .body(data)
            .send()
            .await?;
        decode::<Value>(response).await.map(|_| ())
    }

    pub async fn read_block(&self, base_url: &str, block_id: &str) -> Result<Bytes> {
        let response = self
            .http
            .get(Self::url(base_url, "/read_block"))
            .query(&[("block_id", block_id)])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(response.bytes().await?)
    }

    pub async fn delete_block(&self, base_url: &str, block_id: &str) -> Result<()> {
        let response = self
            .http
            .delete(Self::url(base_url, "/delete_block"))
            .query(&[("block_id", block_id)])
            .send()
            .await?;
        decode::<Value>(response).await.map(|_| ())
    }
}
