//! HTTP API for a storage worker
//!
//! Block contract:
//! - `POST /store_block?block_id=` with the raw block as body
//! - `GET /read_block?block_id=` returns the raw bytes
//! - `DELETE /delete_block?block_id=` (missing blocks are acknowledged)

use crate::common::tracing_middleware::request_tracing_middleware;
use crate::common::{Error, Result};
use crate::worker::store::BlockStore;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Query, State},
    http::header,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Shared worker state for HTTP handlers.
#[derive(Clone)]
pub struct BlockApiState {
    pub store: Arc<BlockStore>,
    pub worker_id: String,
}

pub fn create_router(state: BlockApiState, max_block_size: usize) -> Router {
    Router::new()
        .route("/store_block", post(store_block))
        .route("/read_block", get(read_block))
        .route("/delete_block", delete(delete_block))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_block_size))
        .layer(axum::middleware::from_fn(request_tracing_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct BlockQuery {
    block_id: Option<String>,
}

impl BlockQuery {
    fn block_id(self) -> Result<String> {
        self.block_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::MissingField("block_id".into()))
    }
}

async fn store_block(
    State(state): State<BlockApiState>,
    Query(query): Query<BlockQuery>,
    body: Bytes,
) -> Result<Json<Value>> {
    let block_id = query.block_id()?;
    state.store.save(&block_id, &body).await?;
    tracing::info!("Block {} stored ({} bytes)", block_id, body.len());
    Ok(Json(json!({ "status": "success" })))
}

async fn read_block(
    State(state): State<BlockApiState>,
    Query(query): Query<BlockQuery>,
) -> Result<impl IntoResponse> {
    let block_id = query.block_id()?;
    let data = state
        .store
        .read(&block_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("block {}", block_id)))?;

    Ok(([(header::CONTENT_TYPE, "application/octet-stream")], data))
}

async fn delete_block(
    State(state): State<BlockApiState>,
    Query(query): Query<BlockQuery>,
) -> Result<Json<Value>> {
    let block_id = query.block_id()?;
    let existed = state.store.delete(&block_id).await?;
    let status = if existed {
        format!("Block {} deleted.", block_id)
    } else {
        format!("Block {} did not exist.", block_id)
    };
    Ok(Json(json!({ "status": status })))
}

async fn health(State(state): State<BlockApiState>) -> Result<Json<Value>> {
    let stats = state.store.stats().await?;
    Ok(Json(json!({
        "status": "healthy",
        "worker_id": state.worker_id,
        "version": env!("CARGO_PKG_VERSION"),
        "blocks": stats.blocks,
        "bytes": stats.bytes,
    })))
}
