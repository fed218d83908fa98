//! HTTP API for the coordinator
//!
//! JSON in, JSON out. Every failure is rendered by [`Error`]'s
//! `IntoResponse` as `{error, message}` with the matching status.
//!
//! Routes:
//! - `POST /register`, `POST /heartbeat`: worker control plane
//! - `POST /allocate_blocks` (alias `/assign_blocks`), `GET /files`,
//!   `GET /get_file_blocks`, `POST /delete_file`: file metadata
//! - `GET /health`, `GET /workers`, `GET /metrics`: introspection

use crate::common::tracing_middleware::request_tracing_middleware;
use crate::common::{Error, Result};
use crate::coordinator::registry::WorkerInfo;
use crate::coordinator::service::{Allocation, AllocationRequest, Coordinator};
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared coordinator state for HTTP handlers.
#[derive(Clone)]
pub struct CoordState {
    pub coordinator: Arc<Coordinator>,
}

impl CoordState {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self { coordinator }
    }
}

pub fn create_router(state: CoordState) -> Router {
    Router::new()
        // Worker control plane
        .route("/register", post(register))
        .route("/heartbeat", post(heartbeat))
        // File metadata
        .route("/allocate_blocks", post(allocate_blocks))
        .route("/assign_blocks", post(allocate_blocks))
        .route("/files", get(list_files))
        .route("/get_file_blocks", get(get_file_blocks))
        .route("/delete_file", post(delete_file))
        // Introspection
        .route("/health", get(health))
        .route("/workers", get(workers))
        .route("/metrics", get(metrics))
        .layer(axum::middleware::from_fn(request_tracing_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================================
// Request parsing
// ============================================================================

/// Decode a JSON body; an empty body reads as `{}` so that missing fields
/// surface as `missing_field` rather than a parse failure.
fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    let body = if body.iter().all(u8::is_ascii_whitespace) {
        b"{}".as_slice()
    } else {
        body
    };
    serde_json::from_slice(body)
        .map_err(|e| Error::InvalidArgument(format!("malformed JSON body: {}", e)))
}

/// Integers arrive as JSON numbers or numeric strings
fn int_field(name: &str, value: Option<&Value>) -> Result<Option<u64>> {
    let invalid = || Error::InvalidArgument(format!("{} must be a positive integer", name));
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n.as_u64().map(Some).ok_or_else(invalid),
        Some(Value::String(s)) => s.trim().parse::<u64>().map(Some).map_err(|_| invalid()),
        Some(_) => Err(invalid()),
    }
}

fn required_str(name: &str, value: Option<String>) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(Error::MissingField(name.to_string())),
    }
}

/// Merge a field that may arrive under either of two keys.
///
/// Sending both is fine as long as they agree.
fn either_key(
    name: &str,
    alias: &str,
    value: Option<String>,
    alias_value: Option<String>,
) -> Result<Option<String>> {
    match (value, alias_value) {
        (Some(a), Some(b)) if a != b => Err(Error::InvalidArgument(format!(
            "'{}' and '{}' disagree: '{}' vs '{}'",
            name, alias, a, b
        ))),
        (Some(a), _) => Ok(Some(a)),
        (None, b) => Ok(b),
    }
}

/// Run blocking metadata work (snapshot rewrite + fsync) off the runtime
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Internal(format!("blocking task failed: {}", e)))?
}

// ============================================================================
// Worker control plane
// ============================================================================

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    node_id: Option<String>,
    worker_id: Option<String>,
    ip: Option<String>,
    host: Option<String>,
    port: Option<Value>,
}

async fn register(State(state): State<CoordState>, body: Bytes) -> Result<Json<Value>> {
    let req: RegisterRequest = parse_body(&body)?;

    let node_id = either_key("node_id", "worker_id", req.node_id, req.worker_id)?;
    let node_id = required_str("node_id", node_id)?;
    let ip = required_str("ip", either_key("ip", "host", req.ip, req.host)?)?;
    let port = int_field("port", req.port.as_ref())?
        .ok_or_else(|| Error::MissingField("port".into()))?;
    let port = u16::try_from(port)
        .map_err(|_| Error::InvalidArgument(format!("port out of range: {}", port)))?;

    state.coordinator.register(&node_id, &ip, port)?;
    Ok(Json(json!({ "status": "registered" })))
}

#[derive(Debug, Deserialize)]
struct HeartbeatRequest {
    node_id: Option<String>,
    worker_id: Option<String>,
}

async fn heartbeat(State(state): State<CoordState>, body: Bytes) -> Result<Json<Value>> {
    let req: HeartbeatRequest = parse_body(&body)?;
    let node_id = either_key("node_id", "worker_id", req.node_id, req.worker_id)?;
    let node_id = required_str("node_id", node_id)?;

    state.coordinator.heartbeat(&node_id)?;
    Ok(Json(json!({ "status": "alive" })))
}

// ============================================================================
// File metadata
// ============================================================================

#[derive(Debug, Deserialize)]
struct AllocateRequest {
    file_name: Option<String>,
    #[serde(alias = "block_count")]
    num_blocks: Option<Value>,
    file_size: Option<Value>,
    block_size: Option<Value>,
}

impl AllocateRequest {
    fn into_parts(self) -> Result<(String, AllocationRequest)> {
        let file_name = required_str("file_name", self.file_name)?;

        let num_blocks = int_field("num_blocks", self.num_blocks.as_ref())?;
        let request = if let Some(block_count) = num_blocks {
            AllocationRequest::Blocks { block_count }
        } else if let Some(file_size) = int_field("file_size", self.file_size.as_ref())? {
            let block_size = int_field("block_size", self.block_size.as_ref())?
                .ok_or_else(|| Error::MissingField("block_size".into()))?;
            AllocationRequest::Sized {
                file_size,
                block_size,
            }
        } else {
            return Err(Error::MissingField("num_blocks".into()));
        };

        Ok((file_name, request))
    }
}

async fn allocate_blocks(
    State(state): State<CoordState>,
    body: Bytes,
) -> Result<Json<Allocation>> {
    let req: AllocateRequest = parse_body(&body)?;
    let (file_name, request) = req.into_parts()?;

    let coordinator = state.coordinator.clone();
    let allocation = blocking(move || coordinator.allocate(&file_name, request)).await?;

    Ok(Json(allocation))
}

async fn list_files(State(state): State<CoordState>) -> Json<Vec<String>> {
    Json(state.coordinator.list_files())
}

#[derive(Debug, Deserialize)]
struct FileQuery {
    file_name: Option<String>,
}

async fn get_file_blocks(
    State(state): State<CoordState>,
    Query(query): Query<FileQuery>,
) -> Result<Json<Value>> {
    let file_name = required_str("file_name", query.file_name)?;
    let blocks = state.coordinator.get_file_blocks(&file_name)?;
    Ok(Json(json!({ "file_name": file_name, "blocks": blocks })))
}

#[derive(Debug, Deserialize)]
struct DeleteFileRequest {
    file_name: Option<String>,
}

async fn delete_file(State(state): State<CoordState>, body: Bytes) -> Result<Json<Value>> {
    let req: DeleteFileRequest = parse_body(&body)?;
    let file_name = required_str("file_name", req.file_name)?;

    let coordinator = state.coordinator.clone();
    let name = file_name.clone();
    blocking(move || coordinator.remove_file(&name)).await?;

    Ok(Json(json!({
        "message": format!("File '{}' metadata removed", file_name)
    })))
}

// ============================================================================
// Introspection
// ============================================================================

async fn health(State(state): State<CoordState>) -> impl IntoResponse {
    let status = state.coordinator.status();
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "workers": status.workers.len(),
        "active_workers": status.active_workers,
        "files": status.files,
        "replication_factor": status.replication_factor,
        "placement": status.placement,
    }))
}

async fn workers(State(state): State<CoordState>) -> Json<Vec<WorkerInfo>> {
    Json(state.coordinator.status().workers)
}

async fn metrics(State(state): State<CoordState>) -> impl IntoResponse {
    let body = state.coordinator.metrics().to_prometheus();
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
}
