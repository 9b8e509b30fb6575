//! Proxy routes.
//!
//! Node calls can block on the remote feed, so they run on the blocking pool.

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{parse_param, ApiError, AppState};
use crate::events::EventRecord;
use crate::node::{CallReceipt, NodeStatus};
use crate::oracle::OracleReading;
use crate::tx::SignedCall;
use crate::types::{Address, QueryId};

const DEFAULT_EVENTS_LIMIT: usize = 100;
const MAX_EVENTS_LIMIT: usize = 1000;

/// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

/// GET /metrics - Prometheus text format
pub async fn metrics() -> impl IntoResponse {
    let headers = [(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; version=0.0.4"),
    )];
    (headers, crate::metrics::render())
}

/// GET /status
pub async fn status(State(state): State<AppState>) -> Json<NodeStatus> {
    Json(state.node.status())
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GuardiansResponse {
    pub count: usize,
    pub guardians: Vec<Address>,
}

/// GET /guardians
pub async fn guardians(State(state): State<AppState>) -> Json<GuardiansResponse> {
    let guardians = state.node.guardians();
    Json(GuardiansResponse {
        count: guardians.len(),
        guardians,
    })
}

/// GET /guardians/:address
pub async fn guardian(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let address: Address = parse_param("address", &raw)?;
    Ok(Json(json!({
        "address": address,
        "is_guardian": state.node.is_guardian(&address),
    })))
}

/// GET /nonce/:address - next nonce the address must sign with
pub async fn nonce(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let address: Address = parse_param("address", &raw)?;
    let nonce = state.node.nonce(&address)?;
    Ok(Json(json!({ "address": address, "nonce": nonce })))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReadResponse {
    pub query_id: QueryId,
    pub found: bool,
    #[serde(flatten)]
    pub reading: OracleReading,
}

/// GET /oracle/value/:query_id
pub async fn read_value(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Json<ReadResponse>, ApiError> {
    let query_id: QueryId = parse_param("query id", &raw)?;
    let node = state.node.clone();
    let reading = tokio::task::spawn_blocking(move || node.read_value(&query_id)).await??;
    Ok(Json(ReadResponse {
        query_id,
        found: reading.is_found(),
        reading,
    }))
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub from: Option<u64>,
    pub limit: Option<usize>,
}

/// GET /events?from=&limit=
pub async fn events(
    State(state): State<AppState>,
    Query(q): Query<EventsQuery>,
) -> Result<Json<Vec<EventRecord>>, ApiError> {
    let limit = q.limit.unwrap_or(DEFAULT_EVENTS_LIMIT).min(MAX_EVENTS_LIMIT);
    Ok(Json(state.node.events(q.from.unwrap_or(0), limit)?))
}

/// POST /call - signed envelope
pub async fn call(
    State(state): State<AppState>,
    Json(envelope): Json<SignedCall>,
) -> Result<Json<CallReceipt>, ApiError> {
    let node = state.node.clone();
    let receipt = tokio::task::spawn_blocking(move || node.submit(&envelope)).await??;
    Ok(Json(receipt))
}
