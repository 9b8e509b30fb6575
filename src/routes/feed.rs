//! Development feed routes.

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::{Deserialize, Serialize};

use super::{parse_param, ApiError, AppState};
use crate::oracle::http::DataBeforeView;
use crate::oracle::playground::FeedPlayground;
use crate::types::{Bytes, QueryId};

fn feed(state: &AppState) -> Result<&FeedPlayground, ApiError> {
    state
        .feed
        .as_ref()
        .ok_or_else(|| ApiError::not_found("this node does not host a feed"))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub query_id: QueryId,
    pub value: Bytes,
    #[serde(default)]
    pub nonce: u64,
    pub query_data: Bytes,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub query_id: QueryId,
    pub timestamp: u64,
    pub index: usize,
}

/// POST /feed/submit
pub async fn submit(
    State(state): State<AppState>,
    Json(req): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let feed = feed(&state)?;
    let timestamp = feed.submit_value(req.query_id, req.value, req.nonce, req.query_data.as_slice())?;
    Ok(Json(SubmitResponse {
        query_id: req.query_id,
        timestamp,
        index: feed.new_value_count(&req.query_id).saturating_sub(1),
    }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DisputeRequest {
    pub query_id: QueryId,
    pub timestamp: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DisputeResponse {
    pub query_id: QueryId,
    pub timestamp: u64,
    pub dispute_count: u64,
}

/// POST /feed/dispute
pub async fn dispute(
    State(state): State<AppState>,
    Json(req): Json<DisputeRequest>,
) -> Result<Json<DisputeResponse>, ApiError> {
    let feed = feed(&state)?;
    feed.begin_dispute(req.query_id, req.timestamp)?;
    Ok(Json(DisputeResponse {
        query_id: req.query_id,
        timestamp: req.timestamp,
        dispute_count: feed.dispute_count(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct DataBeforeQuery {
    pub timestamp: u64,
}

/// GET /feed/data-before/:query_id?timestamp=N
///
/// Raw feed view with no safety delay; this is what [`crate::oracle::http::HttpOracle`]
/// talks to.
pub async fn data_before(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    Query(q): Query<DataBeforeQuery>,
) -> Result<Json<DataBeforeView>, ApiError> {
    let query_id: QueryId = parse_param("query id", &raw)?;
    let feed = feed(&state)?;
    Ok(Json(feed.data_before(&query_id, q.timestamp).into()))
}
