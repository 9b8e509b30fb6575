//! HTTP API.
//!
//! - `proxy` - status, guardian lookups, delayed reads and signed calls
//! - `feed` - development feed, mounted only when the node hosts it
//!
//! Every error body is `{"code": ..., "error": ...}` where `code` is the
//! stable reason code.

pub mod feed;
pub mod proxy;

use std::sync::Arc;

use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, warn};

use crate::config::NodeSection;
use crate::error::ProxyError;
use crate::node::{Node, NodeError};
use crate::oracle::playground::{FeedError, FeedPlayground};
use crate::tx::CallError;

/// Shared state for all handlers
#[derive(Clone)]
pub struct AppState {
    pub node: Arc<Node>,
    /// Present when the node hosts the development feed
    pub feed: Option<FeedPlayground>,
}

pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/health", get(proxy::health))
        .route("/metrics", get(proxy::metrics))
        .route("/status", get(proxy::status))
        .route("/guardians", get(proxy::guardians))
        .route("/guardians/:address", get(proxy::guardian))
        .route("/nonce/:address", get(proxy::nonce))
        .route("/oracle/value/:query_id", get(proxy::read_value))
        .route("/events", get(proxy::events))
        .route("/call", post(proxy::call));

    if state.feed.is_some() {
        router = router
            .route("/feed/submit", post(feed::submit))
            .route("/feed/dispute", post(feed::dispute))
            .route("/feed/data-before/:query_id", get(feed::data_before));
    }

    router.with_state(state)
}

/// Add the body limit and CORS policy from `[node]`
pub fn with_layers(router: Router, config: &NodeSection) -> Router {
    router
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .layer(cors_layer(&config.cors_origins))
}

/// Any origin when the list is empty; otherwise only the listed origins.
/// Entries that are not valid header values are skipped.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }
    let mut list: Vec<HeaderValue> = Vec::new();
    for origin in origins {
        match HeaderValue::from_str(origin) {
            Ok(hv) => list.push(hv),
            Err(_) => warn!(target: "oracle_guard::node", "[NODE] skipping bad CORS origin {:?}", origin),
        }
    }
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(list))
        .allow_methods(Any)
        .allow_headers(Any)
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "BadRequest",
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            code: "NotFound",
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "Internal",
            message: message.into(),
        }
    }
}

fn proxy_status(err: &ProxyError) -> StatusCode {
    match err {
        ProxyError::NotAuthorized(_) => StatusCode::FORBIDDEN,
        ProxyError::AlreadyExists(_)
        | ProxyError::NotFound(_)
        | ProxyError::LastGuardian
        | ProxyError::AlreadyHalted
        | ProxyError::AlreadyActive => StatusCode::CONFLICT,
        ProxyError::Halted => StatusCode::SERVICE_UNAVAILABLE,
        ProxyError::UnsupportedCall => StatusCode::BAD_REQUEST,
        ProxyError::OracleUnavailable(_) => StatusCode::BAD_GATEWAY,
    }
}

impl From<NodeError> for ApiError {
    fn from(err: NodeError) -> Self {
        let status = match &err {
            NodeError::Proxy(e) => proxy_status(e),
            NodeError::Call(CallError::NonceMismatch { .. }) => StatusCode::CONFLICT,
            NodeError::Call(CallError::Encoding(_)) => StatusCode::BAD_REQUEST,
            NodeError::Call(_) => StatusCode::UNAUTHORIZED,
            NodeError::Store(_) | NodeError::Endpoint(_) => {
                error!(target: "oracle_guard::node", "[NODE] request failed: {}", err);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self {
            status,
            code: err.code(),
            message: err.to_string(),
        }
    }
}

impl From<FeedError> for ApiError {
    fn from(err: FeedError) -> Self {
        let (status, code) = match &err {
            FeedError::EmptyValue => (StatusCode::BAD_REQUEST, "EmptyValue"),
            FeedError::QueryDataMismatch(_) => (StatusCode::BAD_REQUEST, "QueryDataMismatch"),
            FeedError::BadNonce { .. } => (StatusCode::BAD_REQUEST, "BadNonce"),
            FeedError::DuplicateTimestamp { .. } => (StatusCode::CONFLICT, "DuplicateTimestamp"),
            FeedError::NoValueAtTimestamp { .. } => (StatusCode::NOT_FOUND, "NoValueAtTimestamp"),
        };
        Self {
            status,
            code,
            message: err.to_string(),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::internal(format!("worker task failed: {err}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({ "code": self.code, "error": self.message })),
        )
            .into_response()
    }
}

/// Parse a hex path segment, answering 400 on failure
pub(crate) fn parse_param<T>(what: &str, raw: &str) -> Result<T, ApiError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e: T::Err| ApiError::bad_request(format!("bad {what} {raw:?}: {e}")))
}
