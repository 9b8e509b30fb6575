//! Remote feed reached over HTTP.
//!
//! Talks to any service exposing `GET {base}/feed/data-before/{query_id}?timestamp=N`
//! and answering with a [`DataBeforeView`], which is what a node hosting the
//! playground feed serves.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{OracleEndpoint, OracleError, OracleReading};
use crate::types::{Bytes, QueryId};

/// Wire shape of a data-before answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataBeforeView {
    pub value: Bytes,
    pub timestamp: Option<u64>,
}

impl From<OracleReading> for DataBeforeView {
    fn from(reading: OracleReading) -> Self {
        Self {
            value: reading.value,
            timestamp: reading.reported_at,
        }
    }
}

impl From<DataBeforeView> for OracleReading {
    fn from(view: DataBeforeView) -> Self {
        Self {
            value: view.value,
            reported_at: view.timestamp,
        }
    }
}

/// Blocking HTTP client for a remote feed.
///
/// Uses the blocking reqwest client, so calls must run off the async reactor
/// (e.g. inside `tokio::task::spawn_blocking`).
pub struct HttpOracle {
    http: reqwest::blocking::Client,
    base_url: String,
}

impl HttpOracle {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, OracleError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OracleError::Transport(format!("failed to build http client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn data_before_url(&self, query_id: &QueryId) -> String {
        format!("{}/feed/data-before/{}", self.base_url, query_id)
    }
}

impl OracleEndpoint for HttpOracle {
    fn descriptor(&self) -> String {
        self.base_url.clone()
    }

    fn value_as_of(
        &self,
        query_id: &QueryId,
        timestamp: u64,
    ) -> Result<OracleReading, OracleError> {
        let url = self.data_before_url(query_id);
        debug!(target: "oracle_guard::oracle", "[ORACLE] GET {} as of {}", url, timestamp);

        let response = self
            .http
            .get(&url)
            .query(&[("timestamp", timestamp)])
            .send()
            .map_err(|e| OracleError::Transport(format!("failed to reach feed: {e}")))?;

        if !response.status().is_success() {
            return Err(OracleError::BadResponse(format!(
                "feed returned status {}",
                response.status()
            )));
        }

        let view: DataBeforeView = response
            .json()
            .map_err(|e| OracleError::BadResponse(format!("failed to parse feed response: {e}")))?;
        Ok(view.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_drops_trailing_slash() {
        let oracle = HttpOracle::new("http://127.0.0.1:7171/", Duration::from_secs(1)).unwrap();
        assert_eq!(oracle.descriptor(), "http://127.0.0.1:7171");
        let id = QueryId::new([0xab; 32]);
        assert_eq!(
            oracle.data_before_url(&id),
            format!("http://127.0.0.1:7171/feed/data-before/0x{}", "ab".repeat(32))
        );
    }

    #[test]
    fn unreachable_feed_is_transport_error() {
        // port 9 (discard) is not expected to serve HTTP
        let oracle = HttpOracle::new("http://127.0.0.1:9", Duration::from_millis(300)).unwrap();
        let err = oracle.value_as_of(&QueryId::new([0u8; 32]), 0).unwrap_err();
        assert!(matches!(err, OracleError::Transport(_)));
    }

    #[test]
    fn view_json_shape() {
        let view = DataBeforeView::from(OracleReading::not_found());
        assert_eq!(
            serde_json::to_value(&view).unwrap(),
            serde_json::json!({ "value": "0x", "timestamp": null })
        );
    }
}
