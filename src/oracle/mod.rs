//! Delayed-read oracle access.
//!
//! The proxy never trusts a value the moment it lands on the feed: every
//! read asks the oracle for the latest value reported at least
//! [`SAFETY_DELAY_SECS`] ago, so a dispute window has opened before anything
//! is surfaced downstream. Nothing is cached; each call re-reads the feed.
//!
//! - `playground` - in-memory feed used for development and tests
//! - `http` - remote feed reached over HTTP

pub mod http;
pub mod playground;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::error::ProxyError;
use crate::pause::PauseSwitch;
use crate::types::{Bytes, QueryId};

/// Age a report must reach before the proxy will surface it (15 minutes)
pub const SAFETY_DELAY_SECS: u64 = 900;

/// Answer to a "value at or before" query.
///
/// A reading without `reported_at` is the empty not-found result. That is a
/// valid answer, not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleReading {
    pub value: Bytes,
    pub reported_at: Option<u64>,
}

impl OracleReading {
    pub fn found(value: Bytes, reported_at: u64) -> Self {
        Self {
            value,
            reported_at: Some(reported_at),
        }
    }

    pub fn not_found() -> Self {
        Self::default()
    }

    pub fn is_found(&self) -> bool {
        self.reported_at.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    #[error("transport: {0}")]
    Transport(String),

    #[error("bad response: {0}")]
    BadResponse(String),
}

/// Narrow capability the proxy needs from an oracle network.
pub trait OracleEndpoint: Send + Sync {
    /// Stable identity of the endpoint, fixed for the proxy's lifetime
    fn descriptor(&self) -> String;

    /// Latest value for `query_id` reported at or before `timestamp`
    fn value_as_of(&self, query_id: &QueryId, timestamp: u64)
        -> Result<OracleReading, OracleError>;
}

/// Forwards reads to the endpoint when the pause switch allows it.
#[derive(Clone)]
pub struct OracleProxy {
    endpoint: Arc<dyn OracleEndpoint>,
}

impl OracleProxy {
    pub fn new(endpoint: Arc<dyn OracleEndpoint>) -> Self {
        Self { endpoint }
    }

    pub fn descriptor(&self) -> String {
        self.endpoint.descriptor()
    }

    /// Reference timestamp for a read issued at `now`
    pub fn reference_time(now: u64) -> u64 {
        now.saturating_sub(SAFETY_DELAY_SECS)
    }

    pub fn read_value(
        &self,
        pause: &PauseSwitch,
        query_id: &QueryId,
        now: u64,
    ) -> Result<OracleReading, ProxyError> {
        pause.ensure_active()?;

        let as_of = Self::reference_time(now);
        let reading = self.endpoint.value_as_of(query_id, as_of)?;
        debug!(
            target: "oracle_guard::oracle",
            "[ORACLE] read {} as of {} -> found={}",
            query_id,
            as_of,
            reading.is_found()
        );
        Ok(reading)
    }
}

impl std::fmt::Debug for OracleProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OracleProxy")
            .field("endpoint", &self.endpoint.descriptor())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guardian::GuardianRegistry;
    use crate::types::Address;
    use parking_lot::Mutex;

    /// Records the timestamps it is asked about
    #[derive(Default)]
    struct RecordingEndpoint {
        asked: Mutex<Vec<u64>>,
    }

    impl OracleEndpoint for RecordingEndpoint {
        fn descriptor(&self) -> String {
            "recording".into()
        }

        fn value_as_of(
            &self,
            _query_id: &QueryId,
            timestamp: u64,
        ) -> Result<OracleReading, OracleError> {
            self.asked.lock().push(timestamp);
            Ok(OracleReading::found(Bytes(vec![1]), timestamp))
        }
    }

    struct DownEndpoint;

    impl OracleEndpoint for DownEndpoint {
        fn descriptor(&self) -> String {
            "down".into()
        }

        fn value_as_of(&self, _: &QueryId, _: u64) -> Result<OracleReading, OracleError> {
            Err(OracleError::Transport("connection refused".into()))
        }
    }

    #[test]
    fn forwards_with_safety_delay() {
        let endpoint = Arc::new(RecordingEndpoint::default());
        let proxy = OracleProxy::new(endpoint.clone());
        let id = QueryId::spot_price("eth", "usd");

        proxy.read_value(&PauseSwitch::new(), &id, 10_000).unwrap();
        proxy.read_value(&PauseSwitch::new(), &id, 100).unwrap();
        assert_eq!(*endpoint.asked.lock(), vec![9_100, 0]);
    }

    #[test]
    fn halted_switch_blocks_before_forwarding() {
        let endpoint = Arc::new(RecordingEndpoint::default());
        let proxy = OracleProxy::new(endpoint.clone());
        let guardian = Address::new([1u8; 20]);
        let mut pause = PauseSwitch::new();
        pause.pause(&GuardianRegistry::new(guardian), &guardian).unwrap();

        let id = QueryId::spot_price("eth", "usd");
        assert_eq!(proxy.read_value(&pause, &id, 10_000), Err(ProxyError::Halted));
        assert!(endpoint.asked.lock().is_empty());
    }

    #[test]
    fn endpoint_failure_is_reported() {
        let proxy = OracleProxy::new(Arc::new(DownEndpoint));
        let err = proxy
            .read_value(&PauseSwitch::new(), &QueryId::new([0u8; 32]), 5_000)
            .unwrap_err();
        assert_eq!(err.code(), "OracleUnavailable");
    }
}
