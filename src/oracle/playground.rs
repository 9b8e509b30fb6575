//! In-memory development feed.
//!
//! Behaves like a minimal oracle network: reporters submit values under a
//! query id, anyone can open a dispute against a report, and readers ask for
//! the latest value at or before a timestamp. Disputes are recorded but do
//! not hide the disputed value from readers.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use super::{OracleEndpoint, OracleError, OracleReading};
use crate::clock::Clock;
use crate::types::{Bytes, QueryId};

pub const PLAYGROUND_DESCRIPTOR: &str = "playground";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    #[error("value must not be empty")]
    EmptyValue,

    #[error("query data does not hash to query id {0}")]
    QueryDataMismatch(QueryId),

    #[error("nonce must match report index (expected 0 or {expected}, got {got})")]
    BadNonce { expected: u64, got: u64 },

    #[error("a report for {query_id} already exists at {timestamp}")]
    DuplicateTimestamp { query_id: QueryId, timestamp: u64 },

    #[error("no report for {query_id} at {timestamp}")]
    NoValueAtTimestamp { query_id: QueryId, timestamp: u64 },
}

/// One submitted value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub value: Bytes,
    pub timestamp: u64,
    pub disputed: bool,
}

#[derive(Debug, Default)]
struct FeedBook {
    /// Reports per query, ascending by timestamp
    reports: HashMap<QueryId, Vec<Report>>,
    dispute_count: u64,
}

impl FeedBook {
    fn index_of(&self, query_id: &QueryId, timestamp: u64) -> Option<usize> {
        self.reports
            .get(query_id)?
            .binary_search_by_key(&timestamp, |r| r.timestamp)
            .ok()
    }
}

/// Shared handle to the development feed. Clones see the same reports.
#[derive(Clone)]
pub struct FeedPlayground {
    book: Arc<RwLock<FeedBook>>,
    clock: Arc<dyn Clock>,
}

impl FeedPlayground {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            book: Arc::new(RwLock::new(FeedBook::default())),
            clock,
        }
    }

    /// Record `value` for `query_id`, stamped with the current time.
    ///
    /// `nonce` must be 0 or the number of reports already made for the query.
    pub fn submit_value(
        &self,
        query_id: QueryId,
        value: Bytes,
        nonce: u64,
        query_data: &[u8],
    ) -> Result<u64, FeedError> {
        if value.is_empty() {
            return Err(FeedError::EmptyValue);
        }
        if QueryId::from_query_data(query_data) != query_id {
            return Err(FeedError::QueryDataMismatch(query_id));
        }

        let timestamp = self.clock.now();
        let mut book = self.book.write();
        let reports = book.reports.entry(query_id).or_default();

        let expected = reports.len() as u64;
        if nonce != 0 && nonce != expected {
            return Err(FeedError::BadNonce {
                expected,
                got: nonce,
            });
        }
        if let Some(last) = reports.last() {
            if last.timestamp >= timestamp {
                return Err(FeedError::DuplicateTimestamp {
                    query_id,
                    timestamp,
                });
            }
        }

        reports.push(Report {
            value,
            timestamp,
            disputed: false,
        });
        info!(
            target: "oracle_guard::feed",
            "[FEED] report #{} for {} at {}",
            expected,
            query_id,
            timestamp
        );
        Ok(timestamp)
    }

    /// Flag the report at `timestamp` as disputed
    pub fn begin_dispute(&self, query_id: QueryId, timestamp: u64) -> Result<(), FeedError> {
        let mut book = self.book.write();
        let index = book
            .index_of(&query_id, timestamp)
            .ok_or(FeedError::NoValueAtTimestamp {
                query_id,
                timestamp,
            })?;

        if let Some(report) = book.reports.get_mut(&query_id).and_then(|r| r.get_mut(index)) {
            report.disputed = true;
        }
        book.dispute_count += 1;
        warn!(
            target: "oracle_guard::feed",
            "[FEED] dispute opened against {} at {}",
            query_id,
            timestamp
        );
        Ok(())
    }

    /// Latest report at or before `timestamp`, or the not-found reading
    pub fn data_before(&self, query_id: &QueryId, timestamp: u64) -> OracleReading {
        let book = self.book.read();
        let Some(reports) = book.reports.get(query_id) else {
            return OracleReading::not_found();
        };

        let upto = reports.partition_point(|r| r.timestamp <= timestamp);
        match upto.checked_sub(1).and_then(|i| reports.get(i)) {
            Some(report) => OracleReading::found(report.value.clone(), report.timestamp),
            None => OracleReading::not_found(),
        }
    }

    pub fn retrieve_data(&self, query_id: &QueryId, timestamp: u64) -> Option<Bytes> {
        let book = self.book.read();
        let index = book.index_of(query_id, timestamp)?;
        book.reports
            .get(query_id)
            .and_then(|r| r.get(index))
            .map(|r| r.value.clone())
    }

    pub fn is_in_dispute(&self, query_id: &QueryId, timestamp: u64) -> bool {
        let book = self.book.read();
        book.index_of(query_id, timestamp)
            .and_then(|i| book.reports.get(query_id).and_then(|r| r.get(i)))
            .map(|r| r.disputed)
            .unwrap_or(false)
    }

    pub fn new_value_count(&self, query_id: &QueryId) -> usize {
        self.book
            .read()
            .reports
            .get(query_id)
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn timestamp_by_index(&self, query_id: &QueryId, index: usize) -> Option<u64> {
        self.book
            .read()
            .reports
            .get(query_id)
            .and_then(|r| r.get(index))
            .map(|r| r.timestamp)
    }

    pub fn dispute_count(&self) -> u64 {
        self.book.read().dispute_count
    }
}

impl OracleEndpoint for FeedPlayground {
    fn descriptor(&self) -> String {
        PLAYGROUND_DESCRIPTOR.to_string()
    }

    fn value_as_of(
        &self,
        query_id: &QueryId,
        timestamp: u64,
    ) -> Result<OracleReading, OracleError> {
        Ok(self.data_before(query_id, timestamp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::types::{encode_uint, spot_price_query_data};

    fn feed() -> (FeedPlayground, ManualClock, QueryId, Vec<u8>) {
        let clock = ManualClock::new(1_700_000_000);
        let feed = FeedPlayground::new(Arc::new(clock.clone()));
        let data = spot_price_query_data("eth", "usd");
        (feed, clock, QueryId::from_query_data(&data), data)
    }

    #[test]
    fn data_before_is_inclusive_and_picks_latest() {
        let (feed, clock, id, data) = feed();
        let t1 = feed.submit_value(id, encode_uint(1), 0, &data).unwrap();
        clock.advance(10);
        let t2 = feed.submit_value(id, encode_uint(2), 1, &data).unwrap();

        assert!(!feed.data_before(&id, t1 - 1).is_found());
        assert_eq!(feed.data_before(&id, t1), OracleReading::found(encode_uint(1), t1));
        assert_eq!(feed.data_before(&id, t2 - 1).value, encode_uint(1));
        assert_eq!(feed.data_before(&id, t2 + 500).value, encode_uint(2));
        assert_eq!(feed.new_value_count(&id), 2);
        assert_eq!(feed.timestamp_by_index(&id, 1), Some(t2));
    }

    #[test]
    fn rejects_bad_submissions() {
        let (feed, clock, id, data) = feed();
        assert_eq!(feed.submit_value(id, Bytes::default(), 0, &data), Err(FeedError::EmptyValue));
        assert_eq!(
            feed.submit_value(id, encode_uint(1), 0, b"other"),
            Err(FeedError::QueryDataMismatch(id))
        );
        assert_eq!(
            feed.submit_value(id, encode_uint(1), 3, &data),
            Err(FeedError::BadNonce { expected: 0, got: 3 })
        );

        let ts = feed.submit_value(id, encode_uint(1), 0, &data).unwrap();
        assert_eq!(
            feed.submit_value(id, encode_uint(2), 1, &data),
            Err(FeedError::DuplicateTimestamp { query_id: id, timestamp: ts })
        );
        clock.advance(1);
        assert!(feed.submit_value(id, encode_uint(2), 1, &data).is_ok());
    }

    #[test]
    fn dispute_is_recorded_but_value_stays_readable() {
        let (feed, _clock, id, data) = feed();
        let ts = feed.submit_value(id, encode_uint(7), 0, &data).unwrap();

        assert_eq!(
            feed.begin_dispute(id, ts + 1),
            Err(FeedError::NoValueAtTimestamp { query_id: id, timestamp: ts + 1 })
        );
        feed.begin_dispute(id, ts).unwrap();

        assert!(feed.is_in_dispute(&id, ts));
        assert_eq!(feed.dispute_count(), 1);
        assert_eq!(feed.retrieve_data(&id, ts), Some(encode_uint(7)));
        assert_eq!(feed.data_before(&id, ts).value, encode_uint(7));
    }
}
