//! Sample downstream consumer reading spot prices through the proxy.

use thiserror::Error;
use tracing::debug;

use crate::error::ProxyError;
use crate::guarded::GuardedOracle;
use crate::types::{decode_uint, QueryId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PriceError {
    #[error(transparent)]
    Proxy(#[from] ProxyError),

    #[error("value of {0} bytes is not a price")]
    Undecodable(usize),
}

/// Price reader bound to one asset/currency pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceConsumer {
    asset: String,
    currency: String,
    query_id: QueryId,
}

impl PriceConsumer {
    pub fn new(asset: &str, currency: &str) -> Self {
        Self {
            asset: asset.to_lowercase(),
            currency: currency.to_lowercase(),
            query_id: QueryId::spot_price(asset, currency),
        }
    }

    pub fn query_id(&self) -> QueryId {
        self.query_id
    }

    /// Current delayed price. A pair with no report yet reads as 0.
    pub fn read_price(&self, oracle: &GuardedOracle) -> Result<u128, PriceError> {
        let reading = oracle.read_value(&self.query_id)?;
        if !reading.is_found() {
            return Ok(0);
        }
        let price = decode_uint(reading.value.as_slice())
            .ok_or(PriceError::Undecodable(reading.value.as_slice().len()))?;
        debug!(
            target: "oracle_guard::oracle",
            "[ORACLE] {}/{} price {}",
            self.asset,
            self.currency,
            price
        );
        Ok(price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::clock::ManualClock;
    use crate::oracle::playground::FeedPlayground;
    use crate::types::{encode_uint, spot_price_query_data, Address, Bytes};

    #[test]
    fn reads_delayed_price() {
        let clock = ManualClock::new(1_000_000);
        let feed = FeedPlayground::new(Arc::new(clock.clone()));
        let guardian = Address::new([1u8; 20]);
        let mut oracle = GuardedOracle::new(guardian, Arc::new(feed.clone()), Arc::new(clock.clone()));
        let consumer = PriceConsumer::new("ETH", "USD");

        assert_eq!(consumer.read_price(&oracle), Ok(0));

        let data = spot_price_query_data("eth", "usd");
        feed.submit_value(consumer.query_id(), encode_uint(2_500), 0, &data).unwrap();
        clock.advance(901);
        assert_eq!(consumer.read_price(&oracle), Ok(2_500));

        oracle.pause(&guardian).unwrap();
        assert_eq!(consumer.read_price(&oracle), Err(PriceError::Proxy(ProxyError::Halted)));
    }

    #[test]
    fn oversized_value_is_undecodable() {
        let clock = ManualClock::new(1_000_000);
        let feed = FeedPlayground::new(Arc::new(clock.clone()));
        let oracle = GuardedOracle::new(Address::new([1u8; 20]), Arc::new(feed.clone()), Arc::new(clock.clone()));
        let consumer = PriceConsumer::new("btc", "usd");

        let mut raw = vec![0u8; 32];
        raw[0] = 1;
        let data = spot_price_query_data("btc", "usd");
        feed.submit_value(consumer.query_id(), Bytes(raw), 0, &data).unwrap();
        clock.advance(1_000);
        assert_eq!(consumer.read_price(&oracle), Err(PriceError::Undecodable(32)));
    }
}
