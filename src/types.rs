//! Primitive identifiers shared by every layer: caller addresses, oracle
//! query ids and opaque byte payloads.
//!
//! All three render as `0x`-prefixed lowercase hex and serialize as strings so
//! they read the same in logs, JSON bodies and the CLI.

use std::fmt;
use std::str::FromStr;

use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Length of an address in bytes
pub const ADDRESS_LEN: usize = 20;

/// Length of a query id in bytes
pub const QUERY_ID_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseHexError {
    #[error("missing 0x prefix")]
    MissingPrefix,
    #[error("expected {expected} bytes, got {got}")]
    Length { expected: usize, got: usize },
    #[error("invalid hex: {0}")]
    Hex(String),
}

fn decode_prefixed(s: &str) -> Result<Vec<u8>, ParseHexError> {
    let body = s
        .trim()
        .strip_prefix("0x")
        .or_else(|| s.trim().strip_prefix("0X"))
        .ok_or(ParseHexError::MissingPrefix)?;
    hex::decode(body).map_err(|e| ParseHexError::Hex(e.to_string()))
}

fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N], ParseHexError> {
    let bytes = decode_prefixed(s)?;
    let got = bytes.len();
    bytes
        .try_into()
        .map_err(|_| ParseHexError::Length { expected: N, got })
}

/// Caller identity. Guardians, consumers and senders are all addresses.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    pub const fn new(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    /// Last 20 bytes of SHA-256 over the raw ed25519 public key.
    pub fn from_public_key(key: &VerifyingKey) -> Self {
        let digest = Sha256::digest(key.as_bytes());
        let mut out = [0u8; ADDRESS_LEN];
        out.copy_from_slice(&digest[digest.len() - ADDRESS_LEN..]);
        Self(out)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = ParseHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed::<ADDRESS_LEN>(s).map(Self)
    }
}

/// Identifier of an oracle query (e.g. the ETH/USD spot price).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryId([u8; QUERY_ID_LEN]);

impl QueryId {
    pub const fn new(bytes: [u8; QUERY_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// SHA-256 of the query data. Reporters must submit query data that
    /// hashes to the id they report under.
    pub fn from_query_data(query_data: &[u8]) -> Self {
        let digest = Sha256::digest(query_data);
        let mut out = [0u8; QUERY_ID_LEN];
        out.copy_from_slice(&digest);
        Self(out)
    }

    /// Id of the spot price query for `asset` quoted in `currency`.
    pub fn spot_price(asset: &str, currency: &str) -> Self {
        Self::from_query_data(&spot_price_query_data(asset, currency))
    }

    pub fn as_bytes(&self) -> &[u8; QUERY_ID_LEN] {
        &self.0
    }
}

/// Canonical query data for a spot price, e.g.
/// `{"args":["eth","usd"],"type":"SpotPrice"}` (keys sorted).
pub fn spot_price_query_data(asset: &str, currency: &str) -> Vec<u8> {
    serde_json::json!({
        "type": "SpotPrice",
        "args": [asset.to_lowercase(), currency.to_lowercase()],
    })
    .to_string()
    .into_bytes()
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QueryId({self})")
    }
}

impl FromStr for QueryId {
    type Err = ParseHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed::<QUERY_ID_LEN>(s).map(Self)
    }
}

/// Opaque byte payload (oracle values, fallback call data).
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Bytes(pub Vec<u8>);

impl Bytes {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Bytes {
    fn from(v: Vec<u8>) -> Self {
        Self(v)
    }
}

impl From<&[u8]> for Bytes {
    fn from(v: &[u8]) -> Self {
        Self(v.to_vec())
    }
}

impl fmt::Display for Bytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0))
    }
}

impl fmt::Debug for Bytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bytes({self})")
    }
}

impl FromStr for Bytes {
    type Err = ParseHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_prefixed(s).map(Self)
    }
}

/// Encode an unsigned integer as a 32-byte big-endian word, the layout the
/// spot price feeds report in.
pub fn encode_uint(value: u128) -> Bytes {
    let mut word = vec![0u8; 32];
    word[16..].copy_from_slice(&value.to_be_bytes());
    Bytes(word)
}

/// Decode a big-endian unsigned integer of up to 32 bytes. Returns `None`
/// when the payload is longer than a word or does not fit in a `u128`.
pub fn decode_uint(bytes: &[u8]) -> Option<u128> {
    if bytes.len() > 32 {
        return None;
    }
    let significant = bytes.iter().skip_while(|b| **b == 0).count();
    if significant > 16 {
        return None;
    }
    Some(
        bytes[bytes.len() - significant..]
            .iter()
            .fold(0u128, |acc, b| (acc << 8) | u128::from(*b)),
    )
}

macro_rules! string_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

string_serde!(Address);
string_serde!(QueryId);
string_serde!(Bytes);
