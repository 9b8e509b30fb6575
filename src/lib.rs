//! Guarded oracle proxy.
//!
//! A small set of guardians can halt reads from a time-delayed oracle feed.
//! While the proxy is active, consumers read through it and always get the
//! latest value that has been on the feed for at least fifteen minutes.
//!
//! Layers, leaves first:
//! - [`guardian`] and [`pause`]: membership and the halt switch
//! - [`oracle`]: delayed reads plus the playground and HTTP feeds
//! - [`guarded`]: the module record and call dispatcher
//! - [`tx`], [`store`], [`node`]: signed calls, sled persistence, node runtime
//! - [`routes`]: axum HTTP API

pub mod clock;
pub mod config;
pub mod consumer;
pub mod error;
pub mod events;
pub mod guarded;
pub mod guardian;
pub mod metrics;
pub mod node;
pub mod oracle;
pub mod pause;
pub mod routes;
pub mod store;
pub mod tx;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::ProxyError;
pub use events::{EventRecord, ProxyEvent};
pub use guarded::{Call, CallOutcome, GuardedOracle, ProxyState};
pub use guardian::GuardianRegistry;
pub use node::{Node, NodeError};
pub use oracle::{OracleEndpoint, OracleProxy, OracleReading, SAFETY_DELAY_SECS};
pub use pause::PauseSwitch;
pub use tx::SignedCall;
pub use types::{Address, Bytes, QueryId};
