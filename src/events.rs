use serde::{Deserialize, Serialize};

use crate::types::Address;

/// Notifications emitted by successful state transitions, consumable by
/// external monitors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProxyEvent {
    GuardianAdded { guardian: Address },
    GuardianRemoved { guardian: Address },
    Paused,
    Unpaused,
}

impl ProxyEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ProxyEvent::GuardianAdded { .. } => "GuardianAdded",
            ProxyEvent::GuardianRemoved { .. } => "GuardianRemoved",
            ProxyEvent::Paused => "Paused",
            ProxyEvent::Unpaused => "Unpaused",
        }
    }
}

/// A notification as stored in the node's log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Position in the log, starting at 0
    pub seq: u64,

    /// Unix timestamp (seconds) of the call that emitted it
    pub at: u64,

    pub event: ProxyEvent,
}
