//! Guardian set management
//!
//! Any single guardian may add or remove guardians; there is no quorum.
//! The set itself is the source of truth for the guardian count, and it can
//! never become empty.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ProxyError;
use crate::events::ProxyEvent;
use crate::types::Address;

/// Set of guardian addresses. Always holds at least one member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Address>", into = "Vec<Address>")]
pub struct GuardianRegistry {
    members: HashSet<Address>,
}

impl GuardianRegistry {
    /// Create a registry holding exactly `initial`
    pub fn new(initial: Address) -> Self {
        let mut members = HashSet::new();
        members.insert(initial);
        Self { members }
    }

    pub fn is_guardian(&self, address: &Address) -> bool {
        self.members.contains(address)
    }

    pub fn guardian_count(&self) -> usize {
        self.members.len()
    }

    /// Members in ascending byte order
    pub fn guardians(&self) -> Vec<Address> {
        let mut list: Vec<Address> = self.members.iter().copied().collect();
        list.sort_unstable();
        list
    }

    /// Fails with `NotAuthorized` unless `caller` is a guardian
    pub fn ensure_guardian(&self, caller: &Address) -> Result<(), ProxyError> {
        if self.is_guardian(caller) {
            Ok(())
        } else {
            Err(ProxyError::NotAuthorized(*caller))
        }
    }

    pub fn add_guardian(
        &mut self,
        caller: &Address,
        target: Address,
    ) -> Result<ProxyEvent, ProxyError> {
        self.ensure_guardian(caller)?;
        if self.is_guardian(&target) {
            return Err(ProxyError::AlreadyExists(target));
        }

        self.members.insert(target);
        info!(
            target: "oracle_guard::guardian",
            "[GUARDIAN] {} added {} (count={})",
            caller,
            target,
            self.members.len()
        );
        Ok(ProxyEvent::GuardianAdded { guardian: target })
    }

    pub fn remove_guardian(
        &mut self,
        caller: &Address,
        target: Address,
    ) -> Result<ProxyEvent, ProxyError> {
        self.ensure_guardian(caller)?;
        if !self.is_guardian(&target) {
            return Err(ProxyError::NotFound(target));
        }
        if self.members.len() <= 1 {
            return Err(ProxyError::LastGuardian);
        }

        self.members.remove(&target);
        info!(
            target: "oracle_guard::guardian",
            "[GUARDIAN] {} removed {} (count={})",
            caller,
            target,
            self.members.len()
        );
        Ok(ProxyEvent::GuardianRemoved { guardian: target })
    }
}

/// Error when restoring a persisted guardian list
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("guardian set must not be empty")]
pub struct EmptyGuardianSet;

impl TryFrom<Vec<Address>> for GuardianRegistry {
    type Error = EmptyGuardianSet;

    fn try_from(list: Vec<Address>) -> Result<Self, Self::Error> {
        let members: HashSet<Address> = list.into_iter().collect();
        if members.is_empty() {
            return Err(EmptyGuardianSet);
        }
        Ok(Self { members })
    }
}

impl From<GuardianRegistry> for Vec<Address> {
    fn from(registry: GuardianRegistry) -> Self {
        registry.guardians()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        Address::new([n; 20])
    }

    #[test]
    fn starts_with_single_guardian() {
        let reg = GuardianRegistry::new(addr(1));
        assert!(reg.is_guardian(&addr(1)));
        assert!(!reg.is_guardian(&addr(2)));
        assert_eq!(reg.guardian_count(), 1);
    }

    #[test]
    fn add_checks_caller_before_membership() {
        let mut reg = GuardianRegistry::new(addr(1));
        // target already present, but caller check comes first
        assert_eq!(
            reg.add_guardian(&addr(9), addr(1)),
            Err(ProxyError::NotAuthorized(addr(9)))
        );
        assert_eq!(
            reg.add_guardian(&addr(1), addr(1)),
            Err(ProxyError::AlreadyExists(addr(1)))
        );
        assert_eq!(reg.guardian_count(), 1);
    }

    #[test]
    fn add_then_remove_peer() {
        let mut reg = GuardianRegistry::new(addr(1));
        assert_eq!(
            reg.add_guardian(&addr(1), addr(2)),
            Ok(ProxyEvent::GuardianAdded { guardian: addr(2) })
        );
        assert_eq!(reg.guardian_count(), 2);

        // the new guardian may remove the one that added it
        assert_eq!(
            reg.remove_guardian(&addr(2), addr(1)),
            Ok(ProxyEvent::GuardianRemoved { guardian: addr(1) })
        );
        assert_eq!(reg.guardians(), vec![addr(2)]);
    }

    #[test]
    fn remove_checks_in_order() {
        let mut reg = GuardianRegistry::new(addr(1));
        assert_eq!(
            reg.remove_guardian(&addr(3), addr(1)),
            Err(ProxyError::NotAuthorized(addr(3)))
        );
        assert_eq!(
            reg.remove_guardian(&addr(1), addr(2)),
            Err(ProxyError::NotFound(addr(2)))
        );
        assert_eq!(
            reg.remove_guardian(&addr(1), addr(1)),
            Err(ProxyError::LastGuardian)
        );
        assert_eq!(reg.guardian_count(), 1);
    }

    #[test]
    fn restore_rejects_empty_list() {
        assert_eq!(GuardianRegistry::try_from(Vec::new()), Err(EmptyGuardianSet));

        let restored = GuardianRegistry::try_from(vec![addr(2), addr(1), addr(2)]).unwrap();
        assert_eq!(restored.guardian_count(), 2);
        assert_eq!(restored.guardians(), vec![addr(1), addr(2)]);
    }

    #[test]
    fn serde_round_trip_through_json() {
        let mut reg = GuardianRegistry::new(addr(1));
        reg.add_guardian(&addr(1), addr(2)).unwrap();
        let json = serde_json::to_string(&reg).unwrap();
        let back: GuardianRegistry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, reg);
        assert!(serde_json::from_str::<GuardianRegistry>("[]").is_err());
    }
}
