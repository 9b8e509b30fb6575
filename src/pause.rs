//! Circuit breaker for oracle reads.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ProxyError;
use crate::events::ProxyEvent;
use crate::guardian::GuardianRegistry;
use crate::types::Address;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PauseState {
    #[default]
    Active,
    Halted,
}

impl PauseState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PauseState::Active => "active",
            PauseState::Halted => "halted",
        }
    }
}

/// Two-state halt flag. Transitions strictly alternate: pausing a halted
/// switch or unpausing an active one is an error, not a no-op.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PauseSwitch {
    state: PauseState,
}

impl PauseSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_paused(paused: bool) -> Self {
        let state = if paused {
            PauseState::Halted
        } else {
            PauseState::Active
        };
        Self { state }
    }

    pub fn state(&self) -> PauseState {
        self.state
    }

    pub fn is_paused(&self) -> bool {
        self.state == PauseState::Halted
    }

    /// Gate for read and data-bearing paths
    pub fn ensure_active(&self) -> Result<(), ProxyError> {
        match self.state {
            PauseState::Active => Ok(()),
            PauseState::Halted => Err(ProxyError::Halted),
        }
    }

    pub fn pause(
        &mut self,
        guardians: &GuardianRegistry,
        caller: &Address,
    ) -> Result<ProxyEvent, ProxyError> {
        guardians.ensure_guardian(caller)?;
        if self.state == PauseState::Halted {
            return Err(ProxyError::AlreadyHalted);
        }

        self.state = PauseState::Halted;
        warn!(
            target: "oracle_guard::pause",
            "[PAUSE] oracle reads halted by {}",
            caller
        );
        Ok(ProxyEvent::Paused)
    }

    pub fn unpause(
        &mut self,
        guardians: &GuardianRegistry,
        caller: &Address,
    ) -> Result<ProxyEvent, ProxyError> {
        guardians.ensure_guardian(caller)?;
        if self.state == PauseState::Active {
            return Err(ProxyError::AlreadyActive);
        }

        self.state = PauseState::Active;
        warn!(
            target: "oracle_guard::pause",
            "[PAUSE] oracle reads resumed by {}",
            caller
        );
        Ok(ProxyEvent::Unpaused)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (GuardianRegistry, Address, Address) {
        let guardian = Address::new([1u8; 20]);
        let outsider = Address::new([2u8; 20]);
        (GuardianRegistry::new(guardian), guardian, outsider)
    }

    #[test]
    fn starts_active() {
        let switch = PauseSwitch::new();
        assert!(!switch.is_paused());
        assert_eq!(switch.ensure_active(), Ok(()));
    }

    #[test]
    fn pause_twice_fails() {
        let (reg, guardian, _) = setup();
        let mut switch = PauseSwitch::new();
        assert_eq!(switch.pause(&reg, &guardian), Ok(ProxyEvent::Paused));
        assert_eq!(switch.pause(&reg, &guardian), Err(ProxyError::AlreadyHalted));
        assert_eq!(switch.ensure_active(), Err(ProxyError::Halted));
    }

    #[test]
    fn unpause_while_active_fails() {
        let (reg, guardian, _) = setup();
        let mut switch = PauseSwitch::new();
        assert_eq!(switch.unpause(&reg, &guardian), Err(ProxyError::AlreadyActive));
        switch.pause(&reg, &guardian).unwrap();
        assert_eq!(switch.unpause(&reg, &guardian), Ok(ProxyEvent::Unpaused));
        assert_eq!(switch.unpause(&reg, &guardian), Err(ProxyError::AlreadyActive));
    }

    #[test]
    fn outsider_rejected_in_both_states() {
        let (reg, guardian, outsider) = setup();
        let mut switch = PauseSwitch::new();
        assert_eq!(switch.unpause(&reg, &outsider), Err(ProxyError::NotAuthorized(outsider)));
        assert_eq!(switch.pause(&reg, &outsider), Err(ProxyError::NotAuthorized(outsider)));
        switch.pause(&reg, &guardian).unwrap();
        assert_eq!(switch.pause(&reg, &outsider), Err(ProxyError::NotAuthorized(outsider)));
        assert_eq!(switch.unpause(&reg, &outsider), Err(ProxyError::NotAuthorized(outsider)));
        assert!(switch.is_paused());
    }
}
