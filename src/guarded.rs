//! The guarded oracle module: one state record plus the handlers that
//! operate on it.
//!
//! Each handler validates every precondition before touching the record, so
//! a failed call leaves the state exactly as it was. Reads forward to the
//! oracle endpoint only after all checks pass and never mutate anything.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::clock::Clock;
use crate::error::ProxyError;
use crate::events::ProxyEvent;
use crate::guardian::GuardianRegistry;
use crate::oracle::{OracleEndpoint, OracleProxy, OracleReading};
use crate::pause::PauseSwitch;
use crate::types::{Address, Bytes, QueryId};

/// Persisted state of one proxy instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyState {
    pub guardians: GuardianRegistry,
    pub pause: PauseSwitch,
    /// Descriptor of the oracle endpoint, fixed at construction
    pub oracle_endpoint: String,
    /// Value retained from bare transfers
    pub balance: u128,
}

impl ProxyState {
    pub fn new(initial_guardian: Address, oracle_endpoint: String) -> Self {
        Self {
            guardians: GuardianRegistry::new(initial_guardian),
            pause: PauseSwitch::new(),
            oracle_endpoint,
            balance: 0,
        }
    }

    pub fn add_guardian(
        &mut self,
        caller: &Address,
        target: Address,
    ) -> Result<ProxyEvent, ProxyError> {
        self.guardians.add_guardian(caller, target)
    }

    pub fn remove_guardian(
        &mut self,
        caller: &Address,
        target: Address,
    ) -> Result<ProxyEvent, ProxyError> {
        self.guardians.remove_guardian(caller, target)
    }

    pub fn pause(&mut self, caller: &Address) -> Result<ProxyEvent, ProxyError> {
        self.pause.pause(&self.guardians, caller)
    }

    pub fn unpause(&mut self, caller: &Address) -> Result<ProxyEvent, ProxyError> {
        self.pause.unpause(&self.guardians, caller)
    }

    /// Bare value transfer. Accepted in every state.
    pub fn receive(&mut self, sender: &Address, amount: u128) -> u128 {
        self.balance = self.balance.saturating_add(amount);
        debug!(
            target: "oracle_guard::proxy",
            "[PROXY] received {} from {} (balance={})",
            amount,
            sender,
            self.balance
        );
        self.balance
    }

    /// Call carrying data that matches no operation.
    ///
    /// Halted instances answer `Halted`; active ones refuse the call.
    pub fn fallback(&mut self, data: &Bytes) -> Result<(), ProxyError> {
        self.pause.ensure_active()?;
        debug!(
            target: "oracle_guard::proxy",
            "[PROXY] rejected unmatched call data ({} bytes)",
            data.as_slice().len()
        );
        Err(ProxyError::UnsupportedCall)
    }
}

/// Operations a caller can invoke on the module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Call {
    AddGuardian { guardian: Address },
    RemoveGuardian { guardian: Address },
    Pause,
    Unpause,
    ReadValue { query_id: QueryId },
    /// Plain value transfer with no payload
    Transfer { amount: u128 },
    /// Value and/or payload that matches no operation. Without a payload
    /// this is handled as a plain transfer.
    Fallback {
        #[serde(default)]
        amount: u128,
        data: Bytes,
    },
}

impl Call {
    pub fn name(&self) -> &'static str {
        match self {
            Call::AddGuardian { .. } => "add_guardian",
            Call::RemoveGuardian { .. } => "remove_guardian",
            Call::Pause => "pause",
            Call::Unpause => "unpause",
            Call::ReadValue { .. } => "read_value",
            Call::Transfer { .. } => "transfer",
            Call::Fallback { .. } => "fallback",
        }
    }

    /// Whether the call can change the persisted record
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Call::ReadValue { .. })
    }
}

/// Result of a successful call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CallOutcome {
    Event { event: ProxyEvent },
    Reading { reading: OracleReading },
    Received { balance: u128 },
}

impl CallOutcome {
    pub fn event(&self) -> Option<&ProxyEvent> {
        match self {
            CallOutcome::Event { event } => Some(event),
            _ => None,
        }
    }
}

/// One proxy instance: state record, oracle endpoint and clock.
pub struct GuardedOracle {
    state: ProxyState,
    proxy: OracleProxy,
    clock: Arc<dyn Clock>,
}

impl GuardedOracle {
    /// Fresh instance with a single guardian, active
    pub fn new(
        initial_guardian: Address,
        endpoint: Arc<dyn OracleEndpoint>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let proxy = OracleProxy::new(endpoint);
        let state = ProxyState::new(initial_guardian, proxy.descriptor());
        info!(
            target: "oracle_guard::proxy",
            "[PROXY] created with guardian {} over {}",
            initial_guardian,
            state.oracle_endpoint
        );
        Self { state, proxy, clock }
    }

    /// Resume a persisted instance. The endpoint must be the one it was
    /// created with.
    pub fn restore(
        state: ProxyState,
        endpoint: Arc<dyn OracleEndpoint>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, EndpointMismatch> {
        let proxy = OracleProxy::new(endpoint);
        let configured = proxy.descriptor();
        if configured != state.oracle_endpoint {
            return Err(EndpointMismatch {
                persisted: state.oracle_endpoint,
                configured,
            });
        }
        Ok(Self { state, proxy, clock })
    }

    pub fn state(&self) -> &ProxyState {
        &self.state
    }

    /// Put back a previously captured state (used to undo a call whose
    /// effects could not be persisted)
    pub fn reset_state(&mut self, state: ProxyState) {
        self.state = state;
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    pub fn is_guardian(&self, address: &Address) -> bool {
        self.state.guardians.is_guardian(address)
    }

    pub fn guardian_count(&self) -> usize {
        self.state.guardians.guardian_count()
    }

    pub fn is_paused(&self) -> bool {
        self.state.pause.is_paused()
    }

    pub fn balance(&self) -> u128 {
        self.state.balance
    }

    pub fn oracle_endpoint(&self) -> &str {
        &self.state.oracle_endpoint
    }

    pub fn add_guardian(
        &mut self,
        caller: &Address,
        target: Address,
    ) -> Result<ProxyEvent, ProxyError> {
        self.state.add_guardian(caller, target)
    }

    pub fn remove_guardian(
        &mut self,
        caller: &Address,
        target: Address,
    ) -> Result<ProxyEvent, ProxyError> {
        self.state.remove_guardian(caller, target)
    }

    pub fn pause(&mut self, caller: &Address) -> Result<ProxyEvent, ProxyError> {
        self.state.pause(caller)
    }

    pub fn unpause(&mut self, caller: &Address) -> Result<ProxyEvent, ProxyError> {
        self.state.unpause(caller)
    }

    /// Latest value reported at least [`crate::oracle::SAFETY_DELAY_SECS`] ago
    pub fn read_value(&self, query_id: &QueryId) -> Result<OracleReading, ProxyError> {
        self.read_view().read_value(query_id)
    }

    /// Snapshot of what a read needs, usable after the module is released
    pub fn read_view(&self) -> ReadView {
        ReadView {
            proxy: self.proxy.clone(),
            pause: self.state.pause,
            now: self.clock.now(),
        }
    }

    pub fn receive(&mut self, sender: &Address, amount: u128) -> u128 {
        self.state.receive(sender, amount)
    }

    pub fn fallback(&mut self, data: &Bytes) -> Result<(), ProxyError> {
        self.state.fallback(data)
    }

    /// Dispatch a call on behalf of `caller`
    pub fn execute(&mut self, caller: &Address, call: &Call) -> Result<CallOutcome, ProxyError> {
        let event = match call {
            Call::AddGuardian { guardian } => self.add_guardian(caller, *guardian)?,
            Call::RemoveGuardian { guardian } => self.remove_guardian(caller, *guardian)?,
            Call::Pause => self.pause(caller)?,
            Call::Unpause => self.unpause(caller)?,
            Call::ReadValue { query_id } => {
                let reading = self.read_value(query_id)?;
                return Ok(CallOutcome::Reading { reading });
            }
            Call::Transfer { amount } => {
                let balance = self.receive(caller, *amount);
                return Ok(CallOutcome::Received { balance });
            }
            Call::Fallback { amount, data } if data.is_empty() => {
                let balance = self.receive(caller, *amount);
                return Ok(CallOutcome::Received { balance });
            }
            Call::Fallback { data, .. } => {
                self.fallback(data)?;
                return Ok(CallOutcome::Received {
                    balance: self.state.balance,
                });
            }
        };
        Ok(CallOutcome::Event { event })
    }
}

/// Pause flag and clock reading captured at one instant, plus the endpoint
#[derive(Debug, Clone)]
pub struct ReadView {
    proxy: OracleProxy,
    pause: PauseSwitch,
    now: u64,
}

impl ReadView {
    pub fn read_value(&self, query_id: &QueryId) -> Result<OracleReading, ProxyError> {
        self.proxy.read_value(&self.pause, query_id, self.now)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("persisted oracle endpoint {persisted} does not match configured {configured}")]
pub struct EndpointMismatch {
    pub persisted: String,
    pub configured: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::oracle::playground::FeedPlayground;
    use crate::types::{encode_uint, spot_price_query_data};

    fn addr(n: u8) -> Address {
        Address::new([n; 20])
    }

    fn module() -> (GuardedOracle, FeedPlayground, ManualClock) {
        let clock = ManualClock::new(1_700_000_000);
        let feed = FeedPlayground::new(Arc::new(clock.clone()));
        let module = GuardedOracle::new(addr(1), Arc::new(feed.clone()), Arc::new(clock.clone()));
        (module, feed, clock)
    }

    #[test]
    fn failed_calls_leave_state_untouched() {
        let (mut module, _, _) = module();
        let before = module.state().clone();

        let failures = [
            Call::AddGuardian { guardian: addr(1) },
            Call::RemoveGuardian { guardian: addr(1) },
            Call::RemoveGuardian { guardian: addr(5) },
            Call::Unpause,
            Call::Fallback { amount: 10, data: Bytes(vec![0x12, 0x34, 0x56, 0x78]) },
        ];
        for call in &failures {
            assert!(module.execute(&addr(1), call).is_err(), "{call:?} should fail");
            assert_eq!(module.state(), &before);
        }
        assert!(module.execute(&addr(2), &Call::Pause).is_err());
        assert_eq!(module.state(), &before);
    }

    #[test]
    fn transfer_accepted_while_halted() {
        let (mut module, _, _) = module();
        module.pause(&addr(1)).unwrap();
        assert_eq!(
            module.execute(&addr(7), &Call::Transfer { amount: 1_000 }),
            Ok(CallOutcome::Received { balance: 1_000 })
        );
        assert_eq!(module.balance(), 1_000);
    }

    #[test]
    fn fallback_depends_on_pause_state() {
        let (mut module, _, _) = module();
        let data = Bytes(vec![0x12, 0x34, 0x56, 0x78]);
        assert_eq!(module.fallback(&data), Err(ProxyError::UnsupportedCall));
        module.pause(&addr(1)).unwrap();
        assert_eq!(module.fallback(&data), Err(ProxyError::Halted));
    }

    #[test]
    fn empty_fallback_is_a_transfer() {
        let (mut module, _, _) = module();
        let call = Call::Fallback { amount: 5, data: Bytes(Vec::new()) };
        assert_eq!(
            module.execute(&addr(9), &call),
            Ok(CallOutcome::Received { balance: 5 })
        );
        module.pause(&addr(1)).unwrap();
        assert_eq!(
            module.execute(&addr(9), &call),
            Ok(CallOutcome::Received { balance: 10 })
        );
    }

    #[test]
    fn read_goes_through_delay() {
        let (mut module, feed, clock) = module();
        let data = spot_price_query_data("eth", "usd");
        let id = QueryId::from_query_data(&data);
        feed.submit_value(id, encode_uint(42), 0, &data).unwrap();

        let outcome = module.execute(&addr(9), &Call::ReadValue { query_id: id }).unwrap();
        assert_eq!(outcome, CallOutcome::Reading { reading: OracleReading::not_found() });

        clock.advance(901);
        let reading = module.read_value(&id).unwrap();
        assert_eq!(reading.value, encode_uint(42));
    }

    #[test]
    fn restore_requires_same_endpoint() {
        let (module, feed, clock) = module();
        let state = module.state().clone();

        let again = GuardedOracle::restore(state.clone(), Arc::new(feed), Arc::new(clock.clone()));
        assert!(again.is_ok());

        let mut other = state;
        other.oracle_endpoint = "http://elsewhere".into();
        let feed = FeedPlayground::new(Arc::new(clock.clone()));
        let err = GuardedOracle::restore(other, Arc::new(feed), Arc::new(clock)).err().unwrap();
        assert_eq!(err.persisted, "http://elsewhere");
        assert_eq!(err.configured, "playground");
    }

    #[test]
    fn call_json_shape() {
        let call: Call = serde_json::from_value(serde_json::json!({
            "op": "add_guardian",
            "guardian": format!("0x{}", "02".repeat(20)),
        }))
        .unwrap();
        assert_eq!(call, Call::AddGuardian { guardian: addr(2) });

        let call: Call = serde_json::from_value(serde_json::json!({ "op": "pause" })).unwrap();
        assert_eq!(call, Call::Pause);
    }
}
