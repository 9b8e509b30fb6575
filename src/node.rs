//! Node runtime: one proxy instance, its store and nonce book.
//!
//! Every mutating call runs to completion under a single lock. The module
//! handles the call first; its record, notifications and the caller's nonce
//! are then committed in one transaction. If that commit fails the in-memory
//! record is put back, so memory and disk never disagree.
//!
//! Reads capture the pause flag and clock under the lock and release it
//! before the oracle is contacted, so a slow feed never holds up a pause.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::error::ProxyError;
use crate::events::EventRecord;
use crate::guarded::{Call, CallOutcome, EndpointMismatch, GuardedOracle};
use crate::metrics;
use crate::oracle::{OracleEndpoint, OracleReading};
use crate::store::{Commit, StateStore, StoreError};
use crate::tx::{CallError, SignedCall};
use crate::types::{Address, QueryId};

#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Call(#[from] CallError),

    #[error(transparent)]
    Proxy(#[from] ProxyError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Endpoint(#[from] EndpointMismatch),
}

impl NodeError {
    /// Stable reason code
    pub fn code(&self) -> &'static str {
        match self {
            NodeError::Call(e) => e.code(),
            NodeError::Proxy(e) => e.code(),
            NodeError::Store(_) => "StorageFailure",
            NodeError::Endpoint(_) => "EndpointMismatch",
        }
    }
}

/// Result of an accepted call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallReceipt {
    pub caller: Address,
    pub nonce: u64,
    pub outcome: CallOutcome,
    /// Sequence number of the notification the call emitted, if any
    pub event_seq: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatus {
    pub paused: bool,
    pub guardian_count: usize,
    pub oracle_endpoint: String,
    pub instance_id: String,
    pub balance: String,
    pub now: u64,
    pub next_event_seq: u64,
}

struct Inner {
    module: GuardedOracle,
    next_seq: u64,
}

pub struct Node {
    inner: Mutex<Inner>,
    store: StateStore,
    instance_id: String,
}

impl Node {
    /// Load the persisted instance or create a fresh one owned by
    /// `initial_guardian`
    pub fn open(
        store: StateStore,
        endpoint: Arc<dyn OracleEndpoint>,
        clock: Arc<dyn Clock>,
        initial_guardian: Address,
    ) -> Result<Self, NodeError> {
        let module = match store.load_state()? {
            Some(state) => {
                let module = GuardedOracle::restore(state, endpoint, clock)?;
                info!(
                    target: "oracle_guard::node",
                    "[NODE] resumed proxy: guardians={} paused={}",
                    module.guardian_count(),
                    module.is_paused()
                );
                module
            }
            None => {
                let module = GuardedOracle::new(initial_guardian, endpoint, clock);
                store.save_state(module.state())?;
                info!(
                    target: "oracle_guard::node",
                    "[NODE] initialized proxy with guardian {}",
                    initial_guardian
                );
                module
            }
        };
        let next_seq = store.next_seq()?;
        let instance_id = store.instance_id()?;
        metrics::set_state(module.guardian_count(), module.is_paused());

        Ok(Self {
            inner: Mutex::new(Inner { module, next_seq }),
            store,
            instance_id,
        })
    }

    /// Id signed into every envelope addressed to this node
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Authenticate and apply a signed call.
    ///
    /// Once the signature and nonce check out, the nonce is consumed whether
    /// or not the operation itself succeeds.
    pub fn submit(&self, envelope: &SignedCall) -> Result<CallReceipt, NodeError> {
        let op = envelope.call.name();
        let caller = match self.authenticate(envelope) {
            Ok(caller) => caller,
            Err(e) => {
                metrics::record_call(op, e.code());
                return Err(e.into());
            }
        };

        let mut inner = self.inner.lock();
        let expected = self.store.nonce(&caller)?;
        if envelope.nonce != expected {
            let err = CallError::NonceMismatch {
                address: caller,
                expected,
                got: envelope.nonce,
            };
            metrics::record_call(op, err.code());
            return Err(err.into());
        }

        if let Call::ReadValue { query_id } = &envelope.call {
            let view = inner.module.read_view();
            self.consume_nonce(op, caller, expected)?;
            drop(inner);
            return self.finish_read(op, caller, expected, view.read_value(query_id));
        }

        let snapshot = inner.module.state().clone();
        let result = inner.module.execute(&caller, &envelope.call);

        let now = inner.module.now();
        let event = result
            .as_ref()
            .ok()
            .and_then(CallOutcome::event)
            .map(|event| EventRecord {
                seq: inner.next_seq,
                at: now,
                event: event.clone(),
            });
        let events: Vec<EventRecord> = event.into_iter().collect();
        let changed = result.is_ok() && envelope.call.is_mutating();

        let commit = Commit {
            state: if changed { Some(inner.module.state()) } else { None },
            events: &events,
            nonce: Some((caller, expected + 1)),
        };
        if let Err(e) = self.store.commit(commit) {
            warn!(
                target: "oracle_guard::node",
                "[NODE] commit failed for {} from {}: {}",
                op,
                caller,
                e
            );
            inner.module.reset_state(snapshot);
            metrics::record_call(op, "StorageFailure");
            return Err(e.into());
        }
        inner.next_seq += events.len() as u64;
        metrics::set_state(inner.module.guardian_count(), inner.module.is_paused());

        match result {
            Ok(outcome) => {
                metrics::record_call(op, "ok");
                if let Some(record) = events.first() {
                    info!(
                        target: "oracle_guard::node",
                        "[NODE] {} #{} by {}",
                        record.event.name(),
                        record.seq,
                        caller
                    );
                }
                Ok(CallReceipt {
                    caller,
                    nonce: expected,
                    outcome,
                    event_seq: events.first().map(|r| r.seq),
                })
            }
            Err(e) => {
                metrics::record_call(op, e.code());
                Err(e.into())
            }
        }
    }

    fn authenticate(&self, envelope: &SignedCall) -> Result<Address, CallError> {
        let caller = envelope.verify()?;
        if envelope.instance != self.instance_id {
            return Err(CallError::WrongInstance {
                expected: self.instance_id.clone(),
                got: envelope.instance.clone(),
            });
        }
        Ok(caller)
    }

    fn consume_nonce(&self, op: &'static str, caller: Address, used: u64) -> Result<(), NodeError> {
        let commit = Commit {
            nonce: Some((caller, used + 1)),
            ..Commit::default()
        };
        self.store.commit(commit).map_err(|e| {
            warn!(
                target: "oracle_guard::node",
                "[NODE] nonce commit failed for {} from {}: {}",
                op,
                caller,
                e
            );
            metrics::record_call(op, "StorageFailure");
            NodeError::from(e)
        })
    }

    fn finish_read(
        &self,
        op: &'static str,
        caller: Address,
        nonce: u64,
        result: Result<OracleReading, ProxyError>,
    ) -> Result<CallReceipt, NodeError> {
        metrics::record_read(classify_read(result.as_ref().map(OracleReading::is_found)));
        match result {
            Ok(reading) => {
                metrics::record_call(op, "ok");
                Ok(CallReceipt {
                    caller,
                    nonce,
                    outcome: CallOutcome::Reading { reading },
                    event_seq: None,
                })
            }
            Err(e) => {
                metrics::record_call(op, e.code());
                Err(e.into())
            }
        }
    }

    /// Unauthenticated delayed read
    pub fn read_value(&self, query_id: &QueryId) -> Result<OracleReading, NodeError> {
        let view = self.inner.lock().module.read_view();
        let result = view.read_value(query_id);
        metrics::record_read(classify_read(result.as_ref().map(OracleReading::is_found)));
        Ok(result?)
    }

    pub fn status(&self) -> NodeStatus {
        let inner = self.inner.lock();
        NodeStatus {
            paused: inner.module.is_paused(),
            guardian_count: inner.module.guardian_count(),
            oracle_endpoint: inner.module.oracle_endpoint().to_string(),
            instance_id: self.instance_id.clone(),
            balance: inner.module.balance().to_string(),
            now: inner.module.now(),
            next_event_seq: inner.next_seq,
        }
    }

    pub fn guardians(&self) -> Vec<Address> {
        self.inner.lock().module.state().guardians.guardians()
    }

    pub fn is_guardian(&self, address: &Address) -> bool {
        self.inner.lock().module.is_guardian(address)
    }

    pub fn nonce(&self, address: &Address) -> Result<u64, NodeError> {
        Ok(self.store.nonce(address)?)
    }

    pub fn events(&self, from: u64, limit: usize) -> Result<Vec<EventRecord>, NodeError> {
        Ok(self.store.events(from, limit)?)
    }

    pub fn flush(&self) -> Result<usize, NodeError> {
        Ok(self.store.flush()?)
    }
}

fn classify_read(found: Result<bool, &ProxyError>) -> &'static str {
    match found {
        Ok(true) => "found",
        Ok(false) => "not_found",
        Err(ProxyError::Halted) => "halted",
        Err(_) => "unavailable",
    }
}
