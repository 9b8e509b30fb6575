//! sled-backed persistence for one proxy instance.
//!
//! Trees:
//! - `proxy_state`: the module record (bincode) under a single key
//! - `proxy_events`: notification log, serde_json rows keyed by big-endian seq
//! - `call_nonces`: next expected nonce per caller address
//! - `node_meta`: the node's instance id, created once
//!
//! A call's effects land in the first three trees in one transaction.

use std::path::Path;

use sled::transaction::{ConflictableTransactionError, Transactional};
use sled::{Db, Tree};
use thiserror::Error;
use tracing::{debug, info};

use crate::events::EventRecord;
use crate::guarded::ProxyState;
use crate::types::Address;

const STATE_TREE: &str = "proxy_state";
const EVENTS_TREE: &str = "proxy_events";
const NONCES_TREE: &str = "call_nonces";
const META_TREE: &str = "node_meta";
const STATE_KEY: &[u8] = b"record";
const INSTANCE_KEY: &[u8] = b"instance_id";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sled: {0}")]
    Sled(#[from] sled::Error),

    #[error("codec: {0}")]
    Codec(String),

    #[error("transaction aborted: {0}")]
    Transaction(String),
}

/// Everything one call writes
#[derive(Debug, Default)]
pub struct Commit<'a> {
    pub state: Option<&'a ProxyState>,
    pub events: &'a [EventRecord],
    /// Caller and the nonce it must use next
    pub nonce: Option<(Address, u64)>,
}

pub struct StateStore {
    db: Db,
    state: Tree,
    events: Tree,
    nonces: Tree,
    meta: Tree,
}

impl StateStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = sled::open(path.as_ref())?;
        info!(
            target: "oracle_guard::store",
            "[STORE] opened {}",
            path.as_ref().display()
        );
        Self::from_db(&db)
    }

    pub fn from_db(db: &Db) -> Result<Self, StoreError> {
        Ok(Self {
            db: db.clone(),
            state: db.open_tree(STATE_TREE)?,
            events: db.open_tree(EVENTS_TREE)?,
            nonces: db.open_tree(NONCES_TREE)?,
            meta: db.open_tree(META_TREE)?,
        })
    }

    /// Hex id naming this database, generated on first use
    pub fn instance_id(&self) -> Result<String, StoreError> {
        let fresh: [u8; 16] = rand::random();
        let swapped =
            self.meta
                .compare_and_swap(INSTANCE_KEY, None as Option<&[u8]>, Some(&fresh[..]))?;
        let stored = match swapped {
            Ok(()) => {
                info!(
                    target: "oracle_guard::store",
                    "[STORE] new instance id {}",
                    hex::encode(fresh)
                );
                fresh.to_vec()
            }
            Err(cas) => cas.current.map(|v| v.to_vec()).unwrap_or_default(),
        };
        Ok(hex::encode(stored))
    }

    pub fn load_state(&self) -> Result<Option<ProxyState>, StoreError> {
        match self.state.get(STATE_KEY)? {
            Some(bytes) => bincode::deserialize(&bytes)
                .map(Some)
                .map_err(|e| StoreError::Codec(format!("proxy state: {e}"))),
            None => Ok(None),
        }
    }

    /// Write the record alone (first start)
    pub fn save_state(&self, state: &ProxyState) -> Result<(), StoreError> {
        self.commit(Commit {
            state: Some(state),
            ..Commit::default()
        })
    }

    /// Next nonce `address` must use
    pub fn nonce(&self, address: &Address) -> Result<u64, StoreError> {
        match self.nonces.get(address.as_bytes())? {
            Some(raw) => decode_u64(&raw),
            None => Ok(0),
        }
    }

    /// Sequence number the next notification will get
    pub fn next_seq(&self) -> Result<u64, StoreError> {
        match self.events.last()? {
            Some((key, _)) => Ok(decode_u64(&key)? + 1),
            None => Ok(0),
        }
    }

    /// Apply a call's writes atomically
    pub fn commit(&self, commit: Commit<'_>) -> Result<(), StoreError> {
        let state_bytes = commit
            .state
            .map(bincode::serialize)
            .transpose()
            .map_err(|e| StoreError::Codec(format!("proxy state: {e}")))?;
        let mut event_rows = Vec::with_capacity(commit.events.len());
        for record in commit.events {
            let row = serde_json::to_vec(record)
                .map_err(|e| StoreError::Codec(format!("event {}: {e}", record.seq)))?;
            event_rows.push((record.seq.to_be_bytes().to_vec(), row));
        }
        let nonce_row = commit
            .nonce
            .map(|(addr, next)| (addr.as_bytes().to_vec(), next.to_be_bytes().to_vec()));

        (&self.state, &self.events, &self.nonces)
            .transaction(|(state, events, nonces)| {
                if let Some(bytes) = &state_bytes {
                    state.insert(STATE_KEY, bytes.clone())?;
                }
                for (key, row) in &event_rows {
                    events.insert(key.clone(), row.clone())?;
                }
                if let Some((key, value)) = &nonce_row {
                    nonces.insert(key.clone(), value.clone())?;
                }
                Ok::<(), ConflictableTransactionError<()>>(())
            })
            .map_err(|e| StoreError::Transaction(format!("{e:?}")))?;

        debug!(
            target: "oracle_guard::store",
            "[STORE] committed state={} events={} nonce={}",
            state_bytes.is_some(),
            event_rows.len(),
            nonce_row.is_some()
        );
        Ok(())
    }

    /// Up to `limit` notifications starting at sequence `from`
    pub fn events(&self, from: u64, limit: usize) -> Result<Vec<EventRecord>, StoreError> {
        let mut out = Vec::new();
        for item in self.events.range(from.to_be_bytes()..).take(limit) {
            let (_, row) = item?;
            let record: EventRecord = serde_json::from_slice(&row)
                .map_err(|e| StoreError::Codec(format!("event row: {e}")))?;
            out.push(record);
        }
        Ok(out)
    }

    pub fn flush(&self) -> Result<usize, StoreError> {
        Ok(self.db.flush()?)
    }
}

fn decode_u64(raw: &[u8]) -> Result<u64, StoreError> {
    let bytes: [u8; 8] = raw
        .try_into()
        .map_err(|_| StoreError::Codec(format!("expected 8-byte integer, got {} bytes", raw.len())))?;
    Ok(u64::from_be_bytes(bytes))
}
