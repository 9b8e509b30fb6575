//! Node state across restarts.

use std::sync::Arc;

use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use tempfile::TempDir;

use oracle_guard::oracle::playground::FeedPlayground;
use oracle_guard::store::StateStore;
use oracle_guard::{Address, Call, ManualClock, Node, OracleEndpoint, ProxyEvent, SignedCall};

fn open(dir: &TempDir, endpoint: Arc<dyn OracleEndpoint>, guardian: Address) -> Result<Node, oracle_guard::NodeError> {
    let clock = ManualClock::new(1_700_000_000);
    let store = StateStore::open(dir.path()).expect("open store");
    Node::open(store, endpoint, Arc::new(clock), guardian)
}

fn signed(node: &Node, key: &SigningKey, call: Call, nonce: u64) -> SignedCall {
    SignedCall::sign(call, nonce, node.instance_id(), key).unwrap()
}

fn playground() -> Arc<dyn OracleEndpoint> {
    Arc::new(FeedPlayground::new(Arc::new(ManualClock::new(0))))
}

#[test]
fn state_events_and_nonces_survive_restart() {
    let tmp = TempDir::new().expect("tmpdir");
    let key = SigningKey::generate(&mut OsRng);
    let guardian = Address::from_public_key(&key.verifying_key());
    let second = Address::new([7u8; 20]);

    let instance = {
        let node = open(&tmp, playground(), guardian).unwrap();
        node.submit(&signed(&node, &key, Call::AddGuardian { guardian: second }, 0)).unwrap();
        node.submit(&signed(&node, &key, Call::Pause, 1)).unwrap();
        node.submit(&signed(&node, &key, Call::Transfer { amount: 99 }, 2)).unwrap();
        node.flush().unwrap();
        node.instance_id().to_string()
    };

    // a different initial guardian is ignored once state exists
    let node = open(&tmp, playground(), Address::new([9u8; 20])).unwrap();
    assert_eq!(node.instance_id(), instance);
    let status = node.status();
    assert!(status.paused);
    assert_eq!(status.guardian_count, 2);
    assert_eq!(status.balance, "99");
    assert_eq!(status.next_event_seq, 2);
    assert!(node.is_guardian(&guardian));
    assert!(node.is_guardian(&second));
    assert!(!node.is_guardian(&Address::new([9u8; 20])));

    assert_eq!(node.nonce(&guardian).unwrap(), 3);
    let err = node.submit(&signed(&node, &key, Call::Unpause, 1)).unwrap_err();
    assert_eq!(err.code(), "NonceMismatch");

    let receipt = node.submit(&signed(&node, &key, Call::Unpause, 3)).unwrap();
    assert_eq!(receipt.event_seq, Some(2));

    let events: Vec<ProxyEvent> = node.events(0, 10).unwrap().into_iter().map(|r| r.event).collect();
    assert_eq!(
        events,
        vec![
            ProxyEvent::GuardianAdded { guardian: second },
            ProxyEvent::Paused,
            ProxyEvent::Unpaused,
        ]
    );
}

#[test]
fn refuses_a_different_oracle_endpoint() {
    let tmp = TempDir::new().expect("tmpdir");
    let guardian = Address::new([1u8; 20]);
    drop(open(&tmp, playground(), guardian).unwrap());

    let remote = oracle_guard::oracle::http::HttpOracle::new(
        "http://127.0.0.1:9",
        std::time::Duration::from_secs(1),
    )
    .unwrap();
    let err = open(&tmp, Arc::new(remote), guardian).err().unwrap();
    assert_eq!(err.code(), "EndpointMismatch");
}
