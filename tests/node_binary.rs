//! Spawns the real node binary and talks to it over HTTP.

use std::net::TcpListener;
use std::process::Stdio;
use std::time::Duration;

use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use serde_json::Value;
use tempfile::TempDir;
use tokio::process::{Child, Command};

use oracle_guard::{Address, Call, SignedCall};

fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

async fn spawn_node(port: u16, data_dir: &str, guardian: Address) -> (String, Child) {
    let mut child = Command::new(env!("CARGO_BIN_EXE_oracle-guard"))
        .env("ORACLE_GUARD_LISTEN", format!("127.0.0.1:{port}"))
        .env("ORACLE_GUARD_DATA_DIR", data_dir)
        .env("ORACLE_GUARD_INITIAL_GUARDIAN", guardian.to_string())
        .env("ORACLE_GUARD_ORACLE_MODE", "playground")
        .env("ORACLE_GUARD_LOG", "warn")
        .stdout(Stdio::null())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .expect("failed to spawn node process");

    let client = reqwest::Client::new();
    let base = format!("http://127.0.0.1:{port}");
    for _ in 0..100 {
        if let Ok(resp) = client.get(format!("{base}/health")).send().await {
            if resp.status().is_success() {
                return (base, child);
            }
        }
        if let Ok(Some(status)) = child.try_wait() {
            panic!("node exited early: {status}");
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    let _ = child.kill().await;
    panic!("node did not become healthy on {base}");
}

#[tokio::test]
async fn binary_serves_signed_calls() {
    let tmp = TempDir::new().expect("tmpdir");
    let data_dir = tmp.path().join("db").to_string_lossy().to_string();
    let key = SigningKey::generate(&mut OsRng);
    let guardian = Address::from_public_key(&key.verifying_key());

    let (base, mut child) = spawn_node(free_port(), &data_dir, guardian).await;
    let client = reqwest::Client::new();

    let status: Value = client
        .get(format!("{base}/status"))
        .send()
        .await
        .expect("get /status")
        .json()
        .await
        .expect("status json");
    let instance = status["instance_id"].as_str().expect("instance id").to_string();

    let envelope = SignedCall::sign(Call::Pause, 0, &instance, &key).unwrap();
    let resp = client
        .post(format!("{base}/call"))
        .json(&envelope)
        .send()
        .await
        .expect("post /call");
    assert!(resp.status().is_success());

    let status: Value = client
        .get(format!("{base}/status"))
        .send()
        .await
        .expect("get /status")
        .json()
        .await
        .expect("status json");
    assert_eq!(status["paused"], true);
    assert_eq!(status["guardian_count"], 1);

    let _ = child.kill().await;
}
