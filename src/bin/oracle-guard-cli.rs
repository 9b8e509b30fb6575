use std::{fs, path::PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use serde::Deserialize;
use serde_json::{json, Value};

use oracle_guard::types::{decode_uint, encode_uint, spot_price_query_data};
use oracle_guard::{Address, Bytes, Call, QueryId, SignedCall};

// ========= Key loading =========

#[derive(Debug, Clone, Deserialize)]
struct KeyFile {
    #[serde(default)]
    public_key: Option<String>,
    // 32-byte secret OR 64-byte keypair (hex)
    secret_key: String,
}

fn load_signing_key(keys_path: &PathBuf) -> Result<SigningKey> {
    let raw = fs::read_to_string(keys_path)
        .with_context(|| format!("reading {}", keys_path.display()))?;
    let kf: KeyFile = serde_json::from_str(&raw).context("key file should have secret_key hex")?;

    let sk_bytes = hex::decode(kf.secret_key.trim()).context("bad secret_key hex")?;
    let key = match sk_bytes.len() {
        64 => {
            let bytes: [u8; 64] = sk_bytes
                .as_slice()
                .try_into()
                .map_err(|_| anyhow!("bad 64-byte keypair"))?;
            SigningKey::from_keypair_bytes(&bytes).map_err(|e| anyhow!("bad 64-byte keypair: {e}"))?
        }
        32 => {
            let bytes: [u8; 32] = sk_bytes
                .as_slice()
                .try_into()
                .map_err(|_| anyhow!("bad 32-byte secret"))?;
            SigningKey::from_bytes(&bytes)
        }
        n => bail!("secret_key must decode to 32 or 64 bytes, got {n}"),
    };

    if let Some(pk_hex) = kf.public_key.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let derived = hex::encode(key.verifying_key().to_bytes());
        if !pk_hex.eq_ignore_ascii_case(&derived) {
            eprintln!("warning: key file public_key does not match secret_key; using derived {derived}");
        }
    }

    Ok(key)
}

// ========= CLI =========

#[derive(Parser, Debug)]
#[command(name = "oracle-guard-cli", version, about = "Guarded oracle proxy helper CLI")]
struct Cli {
    /// Base URL of the node
    #[arg(long, global = true, default_value = "http://127.0.0.1:7171")]
    node: String,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(clap::Args, Debug)]
struct SignArgs {
    /// Path to key file (JSON with secret_key hex)
    #[arg(long)]
    keys: PathBuf,

    /// Nonce to sign with; fetched from the node when omitted
    #[arg(long)]
    nonce: Option<u64>,

    /// Instance id of the target node; fetched from /status when omitted
    #[arg(long)]
    instance: Option<String>,

    /// Print the signed envelope instead of sending it
    #[arg(long = "dry-run", default_value_t = false)]
    dry_run: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a signing key
    Keygen {
        #[arg(long)]
        out: PathBuf,
        #[arg(long, default_value_t = false)]
        print: bool,
    },

    /// Print the caller address of a key file
    Address {
        #[arg(long)]
        keys: PathBuf,
    },

    /// Node status
    Status,

    AddGuardian {
        #[arg(long)]
        guardian: Address,
        #[command(flatten)]
        sign: SignArgs,
    },

    RemoveGuardian {
        #[arg(long)]
        guardian: Address,
        #[command(flatten)]
        sign: SignArgs,
    },

    Pause {
        #[command(flatten)]
        sign: SignArgs,
    },

    Unpause {
        #[command(flatten)]
        sign: SignArgs,
    },

    /// Bare value transfer to the proxy
    Transfer {
        #[arg(long)]
        amount: u128,
        #[command(flatten)]
        sign: SignArgs,
    },

    /// Delayed read of a raw query id
    Read {
        #[arg(long = "query-id")]
        query_id: QueryId,
    },

    /// Delayed spot price read
    Price {
        #[arg(long)]
        asset: String,
        #[arg(long)]
        currency: String,
    },

    /// Report a spot price to the node's development feed
    FeedSubmit {
        #[arg(long)]
        asset: String,
        #[arg(long)]
        currency: String,
        #[arg(long)]
        price: u128,
        #[arg(long, default_value_t = 0)]
        nonce: u64,
    },

    /// Dispute a report on the node's development feed
    FeedDispute {
        #[arg(long = "query-id")]
        query_id: QueryId,
        #[arg(long)]
        timestamp: u64,
    },

    /// Notification log
    Events {
        #[arg(long, default_value_t = 0)]
        from: u64,
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },
}

struct NodeClient {
    http: reqwest::blocking::Client,
    base: String,
}

impl NodeClient {
    fn new(base: &str) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .context("building http client")?;
        Ok(Self {
            http,
            base: base.trim_end_matches('/').to_string(),
        })
    }

    fn get(&self, path: &str) -> Result<Value> {
        let resp = self
            .http
            .get(format!("{}{}", self.base, path))
            .send()
            .with_context(|| format!("GET {path}"))?;
        decode(resp)
    }

    fn post(&self, path: &str, body: &Value) -> Result<Value> {
        let resp = self
            .http
            .post(format!("{}{}", self.base, path))
            .json(body)
            .send()
            .with_context(|| format!("POST {path}"))?;
        decode(resp)
    }

    fn call(&self, call: Call, sign: &SignArgs) -> Result<Value> {
        let key = load_signing_key(&sign.keys)?;
        let nonce = match sign.nonce {
            Some(n) => n,
            None => {
                let address = Address::from_public_key(&key.verifying_key());
                let v = self.get(&format!("/nonce/{address}"))?;
                v["nonce"]
                    .as_u64()
                    .ok_or_else(|| anyhow!("node returned no nonce for {address}"))?
            }
        };
        let instance = match &sign.instance {
            Some(id) => id.clone(),
            None => self.get("/status")?["instance_id"]
                .as_str()
                .ok_or_else(|| anyhow!("node returned no instance id"))?
                .to_string(),
        };
        let envelope = SignedCall::sign(call, nonce, &instance, &key)?;
        let body = serde_json::to_value(&envelope)?;
        if sign.dry_run {
            return Ok(body);
        }
        self.post("/call", &body)
    }
}

fn decode(resp: reqwest::blocking::Response) -> Result<Value> {
    let status = resp.status();
    let body: Value = resp.json().context("node answered with non-JSON body")?;
    if !status.is_success() {
        let code = body["code"].as_str().unwrap_or("Unknown");
        let error = body["error"].as_str().unwrap_or("");
        bail!("{status} {code}: {error}");
    }
    Ok(body)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = NodeClient::new(&cli.node)?;

    let out = match cli.cmd {
        Commands::Keygen { out, print } => {
            let key = SigningKey::generate(&mut OsRng);
            let obj = json!({
                "public_key": hex::encode(key.verifying_key().to_bytes()),
                "secret_key": hex::encode(key.to_bytes()),
                "address": Address::from_public_key(&key.verifying_key()),
            });
            fs::write(&out, serde_json::to_vec_pretty(&obj)?)
                .with_context(|| format!("writing {}", out.display()))?;
            if !print {
                return Ok(());
            }
            obj
        }
        Commands::Address { keys } => {
            let key = load_signing_key(&keys)?;
            json!({ "address": Address::from_public_key(&key.verifying_key()) })
        }
        Commands::Status => client.get("/status")?,
        Commands::AddGuardian { guardian, sign } => {
            client.call(Call::AddGuardian { guardian }, &sign)?
        }
        Commands::RemoveGuardian { guardian, sign } => {
            client.call(Call::RemoveGuardian { guardian }, &sign)?
        }
        Commands::Pause { sign } => client.call(Call::Pause, &sign)?,
        Commands::Unpause { sign } => client.call(Call::Unpause, &sign)?,
        Commands::Transfer { amount, sign } => client.call(Call::Transfer { amount }, &sign)?,
        Commands::Read { query_id } => client.get(&format!("/oracle/value/{query_id}"))?,
        Commands::Price { asset, currency } => {
            let query_id = QueryId::spot_price(&asset, &currency);
            let v = client.get(&format!("/oracle/value/{query_id}"))?;
            let value: Bytes = serde_json::from_value(v["value"].clone())
                .context("node returned a malformed value")?;
            let price = if value.is_empty() {
                0
            } else {
                decode_uint(value.as_slice())
                    .ok_or_else(|| anyhow!("value {value} is not a price"))?
            };
            json!({
                "asset": asset,
                "currency": currency,
                "price": price.to_string(),
                "reported_at": v["reported_at"],
            })
        }
        Commands::FeedSubmit {
            asset,
            currency,
            price,
            nonce,
        } => {
            let query_data = spot_price_query_data(&asset, &currency);
            client.post(
                "/feed/submit",
                &json!({
                    "query_id": QueryId::from_query_data(&query_data),
                    "value": encode_uint(price),
                    "nonce": nonce,
                    "query_data": Bytes(query_data),
                }),
            )?
        }
        Commands::FeedDispute {
            query_id,
            timestamp,
        } => client.post(
            "/feed/dispute",
            &json!({ "query_id": query_id, "timestamp": timestamp }),
        )?,
        Commands::Events { from, limit } => {
            client.get(&format!("/events?from={from}&limit={limit}"))?
        }
    };

    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
