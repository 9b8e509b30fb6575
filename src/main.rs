use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use oracle_guard::config::{Config, OracleMode};
use oracle_guard::oracle::http::HttpOracle;
use oracle_guard::oracle::playground::FeedPlayground;
use oracle_guard::routes::{self, AppState};
use oracle_guard::store::StateStore;
use oracle_guard::{Clock, Node, OracleEndpoint, SystemClock};

#[derive(Parser, Debug)]
#[command(name = "oracle-guard", version, about = "Guarded oracle proxy node")]
struct Args {
    /// TOML config file; ORACLE_GUARD_* variables override it
    #[arg(long, short)]
    config: Option<PathBuf>,
}

fn init_tracing() {
    // ORACLE_GUARD_LOG wins over RUST_LOG
    let filter = std::env::var("ORACLE_GUARD_LOG")
        .unwrap_or_else(|_| std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()));
    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

// The blocking reqwest client owns its own runtime and must not be created or
// dropped on the async reactor, so the node is built before the tokio runtime
// and outlives it.
fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let config = Config::load(args.config.as_deref()).context("loading configuration")?;
    let guardian = config
        .node
        .initial_guardian
        .context("node.initial_guardian is required")?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let (endpoint, feed): (Arc<dyn OracleEndpoint>, Option<FeedPlayground>) =
        match config.oracle.mode {
            OracleMode::Playground => {
                let feed = FeedPlayground::new(clock.clone());
                (Arc::new(feed.clone()), Some(feed))
            }
            OracleMode::Http => {
                let url = config
                    .oracle
                    .url
                    .as_deref()
                    .context("oracle.url is required in http mode")?;
                let oracle = HttpOracle::new(url, Duration::from_secs(config.oracle.timeout_secs))
                    .context("building oracle client")?;
                (Arc::new(oracle), None)
            }
        };

    let store = StateStore::open(&config.node.data_dir)
        .with_context(|| format!("opening database at {}", config.node.data_dir))?;
    let node = Arc::new(Node::open(store, endpoint, clock, guardian).context("opening proxy")?);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;
    let result = runtime.block_on(serve(config, node.clone(), feed));
    drop(runtime);

    if let Err(e) = node.flush() {
        warn!(target: "oracle_guard::node", "[NODE] final flush failed: {}", e);
    }
    result
}

async fn serve(config: Config, node: Arc<Node>, feed: Option<FeedPlayground>) -> Result<()> {
    let hosts_feed = feed.is_some();
    let app = routes::create_router(AppState {
        node: node.clone(),
        feed,
    });
    let app = routes::with_layers(app, &config.node);

    let listener = tokio::net::TcpListener::bind(config.node.listen.as_str())
        .await
        .with_context(|| format!("binding {}", config.node.listen))?;
    let status = node.status();
    info!(
        target: "oracle_guard::node",
        "[NODE] listening on {} (oracle={}, feed={}, guardians={}, paused={})",
        config.node.listen,
        status.oracle_endpoint,
        hosts_feed,
        status.guardian_count,
        status.paused
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!(target: "oracle_guard::node", "[NODE] shutting down");
            if let Err(e) = node.flush() {
                warn!(target: "oracle_guard::node", "[NODE] flush on shutdown failed: {}", e);
            }
        })
        .await
        .context("serving http")?;
    Ok(())
}
