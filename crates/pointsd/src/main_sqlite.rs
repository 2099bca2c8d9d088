// Rust guideline compliant 2026-07-27

//! Points ledger entry point -- `SQLite` storage demo.
//!
//! Wires the accumulator (Core A) to `SqliteLedger` and the read cache
//! (Core B) to `SqliteFeatureStore`, runs a synthetic load against Core A,
//! and exposes four demonstration HTTP routes for Core B's three reader
//! strategies. This demonstrates that both hexagonal ports are truly
//! swappable: only this entry point and the adapter modules change; the
//! `accumulator`, `readcache` and `domain` crates are untouched.
//!
//! The HTTP surface below is a demonstration aid only, not part of the
//! core contract -- see `domain::FeatureStore` for the port it reads
//! through.
//!
//! # Usage
//!
//! ```text
//! RUST_LOG=info cargo run --bin pointsd_sqlite
//! curl localhost:8080/f0
//! ```

mod adapters;

// Loaded directly so they only enter this binary's module tree, avoiding
// dead_code warnings in the `pointsd` and `pointsd_bench` binaries.
#[path = "adapters/sqlite_ledger.rs"]
mod sqlite_ledger;
#[path = "adapters/sqlite_feature_store.rs"]
mod sqlite_feature_store;

use accumulator::AccumulatorConfig;
use adapters::load_gen::{LoadGen, LoadGenConfig};
use anyhow::Context as _;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use readcache::{CoalescingReader, DirectReader, ReadCacheConfig, SnapshotCache};
use sqlite_feature_store::SqliteFeatureStore;
use sqlite_ledger::SqliteLedger;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::Instrument as _;

/// Database file created in the current working directory on first run.
///
/// Read from the `DB_URL` environment variable when set, matching the
/// reference configuration surface; falls back to a local file so the demo
/// works out of the box.
fn db_url() -> String {
    std::env::var("DB_URL").unwrap_or_else(|_| "sqlite:pointsd.db".to_owned())
}

/// Connection pool size, matching the reference value of 30.
const MAX_CONNECTIONS: u32 = 30;

#[derive(Clone)]
struct ReadPaths {
    direct: Arc<DirectReader<Arc<SqliteFeatureStore>>>,
    coalescing: Arc<CoalescingReader<Arc<SqliteFeatureStore>>>,
    snapshot: Arc<SnapshotCache<Arc<SqliteFeatureStore>>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let url = db_url();

    // -- Core A: accumulator over a SQLite-backed ledger --
    let acc_config = AccumulatorConfig::builder()
        .max_batch(7_000)
        .queue_capacity(20_000)
        .flush_interval(Duration::from_millis(100))
        .build()
        .context("failed to build accumulator config")?;
    let ledger = SqliteLedger::new(&url, MAX_CONNECTIONS).await.context("failed to open SQLite ledger")?;
    let (acc_handle, acc_join) = accumulator::spawn(acc_config, ledger);

    let load_config = LoadGenConfig::builder(200)
        .user_pool_size(3_900)
        .submissions_per_task(25)
        .build()
        .context("failed to build load generator config")?;
    let acc_handle_for_load = acc_handle.clone();
    let load_task = tokio::spawn(
        async move { LoadGen::new(load_config).run(&acc_handle_for_load).await }
            .instrument(tracing::info_span!("load_gen")),
    );

    // -- Core B: three reader strategies over a SQLite-backed feature store --
    let feature_store = SqliteFeatureStore::new(&url, MAX_CONNECTIONS).await.context("failed to open SQLite feature store")?;
    for (name, active) in [("f0", true), ("f1", false), ("f2", true), ("f3", false)] {
        feature_store.set_feature(name, active).await.context("failed to seed demo feature")?;
    }
    let feature_store = Arc::new(feature_store);

    let cache_config = ReadCacheConfig::builder().refresh_interval(Duration::from_secs(2)).build();
    let read_paths = ReadPaths {
        direct: Arc::new(DirectReader::new(Arc::clone(&feature_store))),
        coalescing: Arc::new(CoalescingReader::new(Arc::clone(&feature_store))),
        snapshot: SnapshotCache::start(feature_store, &cache_config)
            .await
            .context("initial snapshot refresh failed")?,
    };

    let app = Router::new()
        .route("/f0", get(handle_direct))
        .route("/f1", get(handle_coalescing))
        .route("/f2", get(handle_snapshot_f2))
        .route("/f3", get(handle_snapshot_f3))
        .with_state(read_paths);

    let listener = TcpListener::bind("0.0.0.0:8080").await.context("failed to bind HTTP listener")?;
    tracing::info!("pointsd_sqlite.listening: addr=0.0.0.0:8080");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("main.shutdown: ctrl_c received");
        }
        result = axum::serve(listener, app) => {
            result.context("HTTP server failed")?;
        }
    }

    let report = load_task.await.context("load generator task panicked")?;
    tracing::info!(
        submitted = report.submitted,
        succeeded = report.succeeded,
        insufficient_balance = report.insufficient_balance,
        store_failures = report.store_failures,
        "load_gen.complete"
    );

    acc_handle.shutdown_after_drain();
    acc_join.await.context("accumulator loop task panicked")?;

    Ok(())
}

/// `/f0` -- read via [`DirectReader`].
async fn handle_direct(
    State(paths): State<ReadPaths>,
) -> Result<&'static str, (StatusCode, &'static str)> {
    respond(paths.direct.read("f0").await)
}

/// `/f1` -- read via [`CoalescingReader`].
async fn handle_coalescing(
    State(paths): State<ReadPaths>,
) -> Result<&'static str, (StatusCode, &'static str)> {
    respond(paths.coalescing.read("f1").await)
}

/// `/f2` -- read via [`SnapshotCache`]. Infallible, since the snapshot
/// cache never touches the store on the read path.
async fn handle_snapshot_f2(State(paths): State<ReadPaths>) -> &'static str {
    if paths.snapshot.read("f2") { "ok" } else { "feature is not active" }
}

/// `/f3` -- read via [`SnapshotCache`].
async fn handle_snapshot_f3(State(paths): State<ReadPaths>) -> &'static str {
    if paths.snapshot.read("f3") { "ok" } else { "feature is not active" }
}

fn respond(result: Result<bool, domain::FeatureStoreError>) -> Result<&'static str, (StatusCode, &'static str)> {
    match result {
        Ok(true) => Ok("ok"),
        Ok(false) => Ok("feature is not active"),
        Err(_) => Err((StatusCode::INTERNAL_SERVER_ERROR, "internal error")),
    }
}
