// Rust guideline compliant 2026-07-27

//! Points ledger entry point -- in-memory demo.
//!
//! Wires the accumulator (Core A) to the in-memory `Ledger` adapter and the
//! read cache (Core B) to the in-memory `FeatureStore` adapter, runs a
//! finite synthetic load, and prints a summary of both.
//!
//! # Usage
//!
//! ```text
//! # Show loop-level log lines
//! RUST_LOG=info cargo run --bin pointsd
//! ```

mod adapters;

use accumulator::AccumulatorConfig;
use adapters::in_memory_feature_store::InMemoryFeatureStore;
use adapters::in_memory_ledger::InMemoryLedger;
use adapters::load_gen::{LoadGenConfig, LoadGen};
use anyhow::Context as _;
use readcache::{CoalescingReader, DirectReader, ReadCacheConfig, SnapshotCache};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    // -- Core A: accumulator over an in-memory ledger --
    let acc_config = AccumulatorConfig::builder()
        .max_batch(200)
        .flush_interval(Duration::from_millis(50))
        .build()
        .context("failed to build accumulator config")?;
    let ledger = InMemoryLedger::new();
    let (handle, join) = accumulator::spawn(acc_config, ledger);

    let load_config = LoadGenConfig::builder(50)
        .user_pool_size(20)
        .submissions_per_task(30)
        .build()
        .context("failed to build load generator config")?;
    let report = LoadGen::new(load_config).run(&handle).await;

    handle.shutdown_after_drain();
    join.await.context("accumulator loop task panicked")?;

    log::info!(
        "accumulator.demo.complete: submitted={} succeeded={} insufficient_balance={} store_failures={} elapsed={:?}",
        report.submitted,
        report.succeeded,
        report.insufficient_balance,
        report.store_failures,
        report.elapsed,
    );

    // -- Core B: three reader strategies over an in-memory feature store --
    let features = InMemoryFeatureStore::new([
        ("f0".to_owned(), true),
        ("f1".to_owned(), false),
        ("f2".to_owned(), true),
    ]);
    let features = Arc::new(features);

    let direct = DirectReader::new(Arc::clone(&features));
    log::info!("direct.f0 = {}", direct.read("f0").await.context("direct read failed")?);

    let coalescing = CoalescingReader::new(Arc::clone(&features));
    log::info!("coalescing.f1 = {}", coalescing.read("f1").await.context("coalescing read failed")?);

    let cache_config = ReadCacheConfig::builder().refresh_interval(Duration::from_secs(2)).build();
    let snapshot = SnapshotCache::start(features, &cache_config).await.context("initial snapshot refresh failed")?;
    log::info!("snapshot.f2 = {}", snapshot.read("f2"));

    Ok(())
}
