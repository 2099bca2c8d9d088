// Rust guideline compliant 2026-07-27

//! Throughput benchmark entry point.
//!
//! Measures Core A (the batching accumulator) and Core B (the three read
//! strategies) in isolation, each across a range of concurrency levels.
//! Each configuration is run `ROUNDS` times; min/avg/max throughput is
//! printed to stdout.
//!
//! # Measurement scope
//!
//! Core A runs the accumulator over [`BenchLedger`], a discard adapter that
//! counts applied transactions and never touches a real store. Core B runs
//! the three readers over [`BenchFeatureStore`], which always reports every
//! feature active with no artificial latency. Both benchmarks therefore
//! measure **in-process infrastructure only** -- submission queue,
//! accumulator loop, flush engine and completion dispatch for Core A; the
//! coalescing map and snapshot swap for Core B -- and explicitly exclude
//! store I/O cost. Store-bound throughput depends entirely on the adapter
//! wired in front of a real backend and is not represented here.
//!
//! Because [`BenchFeatureStore`] never blocks, `CoalescingReader`'s
//! deduplication has nothing to coalesce against in this benchmark: every
//! call already returns before a second one could join it. The reported
//! numbers still show the reader's per-call overhead relative to
//! `DirectReader` and `SnapshotCache`; they do not demonstrate the latency
//! collapse coalescing provides under real store latency.
//!
//! No `env_logger::init()`: log macros compile to no-ops, eliminating log
//! I/O overhead from measurements.
//!
//! # Usage
//!
//! ```text
//! # Quick sanity check (debug build)
//! cargo build --bin pointsd_bench
//!
//! # Accurate throughput numbers (release build)
//! cargo run --bin pointsd_bench --release
//! ```

mod adapters;

// Load bench-only adapters into this binary's module tree only. Same
// #[path] technique as main_sqlite.rs: avoids dead_code warnings in the
// other two binaries.
#[path = "adapters/bench_ledger.rs"]
mod bench_ledger;
#[path = "adapters/bench_feature_store.rs"]
mod bench_feature_store;

use std::sync::Arc;
use std::time::{Duration, Instant};

use accumulator::AccumulatorConfig;
use adapters::load_gen::{LoadGen, LoadGenConfig};
use bench_feature_store::BenchFeatureStore;
use bench_ledger::BenchLedger;
use readcache::{CoalescingReader, DirectReader, ReadCacheConfig, SnapshotCache};

// ---------------------------------------------------------------------------
// Benchmark parameters
// ---------------------------------------------------------------------------

/// Submissions each simulated producer task issues, per Core A run.
const SUBMISSIONS_PER_TASK: u64 = 500;

/// Reads each simulated reader task issues, per Core B run.
const READS_PER_TASK: u64 = 500;

/// Number of runs averaged per concurrency level.
const ROUNDS: u32 = 5;

/// Concurrency levels exercised by both benchmarks.
const CONCURRENCY_LEVELS: &[usize] = &[10, 50, 100, 500, 1_000];

// ---------------------------------------------------------------------------
// Core A: accumulator throughput
// ---------------------------------------------------------------------------

/// Run one accumulator pipeline at `concurrency`; return `(applied_tx, elapsed)`.
///
/// # Errors
///
/// Returns an error if the accumulator or load generator config builder
/// rejects its parameters.
async fn run_accumulator_bench(concurrency: usize) -> anyhow::Result<(usize, Duration)> {
    let acc_config = AccumulatorConfig::builder()
        .max_batch(7_000)
        .queue_capacity(20_000)
        .flush_interval(Duration::ZERO)
        .build()?;
    let ledger = BenchLedger::new();
    let counter = ledger.clone();
    let (handle, join) = accumulator::spawn(acc_config, ledger);

    let load_config = LoadGenConfig::builder(concurrency)
        .user_pool_size(concurrency.max(1) * 4)
        .submissions_per_task(SUBMISSIONS_PER_TASK)
        .seed(42)
        .build()?;

    let start = Instant::now();
    let _report = LoadGen::new(load_config).run(&handle).await;
    handle.shutdown_after_drain();
    join.await.map_err(|e| anyhow::anyhow!("accumulator loop task panicked: {e}"))?;
    let elapsed = start.elapsed();

    Ok((counter.count(), elapsed))
}

// ---------------------------------------------------------------------------
// Core B: read-path throughput
// ---------------------------------------------------------------------------

/// Which reader strategy a Core B run exercises.
#[derive(Clone, Copy)]
enum ReadPath {
    Direct,
    Coalescing,
    Snapshot,
}

impl ReadPath {
    const ALL: [Self; 3] = [Self::Direct, Self::Coalescing, Self::Snapshot];

    fn label(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Coalescing => "coalescing",
            Self::Snapshot => "snapshot",
        }
    }
}

/// Run one read-path benchmark at `concurrency`; return `(total_reads, elapsed)`.
///
/// # Errors
///
/// Returns an error if [`SnapshotCache::start`]'s initial refresh fails.
async fn run_readcache_bench(path: ReadPath, concurrency: usize) -> anyhow::Result<(usize, Duration)> {
    let store = Arc::new(BenchFeatureStore::new());

    let start = Instant::now();
    let total_reads = match path {
        ReadPath::Direct => {
            let reader = Arc::new(DirectReader::new(Arc::clone(&store)));
            spawn_readers(concurrency, move || {
                let reader = Arc::clone(&reader);
                async move { reader.read("f0").await.is_ok() }
            })
            .await
        }
        ReadPath::Coalescing => {
            let reader = Arc::new(CoalescingReader::new(Arc::clone(&store)));
            spawn_readers(concurrency, move || {
                let reader = Arc::clone(&reader);
                async move { reader.read("f0").await.is_ok() }
            })
            .await
        }
        ReadPath::Snapshot => {
            let cache_config = ReadCacheConfig::builder().refresh_interval(Duration::from_secs(60)).build();
            let cache = SnapshotCache::start(Arc::clone(&store), &cache_config).await?;
            spawn_readers(concurrency, move || {
                let cache = Arc::clone(&cache);
                async move { cache.read("f0") }
            })
            .await
        }
    };
    let elapsed = start.elapsed();

    Ok((total_reads, elapsed))
}

/// Spawn `concurrency` tasks, each calling `make_read` [`READS_PER_TASK`]
/// times in sequence; return the number of reads that completed.
async fn spawn_readers<F, Fut>(concurrency: usize, make_read: F) -> usize
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = bool> + Send,
{
    let make_read = Arc::new(make_read);
    let mut tasks = Vec::with_capacity(concurrency);
    for _ in 0..concurrency {
        let make_read = Arc::clone(&make_read);
        tasks.push(tokio::spawn(async move {
            let mut ok_count = 0usize;
            for _ in 0..READS_PER_TASK {
                if make_read().await {
                    ok_count += 1;
                }
            }
            ok_count
        }));
    }
    let mut total = 0usize;
    for task in tasks {
        total += task.await.expect("reader task panicked");
    }
    total
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    println!("Core A: accumulator throughput (store cost excluded)");
    println!(
        "{:>12} | {:>12} | {:>12} | {:>12} | {:>12}",
        "concurrency", "total_tx", "min tx/s", "avg tx/s", "max tx/s"
    );
    println!("{:-<13}+{:-<14}+{:-<14}+{:-<14}+{:-<13}", "", "", "", "", "");

    for &concurrency in CONCURRENCY_LEVELS {
        let mut total_tx_first = 0usize;
        let mut min_tps = f64::MAX;
        let mut max_tps = 0.0_f64;
        let mut sum_tps = 0.0_f64;

        for round in 0..ROUNDS {
            let (total_tx, elapsed) = run_accumulator_bench(concurrency).await?;
            let tps = total_tx as f64 / elapsed.as_secs_f64();
            if round == 0 {
                total_tx_first = total_tx;
            }
            min_tps = min_tps.min(tps);
            max_tps = max_tps.max(tps);
            sum_tps += tps;
        }
        let avg_tps = sum_tps / f64::from(ROUNDS);

        println!(
            "{:>12} | {:>12} | {:>12} | {:>12} | {:>12}",
            fmt_number(concurrency),
            fmt_number(total_tx_first),
            fmt_number(min_tps as usize),
            fmt_number(avg_tps as usize),
            fmt_number(max_tps as usize),
        );
    }

    println!();
    println!("Core B: read-path throughput (store cost excluded)");
    println!(
        "{:>12} | {:>12} | {:>12} | {:>12} | {:>12}",
        "path/conc.", "total_reads", "min req/s", "avg req/s", "max req/s"
    );
    println!("{:-<13}+{:-<14}+{:-<14}+{:-<14}+{:-<13}", "", "", "", "", "");

    for path in ReadPath::ALL {
        for &concurrency in CONCURRENCY_LEVELS {
            let mut total_reads_first = 0usize;
            let mut min_rps = f64::MAX;
            let mut max_rps = 0.0_f64;
            let mut sum_rps = 0.0_f64;

            for round in 0..ROUNDS {
                let (total_reads, elapsed) = run_readcache_bench(path, concurrency).await?;
                let rps = total_reads as f64 / elapsed.as_secs_f64();
                if round == 0 {
                    total_reads_first = total_reads;
                }
                min_rps = min_rps.min(rps);
                max_rps = max_rps.max(rps);
                sum_rps += rps;
            }
            let avg_rps = sum_rps / f64::from(ROUNDS);

            println!(
                "{:>12} | {:>12} | {:>12} | {:>12} | {:>12}",
                format!("{}/{concurrency}", path.label()),
                fmt_number(total_reads_first),
                fmt_number(min_rps as usize),
                fmt_number(avg_rps as usize),
                fmt_number(max_rps as usize),
            );
        }
    }

    Ok(())
}

/// Format a `usize` with space-separated thousands groups (e.g. `1 234 567`).
fn fmt_number(n: usize) -> String {
    let s = n.to_string();
    let mut out = String::with_capacity(s.len() + s.len() / 3);
    for (i, ch) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            out.push(' ');
        }
        out.push(ch);
    }
    out.chars().rev().collect()
}
