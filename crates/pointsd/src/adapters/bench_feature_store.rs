// Rust guideline compliant 2026-07-27

//! Deterministic zero-overhead adapter for the `FeatureStore` port.
//!
//! Illustrates DIP in the hexagonal architecture: `DirectReader`,
//! `CoalescingReader` and `SnapshotCache` depend only on the
//! `FeatureStore` port; swapping in `BenchFeatureStore` requires zero
//! changes to `readcache` or domain code.
//!
//! Always reports every feature active, counting calls internally so a
//! caller wiring this adapter into its own harness can cross-check
//! throughput against store-call volume if it chooses to.

use std::sync::atomic::{AtomicUsize, Ordering};

use domain::{Feature, FeatureStore, FeatureStoreError};

/// `FeatureStore` adapter that always reports a fixed, small registry.
#[derive(Debug, Default)]
pub struct BenchFeatureStore {
    calls: AtomicUsize,
}

impl BenchFeatureStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cumulative number of store calls made so far.
    #[allow(dead_code, reason = "available for callers that want to cross-check call volume; pointsd_bench doesn't read it")]
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl FeatureStore for BenchFeatureStore {
    /// # Errors
    ///
    /// Infallible; always returns `Ok(_)`.
    async fn read_features(&self) -> Result<Vec<Feature>, FeatureStoreError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok((0..4).map(|i| Feature { name: format!("f{i}"), active: true }).collect())
    }

    /// # Errors
    ///
    /// Infallible; always returns `Ok(_)`.
    async fn read_feature(&self, name: &str) -> Result<Option<Feature>, FeatureStoreError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(Some(Feature { name: name.to_owned(), active: true }))
    }
}
