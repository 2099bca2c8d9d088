// Rust guideline compliant 2026-07-27

//! In-memory adapter for the `FeatureStore` port.
//!
//! Intended for proof-of-concept runs and unit tests only.

use std::collections::HashMap;
use std::sync::Mutex;

use domain::{Feature, FeatureStore, FeatureStoreError};

/// `FeatureStore` adapter backed by an in-memory map.
#[allow(dead_code, reason = "used by pointsd binary; dead in pointsd_sqlite/pointsd_bench")]
#[derive(Debug)]
pub struct InMemoryFeatureStore {
    features: Mutex<HashMap<String, bool>>,
}

impl InMemoryFeatureStore {
    #[allow(dead_code, reason = "used by pointsd binary; dead in pointsd_sqlite/pointsd_bench")]
    #[must_use]
    pub fn new(seed: impl IntoIterator<Item = (String, bool)>) -> Self {
        Self { features: Mutex::new(seed.into_iter().collect()) }
    }
}

impl FeatureStore for InMemoryFeatureStore {
    async fn read_features(&self) -> Result<Vec<Feature>, FeatureStoreError> {
        let features = self.features.lock().expect("feature store mutex poisoned");
        Ok(features.iter().map(|(name, &active)| Feature { name: name.clone(), active }).collect())
    }

    async fn read_feature(&self, name: &str) -> Result<Option<Feature>, FeatureStoreError> {
        let features = self.features.lock().expect("feature store mutex poisoned");
        Ok(features.get(name).map(|&active| Feature { name: name.to_owned(), active }))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
