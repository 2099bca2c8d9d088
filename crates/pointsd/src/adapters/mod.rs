// Rust guideline compliant 2026-07-27

//! Adapters implementing `domain`'s `Ledger` and `FeatureStore` ports, plus
//! the synthetic load generator shared by the demo and benchmark binaries.
//!
//! `sqlite_ledger`, `sqlite_feature_store`, `bench_ledger` and
//! `bench_feature_store` are loaded directly via `#[path = ...]` in the
//! binaries that use them, so each stays out of the other binaries' module
//! trees and never triggers a dead-code warning there.

pub mod in_memory_feature_store;
pub mod in_memory_ledger;
pub mod load_gen;
