// Rust guideline compliant 2026-07-27

//! Discard adapter for the `Ledger` port -- benchmark use only.
//!
//! # Measurement scope
//!
//! `BenchLedger` counts applied transactions and immediately discards
//! every batch without persisting anything. Balances always read back as
//! a large constant so debits never fail the insufficient-balance check,
//! keeping the accumulator's flush engine on its normal path without a
//! real store behind it. Throughput figures produced by `pointsd_bench`
//! therefore measure **accumulator infrastructure only** (submission
//! queue, accumulator loop, flush engine, completion dispatcher) and
//! explicitly exclude store write cost.
//!
//! If you need to benchmark a specific store backend, wire it directly in
//! a dedicated binary and measure it in isolation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use domain::{Ledger, LedgerError, PointTx, UserBalance, UserId};

/// Balance every [`BenchLedger::read_balances`] call reports, regardless of
/// user. Large enough that no plausible bench workload drives it negative.
const BENCH_BALANCE: i64 = i64::MAX / 2;

/// `Ledger` adapter that counts applied transactions and discards them.
///
/// The counter lives behind an `Arc`, so `BenchLedger` is cheaply `Clone`:
/// one clone is moved into `accumulator::spawn`, another stays with the
/// caller to read the count back after the accumulator loop task exits.
/// Intended exclusively for `pointsd_bench`; not suitable for production use.
#[derive(Debug, Clone, Default)]
pub struct BenchLedger {
    count: Arc<AtomicUsize>,
}

impl BenchLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cumulative number of transactions applied so far.
    #[must_use]
    pub fn count(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }
}

impl Ledger for BenchLedger {
    /// Always reports [`BENCH_BALANCE`] for every requested user.
    ///
    /// # Errors
    ///
    /// Infallible; always returns `Ok(_)`.
    async fn read_balances(&self, user_ids: &[UserId]) -> Result<Vec<UserBalance>, LedgerError> {
        Ok(user_ids
            .iter()
            .map(|id| UserBalance { user_id: id.clone(), balance: BENCH_BALANCE })
            .collect())
    }

    /// Increments the counter by `txs.len()` and drops both slices.
    ///
    /// # Errors
    ///
    /// Infallible; always returns `Ok(())`.
    async fn apply_batch(&self, _balances: &[UserBalance], txs: &[PointTx]) -> Result<(), LedgerError> {
        self.count.fetch_add(txs.len(), Ordering::Relaxed);
        Ok(())
    }
}
