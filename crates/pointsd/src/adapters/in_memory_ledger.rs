// Rust guideline compliant 2026-07-27

//! In-memory adapter for the `Ledger` port.
//!
//! Intended for proof-of-concept runs and unit tests only.

use std::collections::HashMap;
use std::sync::Mutex;

use domain::{Ledger, LedgerError, PointTx, UserBalance, UserId};

/// `Ledger` adapter backed by an in-memory balance map and transaction log.
#[allow(dead_code, reason = "used by pointsd binary; dead in pointsd_sqlite/pointsd_bench")]
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    balances: Mutex<HashMap<UserId, i64>>,
    tx_log: Mutex<Vec<PointTx>>,
}

impl InMemoryLedger {
    #[allow(dead_code, reason = "used by pointsd binary; dead in pointsd_sqlite/pointsd_bench")]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of transaction-log rows written so far. Used in tests.
    #[allow(dead_code, reason = "used by pointsd binary's tests; dead in pointsd_sqlite/pointsd_bench")]
    #[must_use]
    pub fn tx_count(&self) -> usize {
        self.tx_log.lock().expect("ledger mutex poisoned").len()
    }
}

impl Ledger for InMemoryLedger {
    async fn read_balances(&self, user_ids: &[UserId]) -> Result<Vec<UserBalance>, LedgerError> {
        let balances = self.balances.lock().expect("ledger mutex poisoned");
        Ok(user_ids
            .iter()
            .map(|id| UserBalance {
                user_id: id.clone(),
                balance: *balances.get(id).unwrap_or(&0),
            })
            .collect())
    }

    async fn apply_batch(&self, balances: &[UserBalance], txs: &[PointTx]) -> Result<(), LedgerError> {
        let mut guard = self.balances.lock().expect("ledger mutex poisoned");
        for b in balances {
            guard.insert(b.user_id.clone(), b.balance);
        }
        drop(guard);
        self.tx_log.lock().expect("ledger mutex poisoned").extend(txs.iter().cloned());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
