// Rust guideline compliant 2026-07-27

//! Synthetic load generator for the Core A demo and benchmark binaries.
//!
//! Unlike the teacher's single-task `Producer`, real concurrent load
//! against [`accumulator::AccumulatorHandle`] requires many independent
//! callers -- the point of Core A is that thousands of producers contend
//! on one bounded queue. Each spawned task gets its own seeded RNG rather
//! than sharing one behind a `RefCell`, since no two tasks ever touch the
//! same generator: ownership, not interior mutability, is the right tool
//! here.

use std::time::Duration;

use accumulator::AccumulatorHandle;
use domain::{SubmitError, UserId};
use rand::{Rng, SeedableRng, rngs::StdRng};

/// Errors raised while validating a [`LoadGenConfigBuilder::build`] call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadGenError {
    #[error("invalid load generator configuration: {reason}")]
    InvalidConfig { reason: String },
}

/// Runtime configuration for [`LoadGen`].
#[derive(Debug, Clone)]
pub struct LoadGenConfig {
    user_pool_size: usize,
    concurrency: usize,
    submissions_per_task: u64,
    amount_range: (i64, i64),
    seed: Option<u64>,
}

impl LoadGenConfig {
    /// `concurrency` (number of simulated producer tasks) is the only
    /// required parameter. Defaults: `user_pool_size = 100`,
    /// `submissions_per_task = 50`, `amount_range = (-500, 500)`,
    /// `seed = None` (OS-seeded).
    #[must_use]
    pub fn builder(concurrency: usize) -> LoadGenConfigBuilder {
        LoadGenConfigBuilder {
            concurrency,
            user_pool_size: 100,
            submissions_per_task: 50,
            amount_range: (-500, 500),
            seed: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadGenConfigBuilder {
    concurrency: usize,
    user_pool_size: usize,
    submissions_per_task: u64,
    amount_range: (i64, i64),
    seed: Option<u64>,
}

impl LoadGenConfigBuilder {
    #[must_use]
    pub fn user_pool_size(mut self, user_pool_size: usize) -> Self {
        self.user_pool_size = user_pool_size;
        self
    }

    #[must_use]
    pub fn submissions_per_task(mut self, submissions_per_task: u64) -> Self {
        self.submissions_per_task = submissions_per_task;
        self
    }

    #[must_use]
    pub fn amount_range(mut self, low: i64, high: i64) -> Self {
        self.amount_range = (low, high);
        self
    }

    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// # Errors
    ///
    /// Returns [`LoadGenError::InvalidConfig`] if `concurrency` is zero or
    /// `amount_range` is empty (`low >= high`).
    pub fn build(self) -> Result<LoadGenConfig, LoadGenError> {
        if self.concurrency == 0 {
            return Err(LoadGenError::InvalidConfig { reason: "concurrency must be at least 1".to_owned() });
        }
        if self.amount_range.0 >= self.amount_range.1 {
            return Err(LoadGenError::InvalidConfig { reason: "amount_range low must be < high".to_owned() });
        }
        Ok(LoadGenConfig {
            user_pool_size: self.user_pool_size,
            concurrency: self.concurrency,
            submissions_per_task: self.submissions_per_task,
            amount_range: self.amount_range,
            seed: self.seed,
        })
    }
}

/// Aggregate outcome of a [`LoadGen::run`] call.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadGenReport {
    pub submitted: u64,
    pub succeeded: u64,
    pub insufficient_balance: u64,
    pub store_failures: u64,
    pub cancelled: u64,
    pub elapsed: Duration,
}

/// Spawns `concurrency` concurrent tasks, each submitting
/// `submissions_per_task` random credit/debit operations against an
/// [`AccumulatorHandle`], and reports the aggregate outcome.
#[derive(Debug)]
pub struct LoadGen {
    config: LoadGenConfig,
}

impl LoadGen {
    #[must_use]
    pub fn new(config: LoadGenConfig) -> Self {
        Self { config }
    }

    pub async fn run(&self, handle: &AccumulatorHandle) -> LoadGenReport {
        let start = tokio::time::Instant::now();
        let mut tasks = Vec::with_capacity(self.config.concurrency);

        for task_idx in 0..self.config.concurrency {
            let handle = handle.clone();
            let user_pool_size = self.config.user_pool_size;
            let submissions = self.config.submissions_per_task;
            let (low, high) = self.config.amount_range;
            let mut rng = match self.config.seed {
                Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(task_idx as u64)),
                None => StdRng::from_os_rng(),
            };

            tasks.push(tokio::spawn(async move {
                let mut outcomes = Vec::with_capacity(submissions as usize);
                for _ in 0..submissions {
                    let user_idx = rng.random_range(0..user_pool_size);
                    let amount = rng.random_range(low..high);
                    let user_id = UserId::new(format!("user-{user_idx}")).expect("non-empty synthetic id");
                    outcomes.push(handle.submit(user_id, amount).await);
                }
                outcomes
            }));
        }

        let mut report = LoadGenReport::default();
        for task in tasks {
            let outcomes = task.await.expect("load generator task panicked");
            for outcome in outcomes {
                report.submitted += 1;
                match outcome {
                    Ok(()) => report.succeeded += 1,
                    Err(SubmitError::InsufficientBalance) => report.insufficient_balance += 1,
                    Err(SubmitError::StoreFailure) => report.store_failures += 1,
                    Err(SubmitError::Cancelled | SubmitError::InvalidUser) => report.cancelled += 1,
                }
            }
        }
        report.elapsed = start.elapsed();
        report
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::{LoadGen, LoadGenConfig, LoadGenError};
    use accumulator::AccumulatorConfig;
    use domain::{Ledger, LedgerError, PointTx, UserBalance, UserId};
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct UnlimitedLedger {
        balances: Mutex<HashMap<UserId, i64>>,
    }

    impl Ledger for UnlimitedLedger {
        async fn read_balances(&self, user_ids: &[UserId]) -> Result<Vec<UserBalance>, LedgerError> {
            let balances = self.balances.lock().unwrap();
            Ok(user_ids
                .iter()
                .map(|id| UserBalance { user_id: id.clone(), balance: *balances.get(id).unwrap_or(&1_000_000) })
                .collect())
        }

        async fn apply_batch(&self, balances: &[UserBalance], _txs: &[PointTx]) -> Result<(), LedgerError> {
            let mut guard = self.balances.lock().unwrap();
            for b in balances {
                guard.insert(b.user_id.clone(), b.balance);
            }
            Ok(())
        }
    }

    // LG-T01: zero concurrency is rejected.
    #[test]
    fn zero_concurrency_rejected() {
        assert_eq!(
            LoadGenConfig::builder(0).build(),
            Err(LoadGenError::InvalidConfig { reason: "concurrency must be at least 1".to_owned() })
        );
    }

    // LG-T02: every submission gets an outcome and the counts are consistent.
    #[tokio::test]
    async fn run_reports_every_submission() {
        let acc_config = AccumulatorConfig::builder()
            .flush_interval(std::time::Duration::from_millis(5))
            .build()
            .unwrap();
        let (handle, _join) = accumulator::spawn(acc_config, UnlimitedLedger::default());

        let load_config = LoadGenConfig::builder(8).submissions_per_task(10).seed(42).build().unwrap();
        let report = LoadGen::new(load_config).run(&handle).await;

        assert_eq!(report.submitted, 80);
        assert_eq!(report.succeeded + report.insufficient_balance + report.store_failures + report.cancelled, 80);
        handle.shutdown();
    }
}
