// Rust guideline compliant 2026-07-27

//! Stateful batching accumulator: a single-writer in-process aggregator
//! that batches per-user credit/debit operations into transactional
//! flushes against a [`domain::Ledger`].
//!
//! [`AccumulatorHandle::submit`] is the only entry point producers use.
//! Internally, one task (the accumulator loop) owns every piece of mutable
//! state -- the pending buffer, the flush engine, the completion
//! dispatcher -- so none of it needs synchronization. Concurrency comes
//! entirely from the bounded [`tokio::sync::mpsc`] submission queue.

use std::collections::HashMap;
use std::time::Duration;

use domain::{Ledger, PointTx, SubmitError, UserBalance, UserId};
use tokio::sync::{mpsc, oneshot, watch};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Errors raised while validating an [`AccumulatorConfigBuilder::build`] call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccumulatorError {
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

/// Tuning knobs for the accumulator loop.
///
/// Defaults match the reference values: `max_batch = 7_000`,
/// `queue_capacity = 20_000`, `flush_interval = 100ms`.
#[derive(Debug, Clone)]
pub struct AccumulatorConfig {
    max_batch: usize,
    queue_capacity: usize,
    flush_interval: Duration,
}

impl AccumulatorConfig {
    #[must_use]
    pub fn builder() -> AccumulatorConfigBuilder {
        AccumulatorConfigBuilder::default()
    }

    #[must_use]
    pub fn max_batch(&self) -> usize {
        self.max_batch
    }

    #[must_use]
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    #[must_use]
    pub fn flush_interval(&self) -> Duration {
        self.flush_interval
    }
}

/// Builder for [`AccumulatorConfig`]. Unset fields fall back to the
/// reference defaults named in the module docs.
#[derive(Debug, Clone)]
pub struct AccumulatorConfigBuilder {
    max_batch: usize,
    queue_capacity: usize,
    flush_interval: Duration,
}

impl Default for AccumulatorConfigBuilder {
    fn default() -> Self {
        Self {
            max_batch: 7_000,
            queue_capacity: 20_000,
            flush_interval: Duration::from_millis(100),
        }
    }
}

impl AccumulatorConfigBuilder {
    #[must_use]
    pub fn max_batch(mut self, max_batch: usize) -> Self {
        self.max_batch = max_batch;
        self
    }

    #[must_use]
    pub fn queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    #[must_use]
    pub fn flush_interval(mut self, flush_interval: Duration) -> Self {
        self.flush_interval = flush_interval;
        self
    }

    /// Validate and build the final config.
    ///
    /// # Errors
    ///
    /// Returns [`AccumulatorError::InvalidConfig`] if `max_batch` or
    /// `queue_capacity` is zero.
    pub fn build(self) -> Result<AccumulatorConfig, AccumulatorError> {
        if self.max_batch == 0 {
            return Err(AccumulatorError::InvalidConfig {
                reason: "max_batch must be at least 1".to_owned(),
            });
        }
        if self.queue_capacity == 0 {
            return Err(AccumulatorError::InvalidConfig {
                reason: "queue_capacity must be at least 1".to_owned(),
            });
        }
        Ok(AccumulatorConfig {
            max_batch: self.max_batch,
            queue_capacity: self.queue_capacity,
            flush_interval: self.flush_interval,
        })
    }
}

// ---------------------------------------------------------------------------
// Operations and the submission queue
// ---------------------------------------------------------------------------

/// A single pending credit/debit, carried from [`AccumulatorHandle::submit`]
/// to the accumulator loop over the submission queue.
struct Operation {
    user_id: UserId,
    amount: i64,
    completion: oneshot::Sender<Result<(), SubmitError>>,
}

enum Envelope {
    Submit(Operation),
}

/// Clone-able handle producers use to submit operations and, optionally,
/// to request shutdown of the accumulator loop.
#[derive(Clone, Debug)]
pub struct AccumulatorHandle {
    queue: mpsc::Sender<Envelope>,
    shutdown: watch::Sender<ShutdownMode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShutdownMode {
    Running,
    Abandon,
    Drain,
}

impl AccumulatorHandle {
    /// Submit a credit (`amount > 0`) or debit (`amount < 0`) for `user_id`
    /// and await the outcome of the batch it is eventually flushed in.
    ///
    /// Suspends if the submission queue is full (back-pressure). Never
    /// reorders relative to other submissions for the same user made by
    /// the same caller sequence.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::Cancelled`] if the accumulator loop has
    /// already exited (e.g. shut down) and dropped its receiver.
    pub async fn submit(&self, user_id: UserId, amount: i64) -> Result<(), SubmitError> {
        let (completion, result_rx) = oneshot::channel();
        let op = Operation { user_id, amount, completion };
        self.queue
            .send(Envelope::Submit(op))
            .await
            .map_err(|_| SubmitError::Cancelled)?;
        result_rx.await.map_err(|_| SubmitError::Cancelled)?
    }

    /// Stop accepting new submissions and exit the loop without a final
    /// flush. Any operations still buffered never receive a completion
    /// (their `submit` callers observe [`SubmitError::Cancelled`] when
    /// their queue `Receiver` -- the accumulator loop's -- is dropped).
    ///
    /// This is the reference shutdown behavior (abandon-in-place).
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(ShutdownMode::Abandon);
    }

    /// Stop accepting new submissions, flush whatever is buffered, and
    /// only then exit the loop. Every operation submitted before this call
    /// receives a real completion.
    pub fn shutdown_after_drain(&self) {
        let _ = self.shutdown.send(ShutdownMode::Drain);
    }
}

// ---------------------------------------------------------------------------
// Spawning the loop
// ---------------------------------------------------------------------------

/// Spawn the accumulator loop as its own task and return a handle to it.
///
/// The returned task is the sole owner of the pending buffer, the dirty
/// balance map, and the ledger connection used for flushes -- no other
/// task ever touches them, so the loop body needs no locks.
pub fn spawn<L>(config: AccumulatorConfig, ledger: L) -> (AccumulatorHandle, tokio::task::JoinHandle<()>)
where
    L: Ledger + Send + Sync + 'static,
{
    let (queue_tx, queue_rx) = mpsc::channel(config.queue_capacity);
    let (shutdown_tx, shutdown_rx) = watch::channel(ShutdownMode::Running);

    let handle = AccumulatorHandle { queue: queue_tx, shutdown: shutdown_tx };
    let join = tokio::spawn(run_loop(config, ledger, queue_rx, shutdown_rx));
    (handle, join)
}

async fn run_loop<L>(
    config: AccumulatorConfig,
    ledger: L,
    mut queue: mpsc::Receiver<Envelope>,
    mut shutdown: watch::Receiver<ShutdownMode>,
) where
    L: Ledger,
{
    let mut buffer: Vec<Operation> = Vec::with_capacity(config.max_batch);
    let mut flush_timer = tokio::time::interval(config.flush_interval);
    flush_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            maybe_envelope = queue.recv() => {
                match maybe_envelope {
                    Some(Envelope::Submit(op)) => {
                        buffer.push(op);
                        if buffer.len() >= config.max_batch {
                            flush(&ledger, &mut buffer).await;
                        }
                    }
                    None => {
                        // All handles dropped; nothing left to ever submit.
                        flush(&ledger, &mut buffer).await;
                        log::info!("accumulator loop exiting: submission queue closed");
                        return;
                    }
                }
            }
            _ = flush_timer.tick() => {
                if !buffer.is_empty() {
                    flush(&ledger, &mut buffer).await;
                }
            }
            Ok(()) = shutdown.changed() => {
                match *shutdown.borrow() {
                    ShutdownMode::Running => {}
                    ShutdownMode::Drain => {
                        flush(&ledger, &mut buffer).await;
                        log::info!("accumulator loop exiting: drained shutdown requested");
                        return;
                    }
                    ShutdownMode::Abandon => {
                        log::info!(
                            "accumulator loop exiting: abandon shutdown requested, {} operations discarded",
                            buffer.len()
                        );
                        return;
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Flush engine + completion dispatcher
// ---------------------------------------------------------------------------

/// Apply every operation currently in `buffer` against `ledger` in one
/// atomic transaction, then resolve every operation's completion in order,
/// then clear `buffer` for reuse.
///
/// On any store failure the whole batch fails together: every operation in
/// `buffer` receives [`SubmitError::StoreFailure`], regardless of whether
/// its own balance check would otherwise have succeeded. Partial failure
/// is structurally impossible because both writes happen inside the one
/// `ledger.apply_batch` transaction.
async fn flush<L: Ledger>(ledger: &L, buffer: &mut Vec<Operation>) {
    if buffer.is_empty() {
        return;
    }

    let mut distinct_users: Vec<UserId> = buffer.iter().map(|op| op.user_id.clone()).collect();
    distinct_users.sort_unstable();
    distinct_users.dedup();

    let results = match ledger.read_balances(&distinct_users).await {
        Ok(balances) => apply_in_order(buffer, balances),
        Err(e) => {
            log::error!("flush: read_balances failed: {e}");
            Err(e)
        }
    };

    let outcomes = match results {
        Ok(FlushPlan { dirty_balances, new_txs, per_op }) => {
            match ledger.apply_batch(&dirty_balances, &new_txs).await {
                Ok(()) => per_op,
                Err(e) => {
                    log::error!("flush: apply_batch failed, batch discarded: {e}");
                    vec![Err(SubmitError::StoreFailure); buffer.len()]
                }
            }
        }
        Err(_) => vec![Err(SubmitError::StoreFailure); buffer.len()],
    };

    dispatch(buffer.drain(..), outcomes);
}

struct FlushPlan {
    dirty_balances: Vec<UserBalance>,
    new_txs: Vec<PointTx>,
    per_op: Vec<Result<(), SubmitError>>,
}

/// Apply every operation in `buffer`, in order, against an in-memory
/// working set seeded from `starting_balances`. Same-user operations
/// within the batch are applied sequentially against each other, so a
/// debit that would be rejected against the on-disk balance can still
/// succeed against an earlier credit in the same batch.
fn apply_in_order(buffer: &[Operation], starting_balances: Vec<UserBalance>) -> Result<FlushPlan, domain::LedgerError> {
    let mut working: HashMap<UserId, i64> =
        starting_balances.into_iter().map(|b| (b.user_id, b.balance)).collect();
    let mut dirty: HashMap<UserId, i64> = HashMap::new();
    let mut new_txs = Vec::with_capacity(buffer.len());
    let mut per_op = Vec::with_capacity(buffer.len());

    for op in buffer {
        let current = *working.get(&op.user_id).unwrap_or(&0);
        let next = current + op.amount;
        if next < 0 {
            per_op.push(Err(SubmitError::InsufficientBalance));
            continue;
        }

        working.insert(op.user_id.clone(), next);
        dirty.insert(op.user_id.clone(), next);
        new_txs.push(PointTx {
            id: uuid::Uuid::new_v4(),
            user_id: op.user_id.clone(),
            amount: op.amount,
            created_at: chrono::Utc::now(),
        });
        per_op.push(Ok(()));
    }

    let dirty_balances = dirty
        .into_iter()
        .map(|(user_id, balance)| UserBalance { user_id, balance })
        .collect();

    Ok(FlushPlan { dirty_balances, new_txs, per_op })
}

/// Resolve every operation's completion, in buffer order, consuming the
/// drained operations. Each send is best-effort and non-blocking by
/// construction (`oneshot` has capacity one and at most one receiver); a
/// caller who has already abandoned its `submit` call (e.g. via a timeout)
/// simply has its result dropped.
fn dispatch(ops: impl Iterator<Item = Operation>, outcomes: Vec<Result<(), SubmitError>>) {
    for (op, outcome) in ops.zip(outcomes) {
        let _ = op.completion.send(outcome);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::{AccumulatorConfig, AccumulatorError, spawn};
    use domain::{Ledger, LedgerError, PointTx, UserBalance, UserId};
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Clone, Default)]
    struct InMemoryLedger {
        balances: Arc<Mutex<std::collections::HashMap<String, i64>>>,
        txs: Arc<Mutex<Vec<PointTx>>>,
        fail_next: Arc<std::sync::atomic::AtomicBool>,
    }

    impl Ledger for InMemoryLedger {
        async fn read_balances(&self, user_ids: &[UserId]) -> Result<Vec<UserBalance>, LedgerError> {
            let balances = self.balances.lock().await;
            Ok(user_ids
                .iter()
                .map(|id| UserBalance {
                    user_id: id.clone(),
                    balance: *balances.get(id.as_str()).unwrap_or(&0),
                })
                .collect())
        }

        async fn apply_batch(&self, balances: &[UserBalance], txs: &[PointTx]) -> Result<(), LedgerError> {
            if self.fail_next.swap(false, std::sync::atomic::Ordering::SeqCst) {
                return Err(LedgerError::TxFailed { reason: "forced test failure".to_owned() });
            }
            let mut guard = self.balances.lock().await;
            for b in balances {
                guard.insert(b.user_id.as_str().to_owned(), b.balance);
            }
            drop(guard);
            self.txs.lock().await.extend(txs.iter().cloned());
            Ok(())
        }
    }

    // ACC-T01: a single credit is visible after the flush interval elapses.
    #[tokio::test]
    async fn single_credit_applies() {
        let config = AccumulatorConfig::builder()
            .flush_interval(std::time::Duration::from_millis(10))
            .build()
            .unwrap();
        let ledger = InMemoryLedger::default();
        let (handle, _join) = spawn(config, ledger.clone());

        let user = UserId::new("alice").unwrap();
        handle.submit(user.clone(), 100).await.unwrap();

        let balances = ledger.read_balances(&[user]).await.unwrap();
        assert_eq!(balances[0].balance, 100);
        handle.shutdown();
    }

    // ACC-T02: a debit that would drive the balance negative is rejected.
    #[tokio::test]
    async fn debit_below_zero_rejected() {
        let config = AccumulatorConfig::builder()
            .flush_interval(std::time::Duration::from_millis(10))
            .build()
            .unwrap();
        let ledger = InMemoryLedger::default();
        let (handle, _join) = spawn(config, ledger);

        let user = UserId::new("bob").unwrap();
        let result = handle.submit(user, -1).await;
        assert_eq!(result, Err(domain::SubmitError::InsufficientBalance));
        handle.shutdown();
    }

    // ACC-T03: a debit exactly equal to the balance succeeds (zero is a
    // legal post-debit balance).
    #[tokio::test]
    async fn debit_to_exact_zero_succeeds() {
        let config = AccumulatorConfig::builder()
            .max_batch(2)
            .flush_interval(std::time::Duration::from_secs(60))
            .build()
            .unwrap();
        let ledger = InMemoryLedger::default();
        let (handle, _join) = spawn(config, ledger.clone());

        let user = UserId::new("carol").unwrap();
        let h1 = handle.clone();
        let h2 = handle.clone();
        let u1 = user.clone();
        let u2 = user.clone();
        let (r1, r2) = tokio::join!(
            async move { h1.submit(u1, 50).await },
            async move { h2.submit(u2, -50).await },
        );
        assert!(r1.is_ok());
        assert!(r2.is_ok());

        let balances = ledger.read_balances(&[user]).await.unwrap();
        assert_eq!(balances[0].balance, 0);
        handle.shutdown();
    }

    // ACC-T04: a store failure resolves every operation in the batch with
    // StoreFailure, not a partial success.
    #[tokio::test]
    async fn store_failure_fails_whole_batch() {
        let config = AccumulatorConfig::builder()
            .max_batch(3)
            .flush_interval(std::time::Duration::from_secs(60))
            .build()
            .unwrap();
        let ledger = InMemoryLedger::default();
        ledger.fail_next.store(true, std::sync::atomic::Ordering::SeqCst);
        let (handle, _join) = spawn(config, ledger);

        let h1 = handle.clone();
        let h2 = handle.clone();
        let h3 = handle.clone();
        let (r1, r2, r3) = tokio::join!(
            async move { h1.submit(UserId::new("a").unwrap(), 10).await },
            async move { h2.submit(UserId::new("b").unwrap(), 10).await },
            async move { h3.submit(UserId::new("c").unwrap(), 10).await },
        );
        for r in [r1, r2, r3] {
            assert_eq!(r, Err(domain::SubmitError::StoreFailure));
        }
        handle.shutdown();
    }

    // ACC-T05: buffer flushes immediately once max_batch is reached,
    // without waiting for the flush interval.
    #[tokio::test]
    async fn size_trigger_flushes_before_timer() {
        let config = AccumulatorConfig::builder()
            .max_batch(2)
            .flush_interval(std::time::Duration::from_secs(60))
            .build()
            .unwrap();
        let ledger = InMemoryLedger::default();
        let (handle, _join) = spawn(config, ledger.clone());

        let h1 = handle.clone();
        let h2 = handle.clone();
        let (r1, r2) = tokio::join!(
            async move { h1.submit(UserId::new("x").unwrap(), 1).await },
            async move { h2.submit(UserId::new("y").unwrap(), 1).await },
        );
        assert!(r1.is_ok());
        assert!(r2.is_ok());
        handle.shutdown();
    }

    // ACC-T06: invalid configuration is rejected by the builder.
    #[test]
    fn zero_max_batch_rejected() {
        let result = AccumulatorConfig::builder().max_batch(0).build();
        assert_eq!(
            result,
            Err(AccumulatorError::InvalidConfig { reason: "max_batch must be at least 1".to_owned() })
        );
    }

    // ACC-T07: abandon shutdown drops in-flight submissions as Cancelled.
    #[tokio::test]
    async fn abandon_shutdown_cancels_pending() {
        let config = AccumulatorConfig::builder()
            .max_batch(10)
            .flush_interval(std::time::Duration::from_secs(60))
            .build()
            .unwrap();
        let ledger = InMemoryLedger::default();
        let (handle, join) = spawn(config, ledger);

        let pending = handle.clone();
        let submit_fut = tokio::spawn(async move { pending.submit(UserId::new("z").unwrap(), 1).await });
        tokio::task::yield_now().await;
        handle.shutdown();
        join.await.unwrap();

        let result = submit_fut.await.unwrap();
        assert_eq!(result, Err(domain::SubmitError::Cancelled));
    }
}
