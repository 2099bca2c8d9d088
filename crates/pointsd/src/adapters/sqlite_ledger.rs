// Rust guideline compliant 2026-07-27

//! SQLite adapter for the `Ledger` port.
//!
//! Persists `user_points` and `point_txs` rows via `sqlx`. Every flush is
//! applied inside one `sqlx::Transaction` so the balance upserts and the
//! transaction-log inserts commit or roll back as a unit.

use domain::{Ledger, LedgerError, PointTx, UserBalance, UserId};

/// `Ledger` adapter backed by a SQLite database file via `sqlx`.
#[derive(Debug, Clone)]
pub struct SqliteLedger {
    pool: sqlx::SqlitePool,
}

impl SqliteLedger {
    /// Open or create a SQLite database and initialize the schema.
    ///
    /// Passes `create_if_missing(true)` so the database file is created on
    /// first run without manual setup.
    ///
    /// # Errors
    ///
    /// Returns `sqlx::Error` when the connection or schema creation fails.
    pub async fn new(db_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let opts = db_url.parse::<sqlx::sqlite::SqliteConnectOptions>()?.create_if_missing(true);
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(opts)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS user_points (
                user_id TEXT    PRIMARY KEY,
                balance INTEGER NOT NULL
            )",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS point_txs (
                id         TEXT    PRIMARY KEY,
                user_id    TEXT    NOT NULL,
                amount     INTEGER NOT NULL,
                created_at TEXT    NOT NULL
            )",
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }
}

impl Ledger for SqliteLedger {
    /// Read current balances for `user_ids`. Users with no row default to
    /// a balance of zero.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Unavailable` on any `sqlx` error. The
    /// underlying error is logged at `error` level before mapping.
    async fn read_balances(&self, user_ids: &[UserId]) -> Result<Vec<UserBalance>, LedgerError> {
        let mut out = Vec::with_capacity(user_ids.len());
        for id in user_ids {
            let row: Option<i64> = sqlx::query_scalar("SELECT balance FROM user_points WHERE user_id = ?")
                .bind(id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    log::error!("sqlite_ledger.read_balances: {e}");
                    LedgerError::Unavailable
                })?;
            out.push(UserBalance { user_id: id.clone(), balance: row.unwrap_or(0) });
        }
        Ok(out)
    }

    /// Upsert `balances` and append `txs` inside a single transaction.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::TxFailed` if the transaction cannot be
    /// committed; the transaction is rolled back in that case. The
    /// underlying error is logged at `error` level before mapping.
    async fn apply_batch(&self, balances: &[UserBalance], txs: &[PointTx]) -> Result<(), LedgerError> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            log::error!("sqlite_ledger.apply_batch: begin failed: {e}");
            LedgerError::TxFailed { reason: e.to_string() }
        })?;

        for b in balances {
            sqlx::query(
                "INSERT INTO user_points (user_id, balance) VALUES (?, ?)
                 ON CONFLICT(user_id) DO UPDATE SET balance = excluded.balance",
            )
            .bind(b.user_id.as_str())
            .bind(b.balance)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                log::error!("sqlite_ledger.apply_batch: upsert_balance failed: {e}");
                LedgerError::TxFailed { reason: e.to_string() }
            })?;
        }

        for t in txs {
            sqlx::query("INSERT INTO point_txs (id, user_id, amount, created_at) VALUES (?, ?, ?, ?)")
                .bind(t.id.to_string())
                .bind(t.user_id.as_str())
                .bind(t.amount)
                .bind(t.created_at.to_rfc3339())
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    log::error!("sqlite_ledger.apply_batch: insert_tx_log failed: {e}");
                    LedgerError::TxFailed { reason: e.to_string() }
                })?;
        }

        tx.commit().await.map_err(|e| {
            log::error!("sqlite_ledger.apply_batch: commit failed: {e}");
            LedgerError::TxFailed { reason: e.to_string() }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::SqliteLedger;
    use domain::{Ledger as _, PointTx, UserBalance, UserId};

    // Each test calls make_ledger() which opens a fresh SqlitePool backed by
    // an in-memory SQLite database, so tests are fully isolated.
    async fn make_ledger() -> SqliteLedger {
        SqliteLedger::new("sqlite::memory:", 5).await.expect("in-memory SQLite should open")
    }

    // SL-T01: unknown user reads as balance zero.
    #[tokio::test]
    async fn unknown_user_defaults_to_zero() {
        let ledger = make_ledger().await;
        let id = UserId::new("alice").unwrap();
        let balances = ledger.read_balances(&[id]).await.unwrap();
        assert_eq!(balances[0].balance, 0);
    }

    // SL-T02: apply_batch persists both the balance and the tx log row.
    #[tokio::test]
    async fn apply_batch_persists_balance_and_tx() {
        let ledger = make_ledger().await;
        let id = UserId::new("bob").unwrap();
        let balance = UserBalance { user_id: id.clone(), balance: 75 };
        let tx = PointTx { id: uuid::Uuid::new_v4(), user_id: id.clone(), amount: 75, created_at: chrono::Utc::now() };

        ledger.apply_batch(&[balance], &[tx]).await.unwrap();

        let balances = ledger.read_balances(&[id]).await.unwrap();
        assert_eq!(balances[0].balance, 75);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM point_txs")
            .fetch_one(&ledger.pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    // SL-T03: a second apply_batch for the same user overwrites the balance
    // (ON CONFLICT upsert) while accumulating a second tx log row.
    #[tokio::test]
    async fn repeated_apply_batch_upserts_balance() {
        let ledger = make_ledger().await;
        let id = UserId::new("carol").unwrap();

        ledger
            .apply_batch(
                &[UserBalance { user_id: id.clone(), balance: 10 }],
                &[PointTx { id: uuid::Uuid::new_v4(), user_id: id.clone(), amount: 10, created_at: chrono::Utc::now() }],
            )
            .await
            .unwrap();
        ledger
            .apply_batch(
                &[UserBalance { user_id: id.clone(), balance: 30 }],
                &[PointTx { id: uuid::Uuid::new_v4(), user_id: id.clone(), amount: 20, created_at: chrono::Utc::now() }],
            )
            .await
            .unwrap();

        let balances = ledger.read_balances(&[id]).await.unwrap();
        assert_eq!(balances[0].balance, 30);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM point_txs")
            .fetch_one(&ledger.pool)
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    // SL-T04: an empty batch is a no-op that still commits successfully.
    #[tokio::test]
    async fn empty_batch_is_ok() {
        let ledger = make_ledger().await;
        ledger.apply_batch(&[], &[]).await.unwrap();
    }
}
