// Rust guideline compliant 2026-07-27

//! Shared domain types for the points ledger and feature-flag read path.
//!
//! Defines the data model (`UserId`, `UserBalance`, `PointTx`, `Feature`),
//! the error enums returned across every hexagonal boundary, and the two
//! port traits (`Ledger`, `FeatureStore`). All other workspace crates
//! depend on this one; it depends on nothing in-workspace.

use std::fmt;

// ---------------------------------------------------------------------------
// Identifiers and data model
// ---------------------------------------------------------------------------

/// Opaque user identifier. Never empty -- constructors validate this.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UserId(String);

impl UserId {
    /// Build a `UserId` from any string-like value.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::InvalidUser`] if `raw` is empty.
    pub fn new(raw: impl Into<String>) -> Result<Self, SubmitError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(SubmitError::InvalidUser);
        }
        Ok(Self(raw))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A user's current point balance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserBalance {
    pub user_id: UserId,
    pub balance: i64,
}

/// A single committed credit or debit, as persisted in the transaction log.
///
/// `amount` is signed: positive is a credit, negative is a debit. Zero is a
/// legal amount (it still produces a log row and a successful completion).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointTx {
    pub id: uuid::Uuid,
    pub user_id: UserId,
    pub amount: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// A named boolean feature flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feature {
    pub name: String,
    pub active: bool,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors returned to a caller of [`crate::Ledger::submit`]-shaped APIs.
///
/// This is the error surface the accumulator's completion dispatcher
/// resolves every operation's callback with; see the `accumulator` crate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    /// A debit would have driven the user's balance below zero.
    #[error("insufficient balance for user")]
    InsufficientBalance,
    /// The store rejected or could not apply the batch this operation was
    /// flushed in. Every operation in a failed batch receives this variant.
    #[error("store failed to apply batch")]
    StoreFailure,
    /// The submission was abandoned before a result could be produced (the
    /// accumulator shut down without draining, or the caller's own
    /// cancellation raced the completion).
    #[error("submission cancelled")]
    Cancelled,
    /// The supplied user identifier was empty.
    #[error("user id must not be empty")]
    InvalidUser,
}

/// Errors a [`Ledger`] adapter may return.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// The underlying store could not be reached.
    #[error("ledger store unavailable")]
    Unavailable,
    /// A transaction was attempted and failed to commit.
    #[error("ledger transaction failed: {reason}")]
    TxFailed { reason: String },
}

/// Errors a [`FeatureStore`] adapter may return.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeatureStoreError {
    /// The underlying store could not be reached.
    #[error("feature store unavailable")]
    Unavailable,
}

// ---------------------------------------------------------------------------
// Ledger port (Core A)
// ---------------------------------------------------------------------------

/// Hexagonal port: the store of record for Core A.
///
/// Implementations live outside `domain` and `accumulator` (the `pointsd`
/// binary crate's adapters). The accumulator loop depends exclusively on
/// this trait -- never on a concrete adapter.
#[expect(
    async_fn_in_trait,
    reason = "no dyn dispatch needed; internal workspace only"
)]
pub trait Ledger {
    /// Read current balances for the given users, outside any transaction.
    /// Users with no row default to a balance of zero; the flush engine
    /// never needs to distinguish "unknown user" from "zero balance".
    async fn read_balances(&self, user_ids: &[UserId]) -> Result<Vec<UserBalance>, LedgerError>;

    /// Apply one flush atomically: upsert every dirty balance and append
    /// every new transaction-log row inside a single committed transaction.
    /// On any failure the adapter rolls back and neither write is visible.
    async fn apply_batch(
        &self,
        balances: &[UserBalance],
        txs: &[PointTx],
    ) -> Result<(), LedgerError>;
}

// ---------------------------------------------------------------------------
// FeatureStore port (Core B)
// ---------------------------------------------------------------------------

/// Hexagonal port: the store of record for Core B's feature registry.
#[expect(
    async_fn_in_trait,
    reason = "no dyn dispatch needed; internal workspace only"
)]
pub trait FeatureStore {
    /// Read every feature row.
    async fn read_features(&self) -> Result<Vec<Feature>, FeatureStoreError>;

    /// Read a single feature by name. `Ok(None)` means no such feature is
    /// registered (callers treat this as inactive).
    async fn read_feature(&self, name: &str) -> Result<Option<Feature>, FeatureStoreError>;
}

/// Lets a [`FeatureStore`] be shared across multiple readers (`DirectReader`,
/// `CoalescingReader`, `SnapshotCache`) behind one `Arc`, rather than
/// requiring each reader to own a separate instance.
impl<T: FeatureStore + ?Sized> FeatureStore for std::sync::Arc<T> {
    async fn read_features(&self) -> Result<Vec<Feature>, FeatureStoreError> {
        (**self).read_features().await
    }

    async fn read_feature(&self, name: &str) -> Result<Option<Feature>, FeatureStoreError> {
        (**self).read_feature(name).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::{Feature, PointTx, SubmitError, UserBalance, UserId};

    // DOM-T01: UserId rejects empty strings.
    #[test]
    fn user_id_rejects_empty() {
        assert_eq!(UserId::new(""), Err(SubmitError::InvalidUser));
    }

    // DOM-T02: UserId accepts and round-trips non-empty strings.
    #[test]
    fn user_id_roundtrip() {
        let id = UserId::new("alice").unwrap();
        assert_eq!(id.as_str(), "alice");
        assert_eq!(id.to_string(), "alice");
    }

    // DOM-T03: UserId ordering is lexicographic (needed for deterministic
    // distinct-user collection in the flush engine).
    #[test]
    fn user_id_ordering() {
        let a = UserId::new("a").unwrap();
        let b = UserId::new("b").unwrap();
        assert!(a < b);
    }

    // DOM-T04: UserBalance and PointTx are structurally comparable.
    #[test]
    fn balance_and_tx_equality() {
        let id = UserId::new("alice").unwrap();
        let balance_a = UserBalance { user_id: id.clone(), balance: 100 };
        let balance_b = UserBalance { user_id: id.clone(), balance: 100 };
        assert_eq!(balance_a, balance_b);

        let tx = PointTx {
            id: uuid::Uuid::nil(),
            user_id: id,
            amount: 50,
            created_at: chrono::Utc::now(),
        };
        assert_eq!(tx.amount, 50);
    }

    // DOM-T05: Feature equality ignores nothing but its two fields.
    #[test]
    fn feature_equality() {
        let a = Feature { name: "f0".to_owned(), active: true };
        let b = Feature { name: "f0".to_owned(), active: true };
        assert_eq!(a, b);
    }
}
