// Rust guideline compliant 2026-07-27

//! SQLite adapter for the `FeatureStore` port.
//!
//! Reads `features` rows via `sqlx`. Shares the same pool type as
//! `SqliteLedger` but is constructed independently so the two ports remain
//! swappable on their own -- neither core depends on the other's adapter.

use domain::{Feature, FeatureStore, FeatureStoreError};

/// `FeatureStore` adapter backed by a SQLite database file via `sqlx`.
#[derive(Debug, Clone)]
pub struct SqliteFeatureStore {
    pool: sqlx::SqlitePool,
}

impl SqliteFeatureStore {
    /// Open or create a SQLite database and initialize the schema.
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
            "CREATE TABLE IF NOT EXISTS features (
                name   TEXT PRIMARY KEY,
                active INTEGER NOT NULL
            )",
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    /// Seed or overwrite a feature row. Used by the demo binary and by
    /// tests; not part of the `FeatureStore` port itself.
    pub async fn set_feature(&self, name: &str, active: bool) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO features (name, active) VALUES (?, ?)
             ON CONFLICT(name) DO UPDATE SET active = excluded.active",
        )
        .bind(name)
        .bind(i64::from(active))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

impl FeatureStore for SqliteFeatureStore {
    /// # Errors
    ///
    /// Returns `FeatureStoreError::Unavailable` on any `sqlx` error. The
    /// underlying error is logged at `error` level before mapping.
    async fn read_features(&self) -> Result<Vec<Feature>, FeatureStoreError> {
        let rows: Vec<(String, i64)> = sqlx::query_as("SELECT name, active FROM features")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                log::error!("sqlite_feature_store.read_features: {e}");
                FeatureStoreError::Unavailable
            })?;
        Ok(rows.into_iter().map(|(name, active)| Feature { name, active: active != 0 }).collect())
    }

    /// # Errors
    ///
    /// Returns `FeatureStoreError::Unavailable` on any `sqlx` error. The
    /// underlying error is logged at `error` level before mapping.
    async fn read_feature(&self, name: &str) -> Result<Option<Feature>, FeatureStoreError> {
        let row: Option<(String, i64)> = sqlx::query_as("SELECT name, active FROM features WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                log::error!("sqlite_feature_store.read_feature: {e}");
                FeatureStoreError::Unavailable
            })?;
        Ok(row.map(|(name, active)| Feature { name, active: active != 0 }))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::SqliteFeatureStore;
    use domain::FeatureStore as _;

    async fn make_store() -> SqliteFeatureStore {
        SqliteFeatureStore::new("sqlite::memory:", 5).await.expect("in-memory SQLite should open")
    }

    // SF-T01: a seeded feature round-trips through read_feature.
    #[tokio::test]
    async fn seeded_feature_roundtrips() {
        let store = make_store().await;
        store.set_feature("f0", true).await.unwrap();
        let feature = store.read_feature("f0").await.unwrap().unwrap();
        assert!(feature.active);
    }

    // SF-T02: an unregistered feature reads as None, not an error.
    #[tokio::test]
    async fn unregistered_feature_is_none() {
        let store = make_store().await;
        assert!(store.read_feature("missing").await.unwrap().is_none());
    }

    // SF-T03: set_feature is idempotent-by-overwrite (ON CONFLICT upsert).
    #[tokio::test]
    async fn set_feature_overwrites() {
        let store = make_store().await;
        store.set_feature("f1", true).await.unwrap();
        store.set_feature("f1", false).await.unwrap();
        let feature = store.read_feature("f1").await.unwrap().unwrap();
        assert!(!feature.active);
    }

    // SF-T04: read_features returns every row.
    #[tokio::test]
    async fn read_features_returns_all_rows() {
        let store = make_store().await;
        store.set_feature("f0", true).await.unwrap();
        store.set_feature("f1", false).await.unwrap();
        let mut features = store.read_features().await.unwrap();
        features.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(features.len(), 2);
        assert_eq!(features[0].name, "f0");
        assert_eq!(features[1].name, "f1");
    }
}
