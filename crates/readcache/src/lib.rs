// Rust guideline compliant 2026-07-27

//! Read-path coalescing cache: three strategies for reading the boolean
//! feature registry behind a [`domain::FeatureStore`].
//!
//! - [`DirectReader`] queries the store on every call. Baseline.
//! - [`CoalescingReader`] deduplicates concurrent callers asking for the
//!   same key: the first caller becomes the leader and runs the query,
//!   every other concurrent caller for that key observes the leader's
//!   result instead of issuing its own query.
//! - [`SnapshotCache`] refreshes a full in-memory copy of the registry on
//!   a fixed interval and serves reads from it, never touching the store
//!   on the read path.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use domain::{FeatureStore, FeatureStoreError};
use tokio::sync::{broadcast, Mutex};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tuning knobs for [`SnapshotCache`]. Default `refresh_interval` is 2s,
/// the reference value.
#[derive(Debug, Clone)]
pub struct ReadCacheConfig {
    refresh_interval: Duration,
}

impl ReadCacheConfig {
    #[must_use]
    pub fn builder() -> ReadCacheConfigBuilder {
        ReadCacheConfigBuilder::default()
    }

    #[must_use]
    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }
}

#[derive(Debug, Clone)]
pub struct ReadCacheConfigBuilder {
    refresh_interval: Duration,
}

impl Default for ReadCacheConfigBuilder {
    fn default() -> Self {
        Self { refresh_interval: Duration::from_secs(2) }
    }
}

impl ReadCacheConfigBuilder {
    #[must_use]
    pub fn refresh_interval(mut self, refresh_interval: Duration) -> Self {
        self.refresh_interval = refresh_interval;
        self
    }

    #[must_use]
    pub fn build(self) -> ReadCacheConfig {
        ReadCacheConfig { refresh_interval: self.refresh_interval }
    }
}

// ---------------------------------------------------------------------------
// DirectReader
// ---------------------------------------------------------------------------

/// Queries the store on every call. No caching, no coalescing; the
/// baseline every other reader is measured against.
#[derive(Debug, Clone)]
pub struct DirectReader<S> {
    store: S,
}

impl<S: FeatureStore> DirectReader<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Read `key`, treating an unregistered feature as inactive.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureStoreError`] if the store could not be reached.
    pub async fn read(&self, key: &str) -> Result<bool, FeatureStoreError> {
        Ok(self.store.read_feature(key).await?.is_some_and(|f| f.active))
    }
}

// ---------------------------------------------------------------------------
// CoalescingReader
// ---------------------------------------------------------------------------

type CoalesceResult = Result<bool, FeatureStoreError>;

/// Outcome of joining the in-flight map for a key: either another call is
/// already the leader and we wait on its broadcast, or we just became the
/// leader and must run the query ourselves.
enum Joined {
    Waiter(broadcast::Receiver<CoalesceResult>),
    Leader(broadcast::Sender<CoalesceResult>),
}

/// Deduplicates concurrent reads of the same key.
///
/// The in-flight map is guarded by a short critical section that only
/// ever touches the map itself; the store query that resolves a leader's
/// entry always runs outside the lock.
#[derive(Debug)]
pub struct CoalescingReader<S> {
    store: S,
    inflight: Mutex<HashMap<String, broadcast::Sender<CoalesceResult>>>,
}

impl<S: FeatureStore> CoalescingReader<S> {
    pub fn new(store: S) -> Self {
        Self { store, inflight: Mutex::new(HashMap::new()) }
    }

    /// Read `key`, coalescing with any concurrent read already in flight
    /// for the same key.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureStoreError`] if the store could not be reached
    /// (propagated to every caller waiting on the same in-flight query).
    pub async fn read(&self, key: &str) -> CoalesceResult {
        match self.join_or_claim(key).await {
            Joined::Waiter(mut rx) => recv(&mut rx).await,
            Joined::Leader(tx) => {
                let result = self.store.read_feature(key).await.map(|f| f.is_some_and(|f| f.active));
                // Retire before sending: a caller joining after this point starts a fresh
                // leader instead of subscribing too late to see a message already sent.
                self.retire_if_still_ours(key, &tx).await;
                let _ = tx.send(result.clone());
                result
            }
        }
    }

    /// Check for and claim the in-flight entry for `key` in one critical
    /// section, so a caller can never observe "no entry" and then fail to
    /// find the entry a concurrent leader just installed (or already
    /// retired).
    async fn join_or_claim(&self, key: &str) -> Joined {
        let mut map = self.inflight.lock().await;
        if let Some(tx) = map.get(key) {
            return Joined::Waiter(tx.subscribe());
        }
        let (tx, _rx) = broadcast::channel(1);
        map.insert(key.to_owned(), tx.clone());
        Joined::Leader(tx)
    }

    /// Remove the in-flight entry for `key` if it is still the one `tx`
    /// installed -- a fresh wave of callers may already have replaced it.
    async fn retire_if_still_ours(&self, key: &str, tx: &broadcast::Sender<CoalesceResult>) {
        let mut map = self.inflight.lock().await;
        if map.get(key).is_some_and(|current| current.same_channel(tx)) {
            map.remove(key);
        }
    }
}

async fn recv(rx: &mut broadcast::Receiver<CoalesceResult>) -> CoalesceResult {
    rx.recv().await.unwrap_or(Err(FeatureStoreError::Unavailable))
}

// ---------------------------------------------------------------------------
// SnapshotCache
// ---------------------------------------------------------------------------

/// Serves reads from a periodically-refreshed in-memory snapshot of the
/// whole feature registry. Never touches the store on the read path.
///
/// Startup performs one synchronous refresh before the cache is
/// considered ready; if that refresh fails, [`SnapshotCache::start`]
/// returns an error rather than serving an empty snapshot. Subsequent
/// background refresh failures are logged and the previous snapshot is
/// kept.
#[derive(Debug)]
pub struct SnapshotCache<S> {
    store: S,
    snapshot: ArcSwap<HashMap<String, bool>>,
}

impl<S: FeatureStore + Send + Sync + 'static> SnapshotCache<S> {
    /// Perform the initial synchronous refresh and spawn the background
    /// refresher task.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureStoreError`] if the initial refresh fails.
    pub async fn start(store: S, config: &ReadCacheConfig) -> Result<Arc<Self>, FeatureStoreError> {
        let initial = fetch_snapshot(&store).await?;
        let cache = Arc::new(Self { store, snapshot: ArcSwap::from_pointee(initial) });

        let background = Arc::clone(&cache);
        let refresh_interval = config.refresh_interval();
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(refresh_interval);
            timer.tick().await; // first tick fires immediately; the initial refresh already covered it
            loop {
                timer.tick().await;
                match fetch_snapshot(&background.store).await {
                    Ok(next) => background.snapshot.store(Arc::new(next)),
                    Err(e) => log::warn!("snapshot refresh failed, retaining previous snapshot: {e}"),
                }
            }
        });

        Ok(cache)
    }

    /// Read `key` from the current snapshot. An unregistered feature and a
    /// feature that was active at some point but later disappeared from
    /// the registry both read as inactive.
    #[must_use]
    pub fn read(&self, key: &str) -> bool {
        self.snapshot.load().get(key).copied().unwrap_or(false)
    }
}

async fn fetch_snapshot<S: FeatureStore>(store: &S) -> Result<HashMap<String, bool>, FeatureStoreError> {
    let features = store.read_features().await?;
    Ok(features.into_iter().map(|f| (f.name, f.active)).collect())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::{CoalescingReader, DirectReader, ReadCacheConfig, SnapshotCache};
    use domain::{Feature, FeatureStore, FeatureStoreError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Clone)]
    struct CountingStore {
        calls: Arc<AtomicUsize>,
        features: Arc<std::sync::Mutex<Vec<Feature>>>,
        delay: std::time::Duration,
    }

    impl CountingStore {
        fn new(features: Vec<Feature>) -> Self {
            Self {
                calls: Arc::new(AtomicUsize::new(0)),
                features: Arc::new(std::sync::Mutex::new(features)),
                delay: std::time::Duration::from_millis(20),
            }
        }
    }

    impl FeatureStore for CountingStore {
        async fn read_features(&self) -> Result<Vec<Feature>, FeatureStoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.features.lock().unwrap().clone())
        }

        async fn read_feature(&self, name: &str) -> Result<Option<Feature>, FeatureStoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(self.features.lock().unwrap().iter().find(|f| f.name == name).cloned())
        }
    }

    // RC-T01: DirectReader issues one store call per read.
    #[tokio::test]
    async fn direct_reader_issues_one_call_per_read() {
        let store = CountingStore::new(vec![Feature { name: "f0".to_owned(), active: true }]);
        let reader = DirectReader::new(store.clone());

        assert!(reader.read("f0").await.unwrap());
        assert!(!reader.read("missing").await.unwrap());
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    }

    // RC-T02: N concurrent reads of the same key coalesce into one store call.
    #[tokio::test]
    async fn coalescing_reader_deduplicates_concurrent_reads() {
        let store = CountingStore::new(vec![Feature { name: "f1".to_owned(), active: true }]);
        let reader = Arc::new(CoalescingReader::new(store.clone()));

        let mut handles = Vec::new();
        for _ in 0..20 {
            let reader = Arc::clone(&reader);
            handles.push(tokio::spawn(async move { reader.read("f1").await }));
        }
        for h in handles {
            assert!(h.await.unwrap().unwrap());
        }
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }

    // RC-T03: sequential reads (no overlap) each issue their own store call.
    #[tokio::test]
    async fn coalescing_reader_sequential_reads_each_query() {
        let store = CountingStore::new(vec![Feature { name: "f2".to_owned(), active: false }]);
        let reader = CoalescingReader::new(store.clone());

        reader.read("f2").await.unwrap();
        reader.read("f2").await.unwrap();
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    }

    // RC-T04: SnapshotCache serves an unregistered key as inactive.
    #[tokio::test]
    async fn snapshot_cache_missing_key_is_inactive() {
        let store = CountingStore::new(vec![Feature { name: "f3".to_owned(), active: true }]);
        let config = ReadCacheConfig::builder().refresh_interval(std::time::Duration::from_secs(60)).build();
        let cache = SnapshotCache::start(store, &config).await.unwrap();

        assert!(cache.read("f3"));
        assert!(!cache.read("unknown"));
    }

    // RC-T05: SnapshotCache reads never touch the store after startup.
    #[tokio::test]
    async fn snapshot_cache_reads_are_free() {
        let store = CountingStore::new(vec![Feature { name: "f4".to_owned(), active: true }]);
        let config = ReadCacheConfig::builder().refresh_interval(std::time::Duration::from_secs(60)).build();
        let cache = SnapshotCache::start(store.clone(), &config).await.unwrap();
        let calls_after_start = store.calls.load(Ordering::SeqCst);

        for _ in 0..50 {
            cache.read("f4");
        }
        assert_eq!(store.calls.load(Ordering::SeqCst), calls_after_start);
    }
}
