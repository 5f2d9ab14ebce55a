use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use super::{
    CacheConfig, CacheFuture, CacheProvider, ConfigError, store::EntryStore, sweeper::Sweeper,
};

/// In-process [`CacheProvider`] with age-based eviction.
///
/// Owns the entry store and its sweeper. Dropping the cache stops the
/// sweeper; [`shutdown`](Self::shutdown) stops it early while leaving the
/// cache fully usable, with entries no longer evicted.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use bytes::Bytes;
/// use rttp_cache::cache::{CacheProvider, TtlCache};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let cache = TtlCache::new(Duration::from_secs(30))?;
///
/// assert_eq!(cache.read("key").await?, None);
/// cache.write("key", Bytes::from_static(b"value")).await?;
/// assert_eq!(cache.read("key").await?, Some(Bytes::from_static(b"value")));
///
/// cache.shutdown();
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct TtlCache {
    store: Arc<EntryStore>,
    sweeper: Sweeper,
    config: CacheConfig,
}

impl TtlCache {
    /// Creates a cache that keeps entries for roughly `ttl`, sweeping once
    /// per `ttl`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroTtl`] when `ttl` is zero, or
    /// [`ConfigError::OutOfRange`] when it is too large to schedule.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn new(ttl: Duration) -> Result<Self, ConfigError> {
        Self::with_config(CacheConfig::new(ttl))
    }

    /// Creates a cache from a full [`CacheConfig`].
    ///
    /// # Errors
    ///
    /// Returns the [`ConfigError`] reported by [`CacheConfig::validate`].
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn with_config(config: CacheConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let store = Arc::new(EntryStore::new());
        let sweeper = Sweeper::spawn(Arc::clone(&store), config.ttl(), config.sweep_interval());
        Ok(Self {
            store,
            sweeper,
            config,
        })
    }

    /// Stops background eviction. Safe to call any number of times.
    pub fn shutdown(&self) {
        self.sweeper.shutdown();
    }

    /// Runs one eviction pass immediately and returns how many entries it
    /// removed.
    pub fn sweep(&self) -> usize {
        self.store
            .remove_expired(self.config.ttl(), tokio::time::Instant::now())
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Number of stored entries, including stale ones not yet swept.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    async fn simulate_latency(&self) {
        let latency = self.config.simulated_latency();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

impl CacheProvider for TtlCache {
    fn read<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<Bytes>> {
        Box::pin(async move {
            self.simulate_latency().await;
            Ok(self.store.read(key))
        })
    }

    fn write<'a>(&'a self, key: &'a str, value: Bytes) -> CacheFuture<'a, ()> {
        Box::pin(async move {
            self.simulate_latency().await;
            self.store.write(key, value);
            Ok(())
        })
    }
}
