//! Caching layer: a time-bounded in-memory key/value cache.
//!
//! ## Core types
//!
//! - [`CacheProvider`]: the read/write contract the response-caching
//!   middleware depends on. Any backend (in-process, Redis, ...) can sit
//!   behind it.
//! - [`TtlCache`]: the in-process implementation: a [`store::EntryStore`]
//!   plus a [`sweeper::Sweeper`] that evicts entries by age.
//! - [`CacheConfig`]: TTL, sweep interval, and simulated latency.
//!
//! Eviction is age-based only and eventually consistent: an entry is removed
//! by the first sweep that finds it older than the TTL, so it can remain
//! readable for up to one extra sweep interval. Reads never check age.

use std::{future::Future, pin::Pin};

use bytes::Bytes;
use thiserror::Error;

pub mod config;
pub mod store;
pub mod sweeper;
mod ttl;

pub use config::{CacheConfig, ConfigError};
pub use ttl::TtlCache;

/// Errors reported by a [`CacheProvider`].
///
/// A missing key is not an error. The in-process [`TtlCache`] never fails;
/// this type exists for backends that can become unreachable.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
}

/// Boxed future returned by [`CacheProvider`] methods.
pub type CacheFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, CacheError>> + Send + 'a>>;

/// A key/value store for serialized responses.
///
/// The trait is object safe so a middleware can hold an
/// `Arc<dyn CacheProvider>` and swap backends at runtime.
///
/// # Contract
///
/// - `read` returns `Ok(None)` for a key that was never written or has been
///   evicted.
/// - `write` replaces any existing value for the key.
/// - Both may be called concurrently from any number of tasks.
pub trait CacheProvider: Send + Sync {
    /// Looks up `key`.
    fn read<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<Bytes>>;

    /// Stores `value` under `key`.
    fn write<'a>(&'a self, key: &'a str, value: Bytes) -> CacheFuture<'a, ()>;
}
