//! Bounded TTL cache with failure-transparent fallback.
//!
//! The cache never fails its caller. A store that is unreachable turns every
//! `get` into a miss and every `put` into a no-op; the error is logged and
//! dropped here.

mod key;
mod store;

pub use key::{cache_key, TimeBucket};
pub use store::{CacheStore, FileStore, MemoryStore, StoreError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Default entry lifetime: seven days.
pub const DEFAULT_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// One stored value with its lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub payload: Value,
    pub written_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(key: &str, payload: Value, ttl: Duration) -> Self {
        let written_at = Utc::now();
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        Self {
            key: key.to_string(),
            payload,
            written_at,
            expires_at: written_at.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// A freshly computed value and whether it may be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Computed {
    pub value: Value,
    pub store: bool,
}

impl Computed {
    /// A value worth keeping for its full TTL.
    pub fn keep(value: Value) -> Self {
        Self { value, store: true }
    }

    /// A value returned to the caller but never written, so the next lookup
    /// computes again.
    pub fn transient(value: Value) -> Self {
        Self {
            value,
            store: false,
        }
    }
}

/// Cache front-end over a fallible store.
#[derive(Clone)]
pub struct BoundedCache {
    store: Arc<dyn CacheStore>,
    default_ttl: Duration,
}

impl BoundedCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            default_ttl: DEFAULT_TTL,
        }
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Look up `key`. Returns the payload and whether it was a hit.
    ///
    /// Expired entries and store errors are misses.
    pub async fn get(&self, key: &str) -> (Option<Value>, bool) {
        match self.store.get(key).await {
            Ok(Some(entry)) if !entry.is_expired() => {
                tracing::debug!(key, "cache hit");
                (Some(entry.payload), true)
            }
            Ok(Some(_)) => {
                tracing::debug!(key, "cache entry expired");
                (None, false)
            }
            Ok(None) => {
                tracing::debug!(key, "cache miss");
                (None, false)
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "cache store unavailable, treating as miss");
                (None, false)
            }
        }
    }

    /// Store `value` under `key` for `ttl`, or the default TTL when `None`.
    ///
    /// Store errors are logged and ignored.
    pub async fn put(&self, key: &str, value: Value, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let entry = CacheEntry::new(key, value, ttl);
        if let Err(e) = self.store.put(key, entry, ttl).await {
            tracing::warn!(key, error = %e, "cache store unavailable, write skipped");
        }
    }

    /// Return the cached value for `key`, computing and storing it on a miss.
    ///
    /// The boolean is `true` when the value came from the cache. Errors from
    /// `compute` are returned and nothing is stored, and neither is a
    /// [`Computed::transient`] value.
    pub async fn get_or_compute<F, Fut, E>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        compute: F,
    ) -> Result<(Value, bool), E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Computed, E>>,
    {
        if let (Some(value), true) = self.get(key).await {
            return Ok((value, true));
        }
        let computed = compute().await?;
        if computed.store {
            self.put(key, computed.value.clone(), ttl).await;
        } else {
            tracing::debug!(key, "transient value, not stored");
        }
        Ok((computed.value, false))
    }
}

impl std::fmt::Debug for BoundedCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedCache")
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}
