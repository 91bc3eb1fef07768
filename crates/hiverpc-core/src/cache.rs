use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::error::CoreError;

/// TTL used when a caller has no better idea.
pub const DEFAULT_TTL: Duration = Duration::from_secs(120);

// ==============================================================================
// Cache Fill
// ==============================================================================

/// How [`TtlCache::get_or_set`] obtains a value on a miss.
///
/// `Ready` stores a value the caller already has; `Deferred` holds a
/// computation (usually an RPC round-trip) that only runs on a miss.
pub enum CacheFill<'a, V> {
    Ready(V),
    Deferred(BoxFuture<'a, Result<V, CoreError>>),
}

impl<'a, V> CacheFill<'a, V> {
    pub fn deferred<F>(fut: F) -> Self
    where
        F: Future<Output = Result<V, CoreError>> + Send + 'a,
    {
        Self::Deferred(Box::pin(fut))
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred(_))
    }

    async fn resolve(self) -> Result<V, CoreError> {
        match self {
            Self::Ready(value) => Ok(value),
            Self::Deferred(fut) => fut.await,
        }
    }
}

// ==============================================================================
// TTL Cache
// ==============================================================================

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

/// Small string-keyed cache with per-entry expiry.
///
/// Expired entries are only removed when read; nothing sweeps in the
/// background. `get_or_set` is not single-flight: two concurrent misses on the
/// same key both run their fill and the later write wins. Every fill used in
/// this crate is an idempotent read, so the duplicate work is harmless.
pub struct TtlCache<V> {
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return None,
                Some(entry) if Instant::now() < entry.expires_at => {
                    return Some(entry.value.clone());
                }
                Some(_) => {}
            }
        }

        // Expired: re-check under the write lock since a concurrent `set` may
        // have refreshed the entry in between.
        let mut entries = self.entries.write().await;
        match entries.get(key) {
            Some(entry) if Instant::now() < entry.expires_at => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub async fn get_or(&self, key: &str, default: V) -> V {
        self.get(key).await.unwrap_or(default)
    }

    pub async fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.entries.write().await.insert(key.into(), entry);
    }

    /// Return the cached value for `key`, or resolve `fill`, store it for
    /// `ttl`, and return it. A failed fill is returned as-is and not cached.
    pub async fn get_or_set(
        &self,
        key: &str,
        fill: CacheFill<'_, V>,
        ttl: Duration,
    ) -> Result<V, CoreError> {
        if let Some(hit) = self.get(key).await {
            return Ok(hit);
        }
        let value = fill.resolve().await?;
        self.set(key, value.clone(), ttl).await;
        Ok(value)
    }

    /// Number of stored entries, including expired ones not yet read.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}
