//! Read-through response cache.
//!
//! Hot reads (latest products, categories, orders, dashboard reports) are
//! cached as serialized JSON under a [`CacheKey`]. Every write computes an
//! [`Invalidation`] and evicts the keys it makes stale; there is no other
//! freshness mechanism unless a TTL is configured.

mod key;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

pub use key::{CacheDomain, CacheKey, Invalidation};

/// Key-value cache for serialized responses.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Option<String>;
    async fn set(&self, key: CacheKey, value: String);
    async fn delete(&self, keys: &[CacheKey]);
}

/// In-process [`CacheStore`] backed by `moka`.
#[derive(Clone)]
pub struct MokaCache {
    cache: Cache<CacheKey, String>,
}

impl MokaCache {
    /// Create a cache holding at most `max_capacity` entries.
    ///
    /// With `ttl` unset, entries live until evicted by a write.
    #[must_use]
    pub fn new(max_capacity: u64, ttl: Option<Duration>) -> Self {
        let mut builder = Cache::builder().max_capacity(max_capacity);
        if let Some(ttl) = ttl {
            builder = builder.time_to_live(ttl);
        }
        Self {
            cache: builder.build(),
        }
    }
}

#[async_trait]
impl CacheStore for MokaCache {
    async fn get(&self, key: &CacheKey) -> Option<String> {
        self.cache.get(key).await
    }

    async fn set(&self, key: CacheKey, value: String) {
        self.cache.insert(key, value).await;
    }

    async fn delete(&self, keys: &[CacheKey]) {
        for key in keys {
            self.cache.invalidate(key).await;
        }
    }
}

/// Serve `key` from the cache, or run `load` and cache its result.
///
/// A payload that no longer deserializes is evicted and treated as a miss.
/// Errors from `load` are returned as-is and never cached.
///
/// # Errors
///
/// Returns whatever error `load` returns.
pub async fn read_through<T, E, F, Fut>(
    cache: &dyn CacheStore,
    key: CacheKey,
    load: F,
) -> Result<T, E>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    if let Some(raw) = cache.get(&key).await {
        match serde_json::from_str::<T>(&raw) {
            Ok(value) => {
                debug!(key = %key, "Cache hit");
                return Ok(value);
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Discarding unreadable cache entry");
                cache.delete(std::slice::from_ref(&key)).await;
            }
        }
    }

    let value = load().await?;
    match serde_json::to_string(&value) {
        Ok(raw) => cache.set(key, raw).await,
        Err(e) => warn!(key = %key, error = %e, "Failed to serialize value for cache"),
    }
    Ok(value)
}

/// Evict every key in `invalidation`.
pub async fn invalidate(cache: &dyn CacheStore, invalidation: &Invalidation) {
    let keys = invalidation.keys();
    if keys.is_empty() {
        return;
    }
    debug!(count = keys.len(), "Invalidating cache keys");
    cache.delete(&keys).await;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use ecom24_core::UserId;

    use super::*;

    fn cache() -> MokaCache {
        MokaCache::new(100, None)
    }

    #[tokio::test]
    async fn test_read_through_loads_once() {
        let cache = cache();
        let loads = AtomicUsize::new(0);
        let counter = &loads;

        for _ in 0..3 {
            let value: Result<Vec<String>, ()> =
                read_through(&cache, CacheKey::Categories, || async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(vec!["laptop".to_owned()])
                })
                .await;
            assert_eq!(value.unwrap(), vec!["laptop"]);
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_load_is_not_cached() {
        let cache = cache();

        let first: Result<u32, &str> =
            read_through(&cache, CacheKey::AdminStats, || async { Err("db down") }).await;
        assert_eq!(first, Err("db down"));
        assert!(cache.get(&CacheKey::AdminStats).await.is_none());

        let second: Result<u32, &str> =
            read_through(&cache, CacheKey::AdminStats, || async { Ok(7) }).await;
        assert_eq!(second, Ok(7));
    }

    #[tokio::test]
    async fn test_unreadable_entry_falls_back_to_load() {
        let cache = cache();
        cache
            .set(CacheKey::LatestProducts, "{not json".to_owned())
            .await;

        let value: Result<Vec<u32>, ()> =
            read_through(&cache, CacheKey::LatestProducts, || async { Ok(vec![1, 2]) }).await;

        assert_eq!(value.unwrap(), vec![1, 2]);
        assert_eq!(
            cache.get(&CacheKey::LatestProducts).await.as_deref(),
            Some("[1,2]")
        );
    }

    #[tokio::test]
    async fn test_invalidate_only_touches_listed_keys() {
        let cache = cache();
        let buyer = UserId::parse("buyer").unwrap();
        let other = UserId::parse("other").unwrap();
        for key in [
            CacheKey::AllOrders,
            CacheKey::MyOrders(buyer.clone()),
            CacheKey::MyOrders(other.clone()),
            CacheKey::Categories,
        ] {
            cache.set(key, "[]".to_owned()).await;
        }

        invalidate(&cache, &Invalidation::new().order().for_user(buyer.clone())).await;

        assert!(cache.get(&CacheKey::AllOrders).await.is_none());
        assert!(cache.get(&CacheKey::MyOrders(buyer)).await.is_none());
        assert!(cache.get(&CacheKey::MyOrders(other)).await.is_some());
        assert!(cache.get(&CacheKey::Categories).await.is_some());
    }
}
