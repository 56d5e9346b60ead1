//! Per-client request limiting.
//!
//! Each client key gets a fixed window that opens on its first request and
//! expires `window` later; at most `quota` requests are admitted inside it.
//! A GCRA limiter from `governor` caps overall throughput on top of that.
//!
//! The counter cache is bounded. Once it holds `capacity` live keys it starts
//! evicting, and an evicted client gets a fresh quota. Configuration
//! validation requires the capacity to cover every client the global ceiling
//! can admit in one window; with the global ceiling disabled, heavy IP churn
//! can still evict live counters.

use crate::error::FaucetResult;
use async_trait::async_trait;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorLimiter,
};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Shared counter storage with time-based expiry
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically increment `key` and return the count within its current window
    async fn increment(&self, key: &str) -> FaucetResult<u64>;
}

/// Counter store backed by a moka cache whose time-to-live is the window
pub struct InMemoryCounterStore {
    counters: moka::future::Cache<String, Arc<AtomicU64>>,
}

impl InMemoryCounterStore {
    pub fn new(window: Duration, capacity: u64) -> Self {
        let counters = moka::future::Cache::builder()
            .max_capacity(capacity)
            .time_to_live(window)
            .build();
        Self { counters }
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn increment(&self, key: &str) -> FaucetResult<u64> {
        let counter = self
            .counters
            .get_with(key.to_string(), async { Arc::new(AtomicU64::new(0)) })
            .await;
        Ok(counter.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

type GlobalLimiter = GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>;

pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    quota: u64,
    global: Option<GlobalLimiter>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, quota: u32, global_per_minute: u32) -> Self {
        let global = NonZeroU32::new(global_per_minute)
            .map(|n| GovernorLimiter::direct(Quota::per_minute(n)));
        Self {
            store,
            quota: u64::from(quota),
            global,
        }
    }

    /// Count one request for `client_key`; `false` once the quota is spent.
    ///
    /// An unreachable counter store rejects the request.
    pub async fn try_consume(&self, client_key: &str) -> bool {
        if let Some(global) = &self.global {
            if global.check().is_err() {
                warn!("Global request ceiling reached");
                return false;
            }
        }

        match self.store.increment(client_key).await {
            Ok(count) if count <= self.quota => {
                debug!(client = client_key, count, "rate limit passed");
                true
            }
            Ok(count) => {
                debug!(client = client_key, count, "rate limit exceeded");
                false
            }
            Err(e) => {
                warn!(client = client_key, error = %e, "counter store unavailable, rejecting");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FaucetError;

    struct BrokenStore;

    #[async_trait]
    impl CounterStore for BrokenStore {
        async fn increment(&self, _key: &str) -> FaucetResult<u64> {
            Err(FaucetError::Unexpected("store offline".to_string()))
        }
    }

    fn limiter(quota: u32, window: Duration) -> RateLimiter {
        let store = Arc::new(InMemoryCounterStore::new(window, 1000));
        RateLimiter::new(store, quota, 0)
    }

    #[tokio::test]
    async fn test_quota_then_reject() {
        let limiter = limiter(3, Duration::from_secs(60));
        for _ in 0..3 {
            assert!(limiter.try_consume("10.0.0.1").await);
        }
        assert!(!limiter.try_consume("10.0.0.1").await);
        // other clients are unaffected
        assert!(limiter.try_consume("10.0.0.2").await);
    }

    #[tokio::test]
    async fn test_window_expiry_resets_counter() {
        let limiter = limiter(2, Duration::from_millis(200));
        assert!(limiter.try_consume("10.0.0.1").await);
        assert!(limiter.try_consume("10.0.0.1").await);
        assert!(!limiter.try_consume("10.0.0.1").await);

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert!(limiter.try_consume("10.0.0.1").await);
    }

    #[tokio::test]
    async fn test_concurrent_increments_respect_quota() {
        let limiter = Arc::new(limiter(5, Duration::from_secs(60)));
        let mut handles = Vec::new();
        for _ in 0..20 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move { limiter.try_consume("10.0.0.9").await }));
        }

        let mut allowed = 0;
        for handle in handles {
            if handle.await.unwrap() {
                allowed += 1;
            }
        }
        assert_eq!(allowed, 5);
    }

    #[tokio::test]
    async fn test_store_failure_fails_closed() {
        let limiter = RateLimiter::new(Arc::new(BrokenStore), 10, 0);
        assert!(!limiter.try_consume("10.0.0.1").await);
    }

    #[tokio::test]
    async fn test_global_ceiling() {
        let store = Arc::new(InMemoryCounterStore::new(Duration::from_secs(60), 1000));
        let limiter = RateLimiter::new(store, 100, 2);
        assert!(limiter.try_consume("a").await);
        assert!(limiter.try_consume("b").await);
        assert!(!limiter.try_consume("c").await);
    }
}
