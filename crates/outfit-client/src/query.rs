//! Query layer: cached reads with staleness windows and retry, and writes
//! that invalidate, remove or seed cache entries on success.

use std::future::Future;
use std::time::Duration;

use outfit_core::keys::QueryKey;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::QueryCache;
use crate::Result;

pub const DEFAULT_RETRY_BASE: Duration = Duration::from_secs(1);
pub const DEFAULT_RETRY_CAP: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Options & effects
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct QueryOptions {
    pub key: QueryKey,
    pub stale_time: Duration,
    /// Extra attempts after the first failure.
    pub retry: u32,
}

impl QueryOptions {
    /// Always-stale, no retry.
    pub fn new(key: QueryKey) -> Self {
        QueryOptions {
            key,
            stale_time: Duration::ZERO,
            retry: 0,
        }
    }

    pub fn stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }

    pub fn retry(mut self, retry: u32) -> Self {
        self.retry = retry;
        self
    }
}

/// A cache change applied after a successful write.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheEffect {
    /// Mark every entry under the prefix stale.
    Invalidate(QueryKey),
    /// Drop every entry under the prefix.
    Remove(QueryKey),
    /// Store a fresh value directly.
    Seed {
        key: QueryKey,
        value: serde_json::Value,
        stale_time: Duration,
    },
}

impl CacheEffect {
    /// Seed `key` with `value`. A value that cannot be represented as JSON
    /// degrades to invalidating the key.
    pub fn seed<T: Serialize>(key: QueryKey, value: &T, stale_time: Duration) -> Self {
        match serde_json::to_value(value) {
            Ok(value) => CacheEffect::Seed {
                key,
                value,
                stale_time,
            },
            Err(e) => {
                warn!(key = %key, error = %e, "cannot seed cache; invalidating instead");
                CacheEffect::Invalidate(key)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// QueryClient
// ---------------------------------------------------------------------------

/// Cheap to clone; clones share the cache.
#[derive(Clone)]
pub struct QueryClient {
    cache: QueryCache,
    retry_base: Duration,
    retry_cap: Duration,
}

impl Default for QueryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryClient {
    pub fn new() -> Self {
        QueryClient {
            cache: QueryCache::new(),
            retry_base: DEFAULT_RETRY_BASE,
            retry_cap: DEFAULT_RETRY_CAP,
        }
    }

    /// Override the exponential backoff between retries.
    pub fn with_backoff(mut self, base: Duration, cap: Duration) -> Self {
        self.retry_base = base;
        self.retry_cap = cap;
        self
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`,
    /// capped.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.retry_base.saturating_mul(factor).min(self.retry_cap)
    }

    /// Serve `opts.key` from cache while fresh, otherwise run `fetch` and
    /// cache the result.
    pub async fn query<T, F, Fut>(&self, opts: QueryOptions, fetch: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(cached) = self.cache.get_fresh(&opts.key) {
            match serde_json::from_value::<T>(cached) {
                Ok(value) => {
                    debug!(key = %opts.key, "cache hit");
                    return Ok(value);
                }
                Err(e) => debug!(key = %opts.key, error = %e, "cached value unusable; refetching"),
            }
        }

        let epoch = self.cache.epoch();
        let value = self.fetch_with_retry(&opts, fetch).await?;
        match serde_json::to_value(&value) {
            Ok(json) => {
                self.cache
                    .insert_in_epoch(epoch, opts.key, json, opts.stale_time);
            }
            Err(e) => warn!(key = %opts.key, error = %e, "response not cacheable"),
        }
        Ok(value)
    }

    /// Like [`query`](Self::query), but a disabled read performs no request
    /// and yields `None`.
    pub async fn query_if<T, F, Fut>(
        &self,
        enabled: bool,
        opts: QueryOptions,
        fetch: F,
    ) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if !enabled {
            debug!(key = %opts.key, "query disabled");
            return Ok(None);
        }
        self.query(opts, fetch).await.map(Some)
    }

    /// Run a write and, only if it succeeds, apply the effects derived from
    /// its result.
    pub async fn mutate<T, Fut, E>(&self, write: Fut, effects: E) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
        E: FnOnce(&T) -> Vec<CacheEffect>,
    {
        let value = write.await?;
        for effect in effects(&value) {
            self.apply(effect);
        }
        Ok(value)
    }

    pub fn apply(&self, effect: CacheEffect) {
        match effect {
            CacheEffect::Invalidate(prefix) => {
                self.cache.invalidate(&prefix);
            }
            CacheEffect::Remove(prefix) => {
                self.cache.remove(&prefix);
            }
            CacheEffect::Seed {
                key,
                value,
                stale_time,
            } => self.cache.insert(key, value, stale_time),
        }
    }

    pub fn set_query_data<T: Serialize>(&self, key: QueryKey, value: &T, stale_time: Duration) {
        self.apply(CacheEffect::seed(key, value, stale_time));
    }

    pub fn get_query_data<T: DeserializeOwned>(&self, key: &QueryKey) -> Option<T> {
        self.cache.peek_as(key)
    }

    /// Edit a cached value in place, keeping its staleness window. Returns
    /// `false` when nothing usable is cached under `key`.
    pub fn update_query_data<T, F>(&self, key: &QueryKey, edit: F) -> bool
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut T),
    {
        let Some(mut value) = self.cache.peek_as::<T>(key) else {
            return false;
        };
        edit(&mut value);
        match serde_json::to_value(&value) {
            Ok(json) => self.cache.replace_value(key, json),
            Err(_) => false,
        }
    }

    pub fn invalidate(&self, prefix: &QueryKey) {
        self.cache.invalidate(prefix);
    }

    pub fn remove(&self, prefix: &QueryKey) {
        self.cache.remove(prefix);
    }

    pub fn clear(&self) {
        self.cache.clear();
    }

    async fn fetch_with_retry<T, F, Fut>(&self, opts: &QueryOptions, fetch: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match fetch().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < opts.retry && e.is_retryable() => {
                    attempt += 1;
                    let delay = self.retry_delay(attempt);
                    debug!(
                        key = %opts.key,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying query"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use outfit_core::keys::{analyses, products};
    use std::sync::atomic::{AtomicU32, Ordering};

    const WINDOW: Duration = Duration::from_secs(300);

    fn fast() -> QueryClient {
        QueryClient::new().with_backoff(Duration::from_millis(1), Duration::from_millis(5))
    }

    fn server_error(status: u16) -> ApiError {
        ApiError::Api {
            message: "boom".into(),
            status,
            code: None,
            details: None,
        }
    }

    #[tokio::test]
    async fn fresh_entry_is_served_without_fetching() {
        let q = fast();
        let calls = &AtomicU32::new(0);
        let opts = QueryOptions::new(analyses::detail("a1")).stale_time(WINDOW);

        for _ in 0..3 {
            let v: String = q
                .query(opts.clone(), move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok("value".to_string())
                })
                .await
                .unwrap();
            assert_eq!(v, "value");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_window_refetches_every_time() {
        let q = fast();
        let calls = &AtomicU32::new(0);
        let opts = QueryOptions::new(analyses::detail("a1"));
        for _ in 0..2 {
            let _: u32 = q
                .query(opts.clone(), move || async move { Ok(calls.fetch_add(1, Ordering::SeqCst)) })
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn disabled_query_never_fetches() {
        let q = fast();
        let calls = &AtomicU32::new(0);
        let out: Option<u32> = q
            .query_if(false, QueryOptions::new(products::detail("")), move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(1)
            })
            .await
            .unwrap();
        assert!(out.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn retries_transient_failures_up_to_budget() {
        let q = fast();
        let calls = &AtomicU32::new(0);
        let opts = QueryOptions::new(products::detail("p1")).retry(2);
        let v: u32 = q
            .query(opts, move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(ApiError::Timeout)
                } else {
                    Ok(7)
                }
            })
            .await
            .unwrap();
        assert_eq!(v, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_retry_budget() {
        let q = fast();
        let calls = &AtomicU32::new(0);
        let opts = QueryOptions::new(products::detail("p1")).retry(2);
        let err = q
            .query::<u32, _, _>(opts, move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(server_error(503))
            })
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(503));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let q = fast();
        let calls = &AtomicU32::new(0);
        let opts = QueryOptions::new(products::detail("p1")).retry(3);
        let _ = q
            .query::<u32, _, _>(opts, move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(server_error(404))
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn read_in_flight_across_clear_is_not_cached() {
        let q = fast();
        let key = analyses::detail("a1");
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let release_rx = std::sync::Mutex::new(Some(release_rx));

        let read = q.query(QueryOptions::new(key.clone()).stale_time(WINDOW), || {
            let rx = release_rx.lock().unwrap().take();
            async move {
                if let Some(rx) = rx {
                    let _ = rx.await;
                }
                Ok("previous user".to_string())
            }
        });
        let clear = async {
            tokio::task::yield_now().await;
            q.clear();
            let _ = release_tx.send(());
        };
        let (v, _) = tokio::join!(read, clear);

        assert_eq!(v.unwrap(), "previous user");
        assert!(!q.cache().contains(&key));
    }

    #[test]
    fn backoff_doubles_then_caps() {
        let q = QueryClient::new();
        assert_eq!(q.retry_delay(1), Duration::from_secs(1));
        assert_eq!(q.retry_delay(2), Duration::from_secs(2));
        assert_eq!(q.retry_delay(3), Duration::from_secs(4));
        assert_eq!(q.retry_delay(10), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn failed_mutation_applies_no_effects() {
        let q = fast();
        q.set_query_data(analyses::detail("a1"), &"cached", WINDOW);
        let res: Result<()> = q
            .mutate(async { Err(server_error(500)) }, |_| {
                vec![CacheEffect::Remove(analyses::all())]
            })
            .await;
        assert!(res.is_err());
        assert!(q.cache().contains(&analyses::detail("a1")));
    }

    #[tokio::test]
    async fn successful_mutation_applies_effects() {
        let q = fast();
        q.set_query_data(analyses::list(&Default::default()), &Vec::<u32>::new(), WINDOW);
        q.mutate(async { Ok("a9".to_string()) }, |id| {
            vec![
                CacheEffect::Invalidate(analyses::lists()),
                CacheEffect::seed(analyses::detail(id), id, WINDOW),
            ]
        })
        .await
        .unwrap();

        assert!(q.cache().is_stale(&analyses::list(&Default::default())));
        assert_eq!(
            q.get_query_data::<String>(&analyses::detail("a9")).as_deref(),
            Some("a9")
        );
    }

    #[test]
    fn update_query_data_edits_in_place() {
        let q = QueryClient::new();
        q.set_query_data(analyses::detail("a1"), &vec![1, 2], WINDOW);
        assert!(q.update_query_data::<Vec<u32>, _>(&analyses::detail("a1"), |v| v.push(3)));
        assert_eq!(
            q.get_query_data::<Vec<u32>>(&analyses::detail("a1")),
            Some(vec![1, 2, 3])
        );
        assert!(!q.update_query_data::<Vec<u32>, _>(&analyses::detail("zz"), |v| v.clear()));
    }
}
