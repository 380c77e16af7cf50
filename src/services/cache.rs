use crate::models::response::ResponseEnvelope;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_millis(250);

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("Cache backend unavailable: {0}")]
    Unavailable(String),
    #[error("Cache operation timed out after {0:?}")]
    Timeout(Duration),
}

/// Exact request signature used as cache key: method, normalized path and
/// the raw query string in request order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(method: &str, path: &str, query: Option<&str>) -> Self {
        let trimmed = path.trim_end_matches('/');
        let path = if trimmed.is_empty() { "/" } else { trimmed };

        match query.filter(|q| !q.is_empty()) {
            Some(query) => Self(format!("{} {}?{}", method.to_uppercase(), path, query)),
            None => Self(format!("{} {}", method.to_uppercase(), path)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Volatile key-value store with per-entry expiry.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Drop every entry.
    async fn flush(&self) -> Result<(), CacheError>;
}

/// Redis backend. The multiplexed connection is opened on first use and
/// shared by every request; it is re-opened after a failure.
pub struct RedisCache {
    client: redis::Client,
    conn: Mutex<Option<MultiplexedConnection>>,
}

impl RedisCache {
    pub fn new(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        Ok(Self {
            client,
            conn: Mutex::new(None),
        })
    }

    async fn connection(&self) -> Result<MultiplexedConnection, CacheError> {
        let mut guard = self.conn.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }
        let conn = self.client.get_multiplexed_async_connection().await?;
        *guard = Some(conn.clone());
        Ok(conn)
    }

    async fn reset(&self) {
        *self.conn.lock().await = None;
    }

    async fn checked<T>(&self, result: Result<T, redis::RedisError>) -> Result<T, CacheError> {
        match result {
            Ok(value) => Ok(value),
            Err(e) => {
                if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() {
                    self.reset().await;
                }
                Err(CacheError::Redis(e))
            }
        }
    }
}

#[async_trait]
impl CacheBackend for RedisCache {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection().await?;
        let result: Result<Option<String>, _> = conn.get(key).await;
        self.checked(result).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let result: Result<(), _> = conn.set_ex(key, value, ttl.as_secs().max(1)).await;
        self.checked(result).await
    }

    async fn flush(&self) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let result: Result<(), _> = redis::cmd("FLUSHDB").query_async(&mut conn).await;
        self.checked(result).await
    }
}

/// In-process backend, used when no Redis URL is configured. Expired entries
/// are swept on every write.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        entries.values().filter(|(_, expires)| *expires > now).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut entries = self.entries.lock().await;
        let expired = match entries.get(key) {
            Some((value, expires)) if *expires > Instant::now() => return Ok(Some(value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        entries.retain(|_, (_, expires)| *expires > now);
        entries.insert(key.to_string(), (value.to_string(), now + ttl));
        Ok(())
    }

    async fn flush(&self) -> Result<(), CacheError> {
        self.entries.lock().await.clear();
        Ok(())
    }
}

/// Cache-aside wrapper around a [`CacheBackend`]. Backend failures never
/// reach the caller: lookups degrade to misses, writes are dropped.
#[derive(Clone)]
pub struct ResponseCache {
    backend: Arc<dyn CacheBackend>,
    ttl: Duration,
    lookup_timeout: Duration,
}

impl ResponseCache {
    pub fn new(backend: Arc<dyn CacheBackend>, ttl: Duration, lookup_timeout: Duration) -> Self {
        Self {
            backend,
            ttl,
            lookup_timeout,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    async fn bounded<T, Fut>(&self, operation: Fut) -> Result<T, CacheError>
    where
        Fut: Future<Output = Result<T, CacheError>>,
    {
        match timeout(self.lookup_timeout, operation).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout(self.lookup_timeout)),
        }
    }

    pub async fn lookup(&self, key: &CacheKey) -> Option<String> {
        match self.bounded(self.backend.get(key.as_str())).await {
            Ok(Some(value)) => {
                debug!("Cache hit for {}", key);
                Some(value)
            }
            Ok(None) => {
                debug!("Cache miss for {}", key);
                None
            }
            Err(e) => {
                warn!("Cache lookup for {} failed, falling back to store: {}", key, e);
                None
            }
        }
    }

    /// Best-effort write. Only successful envelopes are kept.
    pub async fn store(&self, key: &CacheKey, envelope: &ResponseEnvelope<serde_json::Value>) {
        if !envelope.status {
            return;
        }

        let payload = match serde_json::to_string(envelope) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to serialize response for {}: {}", key, e);
                return;
            }
        };

        let result = self
            .bounded(self.backend.set(key.as_str(), &payload, self.ttl))
            .await;
        if let Err(e) = result {
            warn!("Failed to cache response for {}: {}", key, e);
        }
    }

    /// Drop every cached response. Failures are logged, not retried.
    pub async fn invalidate_all(&self) {
        match self.bounded(self.backend.flush()).await {
            Ok(()) => info!("Response cache ({}) invalidated", self.backend_name()),
            Err(e) => warn!(
                "Failed to invalidate response cache ({}): {}",
                self.backend_name(),
                e
            ),
        }
    }

    pub async fn fetch<F, Fut>(
        &self,
        key: &CacheKey,
        compute: F,
    ) -> ResponseEnvelope<serde_json::Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ResponseEnvelope<serde_json::Value>>,
    {
        if let Some(cached) = self.lookup(key).await {
            match serde_json::from_str(&cached) {
                Ok(envelope) => return envelope,
                Err(e) => warn!("Discarding undecodable cache entry for {}: {}", key, e),
            }
        }

        let envelope = compute().await;
        self.store(key, &envelope).await;
        envelope
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingCache;

    #[async_trait]
    impl CacheBackend for FailingCache {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            Err(CacheError::Unavailable("connection refused".to_string()))
        }

        async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("connection refused".to_string()))
        }

        async fn flush(&self) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("connection refused".to_string()))
        }
    }

    struct StalledCache;

    #[async_trait]
    impl CacheBackend for StalledCache {
        fn name(&self) -> &'static str {
            "stalled"
        }

        async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(None)
        }

        async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), CacheError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        }

        async fn flush(&self) -> Result<(), CacheError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        }
    }

    fn cache_with(backend: Arc<dyn CacheBackend>) -> ResponseCache {
        ResponseCache::new(backend, DEFAULT_TTL, Duration::from_millis(50))
    }

    fn ok_envelope(n: u64) -> ResponseEnvelope<serde_json::Value> {
        ResponseEnvelope::ok("Countries fetched successfully", json!({ "n": n }))
    }

    #[test]
    fn keys_follow_request_signature() {
        let a = CacheKey::new("GET", "/countries", Some("page=1&limit=10"));
        let b = CacheKey::new("get", "/countries/", Some("page=1&limit=10"));
        let c = CacheKey::new("GET", "/countries", Some("page=2&limit=10"));
        let d = CacheKey::new("GET", "/countries", Some("limit=10&page=1"));

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_eq!(a.as_str(), "GET /countries?page=1&limit=10");
        assert_eq!(CacheKey::new("GET", "/regions", Some("")).as_str(), "GET /regions");
        assert_eq!(CacheKey::new("GET", "/", None).as_str(), "GET /");
    }

    #[tokio::test]
    async fn second_fetch_is_served_from_cache() {
        let cache = cache_with(Arc::new(MemoryCache::new()));
        let key = CacheKey::new("GET", "/regions", None);
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let envelope = cache
                .fetch(&key, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    ok_envelope(1)
                })
                .await;
            assert_eq!(envelope, ok_envelope(1));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let memory = Arc::new(MemoryCache::new());
        let cache = cache_with(memory.clone());
        let key = CacheKey::new("GET", "/statistics", None);

        cache
            .fetch(&key, || async {
                ResponseEnvelope::failure(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_SERVER_ERROR")
            })
            .await;
        assert!(memory.is_empty().await);
    }

    #[tokio::test]
    async fn unavailable_backend_fails_open() {
        let cache = cache_with(Arc::new(FailingCache));
        let key = CacheKey::new("GET", "/languages", None);

        let envelope = cache.fetch(&key, || async { ok_envelope(7) }).await;
        assert_eq!(envelope, ok_envelope(7));
        cache.invalidate_all().await;
    }

    #[tokio::test]
    async fn stalled_backend_is_bounded() {
        let cache = cache_with(Arc::new(StalledCache));
        let key = CacheKey::new("GET", "/languages", None);
        let started = Instant::now();

        let envelope = cache.fetch(&key, || async { ok_envelope(3) }).await;
        assert_eq!(envelope, ok_envelope(3));
        cache.invalidate_all().await;
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn invalidate_all_drops_entries() {
        let memory = Arc::new(MemoryCache::new());
        let cache = cache_with(memory.clone());
        let key = CacheKey::new("GET", "/countries", Some("page=1"));

        cache.fetch(&key, || async { ok_envelope(1) }).await;
        assert_eq!(memory.len().await, 1);

        cache.invalidate_all().await;
        assert!(memory.is_empty().await);
        let envelope = cache.fetch(&key, || async { ok_envelope(2) }).await;
        assert_eq!(envelope, ok_envelope(2));
    }

    #[tokio::test]
    async fn memory_entries_expire() {
        let memory = MemoryCache::new();
        memory
            .set("k", "v", Duration::from_millis(10))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(memory.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_entries_are_swept_on_write() {
        let memory = Arc::new(MemoryCache::new());
        let cache = ResponseCache::new(
            memory.clone(),
            Duration::from_millis(5),
            Duration::from_millis(100),
        );

        for n in 0..1000 {
            let key = CacheKey::new("GET", "/countries", Some(format!("x={}", n).as_str()));
            cache.fetch(&key, || async { ok_envelope(n) }).await;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        let key = CacheKey::new("GET", "/countries", Some("x=fresh"));
        cache.fetch(&key, || async { ok_envelope(0) }).await;

        assert_eq!(memory.entries.lock().await.len(), 1);
    }
}
