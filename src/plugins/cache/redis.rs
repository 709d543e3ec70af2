//! Redis-backed cache
//!
//! Entries live under `{prefix}{key}` as a JSON envelope holding the
//! [`CacheMeta`] and the base64-encoded body. Every write carries `EX`, so
//! Redis expires entries on its own; `get` still checks the stored metadata
//! in case the server clock and ours disagree.
//!
//! Shared between instances, so hit and miss counters are per-process.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use fred::clients::Pool;
use fred::interfaces::{ClientLike, KeysInterface};
use fred::types::config::{Config, ReconnectPolicy};
use fred::types::{Builder, CustomCommand, Expiration};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::CacheError;

use super::traits::{CacheEntry, CacheMeta, CachePlugin, CacheStats};

/// Configuration for the Redis cache
#[derive(Debug, Clone)]
pub struct RedisCacheConfig {
    /// Redis connection URL
    pub url: String,
    /// Key prefix for all cache entries
    pub prefix: String,
    /// Number of pooled connections
    pub pool_size: usize,
    /// Deadline for a single command
    pub timeout: Duration,
}

impl Default for RedisCacheConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            prefix: "ghly:".to_string(),
            pool_size: 4,
            timeout: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    meta: CacheMeta,
    data: String,
}

impl Envelope {
    fn encode(data: &[u8], meta: &CacheMeta) -> Result<String, CacheError> {
        serde_json::to_string(&Envelope {
            meta: meta.clone(),
            data: STANDARD.encode(data),
        })
        .map_err(|e| CacheError::Serialization(e.to_string()))
    }

    fn decode(raw: &str) -> Result<CacheEntry, CacheError> {
        let envelope: Envelope =
            serde_json::from_str(raw).map_err(|e| CacheError::Serialization(e.to_string()))?;
        let data = STANDARD
            .decode(envelope.data.as_bytes())
            .map_err(|e| CacheError::Serialization(e.to_string()))?;
        Ok(CacheEntry {
            data: Bytes::from(data),
            meta: envelope.meta,
        })
    }
}

/// Redis cache implementation on a `fred` connection pool
pub struct RedisCache {
    config: RedisCacheConfig,
    pool: Pool,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl RedisCache {
    /// Connects the pool and verifies it with a PING
    pub async fn connect(config: RedisCacheConfig) -> Result<Self, CacheError> {
        let fred_config =
            Config::from_url(&config.url).map_err(|e| CacheError::Backend(e.to_string()))?;

        let mut builder = Builder::from_config(fred_config);
        builder.set_policy(ReconnectPolicy::new_exponential(0, 100, 30_000, 2));

        let pool = builder
            .build_pool(config.pool_size.max(1))
            .map_err(|e| CacheError::Backend(e.to_string()))?;

        let cache = Self {
            config,
            pool,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        };

        cache
            .bounded(async {
                cache.pool.init().await?;
                let _: String = cache.pool.ping(None).await?;
                Ok(())
            })
            .await?;

        info!(
            prefix = %cache.config.prefix,
            pool_size = cache.config.pool_size,
            "Redis cache pool connected"
        );
        Ok(cache)
    }

    fn make_key(&self, key: &str) -> String {
        format!("{}{}", self.config.prefix, key)
    }

    fn pattern(&self) -> String {
        format!("{}*", self.config.prefix)
    }

    /// Applies the command deadline and maps `fred` errors
    async fn bounded<T, F>(&self, op: F) -> Result<T, CacheError>
    where
        F: Future<Output = Result<T, fred::error::Error>>,
    {
        match tokio::time::timeout(self.config.timeout, op).await {
            Ok(result) => result.map_err(|e| CacheError::Backend(e.to_string())),
            Err(_) => Err(CacheError::Timeout),
        }
    }

    async fn keys(&self) -> Result<Vec<String>, CacheError> {
        let pattern = self.pattern();
        self.bounded(self.pool.custom(
            CustomCommand::new_static("KEYS", None::<u16>, false),
            vec![pattern],
        ))
        .await
    }

    fn miss(&self) -> Result<Option<CacheEntry>, CacheError> {
        self.misses.fetch_add(1, Ordering::Relaxed);
        Ok(None)
    }
}

#[async_trait]
impl CachePlugin for RedisCache {
    fn name(&self) -> &str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let redis_key = self.make_key(key);
        let raw: Option<String> = self.bounded(self.pool.get(redis_key.as_str())).await?;

        let Some(raw) = raw else {
            return self.miss();
        };

        let entry = Envelope::decode(&raw)?;
        if entry.meta.is_expired() {
            let _: i64 = self.bounded(self.pool.del(redis_key.as_str())).await?;
            return self.miss();
        }

        self.hits.fetch_add(1, Ordering::Relaxed);
        Ok(Some(entry))
    }

    async fn set(&self, key: &str, data: Bytes, meta: CacheMeta) -> Result<(), CacheError> {
        let ttl_secs = meta.remaining_ttl_secs();
        let payload = Envelope::encode(&data, &meta)?;
        let redis_key = self.make_key(key);

        let _: () = self
            .bounded(self.pool.set(
                redis_key.as_str(),
                payload,
                Some(Expiration::EX(ttl_secs as i64)),
                None,
                false,
            ))
            .await?;

        debug!(cache_key = %redis_key, ttl_secs, "Stored entry in Redis");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let redis_key = self.make_key(key);
        let _: i64 = self.bounded(self.pool.del(redis_key.as_str())).await?;
        Ok(())
    }

    async fn stats(&self) -> CacheStats {
        // Size is not tracked server-side; only the key count is reported.
        let entries = self.keys().await.map(|k| k.len() as u64).unwrap_or(0);
        CacheStats {
            entries,
            total_size_bytes: 0,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: 0,
        }
    }

    async fn purge(&self) -> Result<(), CacheError> {
        for key in self.keys().await? {
            let _: i64 = self.bounded(self.pool.del(key.as_str())).await?;
        }
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, CacheError> {
        // Redis drops keys when their EX elapses.
        Ok(0)
    }
}
