//! Cache plugin trait and related types
//!
//! Every backend implements [`CachePlugin`]. The proxy engine only ever talks
//! to `Arc<dyn CachePlugin>`, so backends are interchangeable.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::CacheError;

/// A cached entry containing data and metadata
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The cached file content
    pub data: Bytes,
    /// Metadata about the cached entry
    pub meta: CacheMeta,
}

/// Metadata stored next to every cached body
///
/// `ttl` and `created_at` are fixed when the entry is written, so a later
/// change of the configured TTL never affects entries already stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMeta {
    /// Size of the cached data in bytes
    pub size: u64,
    /// Time-to-live duration
    #[serde(with = "duration_secs")]
    pub ttl: Duration,
    /// When the entry was written
    pub created_at: DateTime<Utc>,
    /// ETag reported by the origin
    pub etag: Option<String>,
    /// Content-Type served with the body
    pub content_type: String,
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

impl CacheMeta {
    /// Creates metadata stamped with the current time
    pub fn new(size: u64, ttl: Duration, content_type: impl Into<String>) -> Self {
        Self {
            size,
            ttl,
            created_at: Utc::now(),
            etag: None,
            content_type: content_type.into(),
        }
    }

    /// Attaches an origin ETag
    pub fn with_etag(mut self, etag: Option<String>) -> Self {
        self.etag = etag;
        self
    }

    /// Point in time after which the entry is stale
    pub fn expires_at(&self) -> DateTime<Utc> {
        chrono::Duration::from_std(self.ttl)
            .ok()
            .and_then(|ttl| self.created_at.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Expired when `now - created_at > ttl`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at()
    }

    /// Checks expiry against the wall clock
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Seconds until expiry, rounded up, never below one
    pub fn remaining_ttl_secs(&self) -> u64 {
        let remaining = self.expires_at() - Utc::now();
        let millis = remaining.num_milliseconds().max(0) as u64;
        millis.div_ceil(1000).max(1)
    }
}

/// Statistics about cache usage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Total number of cached entries
    pub entries: u64,
    /// Total size of all cached data in bytes
    pub total_size_bytes: u64,
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Number of evictions due to size limits
    pub evictions: u64,
}

impl CacheStats {
    /// Hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// Key-value store with TTL semantics
///
/// Implementations must be safe for concurrent use; the proxy shares a single
/// instance across all in-flight requests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CachePlugin: Send + Sync {
    /// Returns the name of this cache plugin
    fn name(&self) -> &str;

    /// Retrieves a live entry
    ///
    /// Returns `Ok(None)` if the key was never stored or its TTL has elapsed.
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError>;

    /// Stores or overwrites an entry
    ///
    /// Fails only for backend faults, never for the shape of key or value.
    async fn set(&self, key: &str, data: Bytes, meta: CacheMeta) -> Result<(), CacheError>;

    /// Removes an entry; a missing key is not an error
    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Returns statistics about cache usage
    async fn stats(&self) -> CacheStats;

    /// Deletes all cached entries
    async fn purge(&self) -> Result<(), CacheError>;

    /// Deletes expired entries and returns how many were removed
    async fn purge_expired(&self) -> Result<u64, CacheError>;
}
