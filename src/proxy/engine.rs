//! Per-request decision: deny, serve from cache, or fetch and populate
//!
//! Order of checks is whitelist, then cache, then origin. Cache faults never
//! fail a request: a failed read is a miss and a failed write still serves the
//! fetched body.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::error::{CacheError, UpstreamError};
use crate::otel::Metrics;
use crate::plugins::cache::{CacheMeta, CachePlugin};
use crate::plugins::upstream::ContentFetcher;
use crate::whitelist::WhitelistGuard;

use super::key::ContentKey;

/// Where served bytes came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
    Cache,
    Origin,
}

impl CacheSource {
    /// Value of the `X-Cache-Status` header
    pub fn as_header_value(&self) -> &'static str {
        match self {
            CacheSource::Cache => "HIT",
            CacheSource::Origin => "MISS",
        }
    }
}

/// Body plus the metadata needed to answer the request
#[derive(Debug, Clone, PartialEq)]
pub struct ServedContent {
    pub data: Bytes,
    pub content_type: String,
    pub etag: Option<String>,
}

/// Outcome of [`ProxyEngine::resolve`]
#[derive(Debug, Clone, PartialEq)]
pub enum ProxyResult {
    Served {
        content: ServedContent,
        source: CacheSource,
    },
    Denied,
    UpstreamError(UpstreamError),
}

impl ProxyResult {
    /// Label used for metrics and logs
    pub fn outcome(&self) -> &'static str {
        match self {
            ProxyResult::Served {
                source: CacheSource::Cache,
                ..
            } => "hit",
            ProxyResult::Served {
                source: CacheSource::Origin,
                ..
            } => "miss",
            ProxyResult::Denied => "denied",
            ProxyResult::UpstreamError(e) if e.is_not_found() => "not_found",
            ProxyResult::UpstreamError(_) => "upstream_error",
        }
    }
}

/// Orchestrates guard, cache and fetcher for one request at a time
///
/// Holds no per-request state; a single instance is shared by all handlers.
pub struct ProxyEngine {
    guard: Arc<WhitelistGuard>,
    cache: Arc<dyn CachePlugin>,
    fetcher: Arc<dyn ContentFetcher>,
    ttl: Duration,
    metrics: Arc<Metrics>,
}

impl ProxyEngine {
    pub fn new(
        guard: Arc<WhitelistGuard>,
        cache: Arc<dyn CachePlugin>,
        fetcher: Arc<dyn ContentFetcher>,
        ttl: Duration,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            guard,
            cache,
            fetcher,
            ttl,
            metrics,
        }
    }

    pub fn cache(&self) -> &Arc<dyn CachePlugin> {
        &self.cache
    }

    pub fn guard(&self) -> &WhitelistGuard {
        &self.guard
    }

    /// TTL stamped on new entries
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Resolves one request
    ///
    /// With `bypass_cache` the origin is always consulted and a successful
    /// fetch overwrites the entry; the old entry is never deleted first.
    pub async fn resolve(&self, key: &ContentKey, bypass_cache: bool) -> ProxyResult {
        let started = Instant::now();
        let result = self.decide(key, bypass_cache).await;

        let outcome = result.outcome();
        self.metrics.record_request(outcome);
        self.metrics
            .record_request_duration(outcome, started.elapsed().as_secs_f64());
        result
    }

    async fn decide(&self, key: &ContentKey, bypass_cache: bool) -> ProxyResult {
        let cache_key = key.cache_key();

        if !self.guard.is_allowed(key.owner(), key.repo()) {
            info!(
                owner = key.owner(),
                repo = key.repo(),
                "Repository not in whitelist"
            );
            self.metrics.record_denied(key.owner());
            return ProxyResult::Denied;
        }

        if !bypass_cache {
            if let Some(content) = self.lookup(&cache_key).await {
                debug!(cache_key = %cache_key, source = "cache", "Serving cached content");
                return ProxyResult::Served {
                    content,
                    source: CacheSource::Cache,
                };
            }
        } else {
            debug!(cache_key = %cache_key, "Cache bypass requested");
        }

        let fetch_started = Instant::now();
        let fetched = self.fetcher.fetch(key).await;
        self.metrics
            .record_upstream_duration(fetch_started.elapsed().as_secs_f64());

        let fetched = match fetched {
            Ok(fetched) => fetched,
            Err(e) => {
                self.metrics.record_upstream_error(e.kind());
                if e.is_not_found() {
                    debug!(content = %key, "Content not found upstream");
                } else {
                    warn!(content = %key, error = %e, "Upstream fetch failed");
                }
                return ProxyResult::UpstreamError(e);
            }
        };

        let meta = CacheMeta::new(fetched.data.len() as u64, self.ttl, &fetched.content_type)
            .with_etag(fetched.etag.clone());
        self.store(&cache_key, fetched.data.clone(), meta).await;

        debug!(
            cache_key = %cache_key,
            source = "origin",
            size = fetched.data.len(),
            "Serving fetched content"
        );
        ProxyResult::Served {
            content: ServedContent {
                data: fetched.data,
                content_type: fetched.content_type,
                etag: fetched.etag,
            },
            source: CacheSource::Origin,
        }
    }

    async fn lookup(&self, cache_key: &str) -> Option<ServedContent> {
        match self.cache.get(cache_key).await {
            Ok(Some(entry)) => {
                self.metrics.record_cache_hit(self.cache.name());
                Some(ServedContent {
                    data: entry.data,
                    content_type: entry.meta.content_type,
                    etag: entry.meta.etag,
                })
            }
            Ok(None) => {
                self.metrics.record_cache_miss(self.cache.name());
                None
            }
            Err(e) => {
                warn!(
                    cache_key = %cache_key,
                    backend = self.cache.name(),
                    error = %e,
                    "Cache read failed, treating as miss"
                );
                self.metrics.record_cache_fault(self.cache.name(), "get");
                self.metrics.record_cache_miss(self.cache.name());
                None
            }
        }
    }

    async fn store(&self, cache_key: &str, data: Bytes, meta: CacheMeta) {
        if let Err(e) = self.cache.set(cache_key, data, meta).await {
            warn!(
                cache_key = %cache_key,
                backend = self.cache.name(),
                error = %e,
                "Cache write failed, serving uncached"
            );
            self.metrics.record_cache_fault(self.cache.name(), "set");
        }
    }

    /// Drops the cached entry for `key`
    pub async fn invalidate(&self, key: &ContentKey) -> Result<(), CacheError> {
        let cache_key = key.cache_key();
        self.cache.delete(&cache_key).await?;
        info!(cache_key = %cache_key, "Cache entry invalidated");
        Ok(())
    }
}
