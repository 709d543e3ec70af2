//! Startup wiring
//!
//! Turns a validated [`Config`] into the objects the server needs. Backend
//! selection happens here, once; the engine only sees `Arc<dyn CachePlugin>`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::config::{CacheBackend, Config};
use crate::error::AppError;
use crate::otel::Metrics;
use crate::plugins::cache::{
    CachePlugin, FilesystemCache, FilesystemCacheConfig, MemoryCache, MemoryCacheConfig,
    RedisCache, RedisCacheConfig,
};
use crate::plugins::upstream::{GitHubRawClient, GitHubRawConfig};
use crate::proxy::ProxyEngine;

/// Instantiates the configured cache backend
pub async fn build_cache(config: &Config) -> Result<Arc<dyn CachePlugin>, AppError> {
    let cache: Arc<dyn CachePlugin> = match config.cache_backend() {
        CacheBackend::Memory => Arc::new(MemoryCache::new(MemoryCacheConfig {
            max_entries: config.cache.memory.max_entries,
        })),
        CacheBackend::Filesystem => {
            let fs = &config.cache.filesystem;
            Arc::new(
                FilesystemCache::open(FilesystemCacheConfig {
                    base_path: PathBuf::from(&fs.base_path),
                    max_size_bytes: fs.max_size_mb.saturating_mul(1024 * 1024),
                })
                .await?,
            )
        }
        CacheBackend::Redis => {
            let redis = config.cache.redis.clone().unwrap_or_default();
            Arc::new(
                RedisCache::connect(RedisCacheConfig {
                    url: redis.url,
                    prefix: redis.prefix,
                    pool_size: redis.pool_size,
                    timeout: Duration::from_secs(redis.timeout_secs),
                })
                .await?,
            )
        }
    };

    info!(backend = cache.name(), "Cache backend initialized");
    Ok(cache)
}

/// Builds the proxy engine around an existing cache
pub fn build_engine(
    config: &Config,
    cache: Arc<dyn CachePlugin>,
    metrics: Arc<Metrics>,
) -> Result<ProxyEngine, AppError> {
    let guard = config.whitelist_guard()?;
    if guard.is_unrestricted() {
        info!("Whitelist empty, all repositories allowed");
    } else {
        info!(rules = guard.rule_count(), "Whitelist loaded");
    }

    let fetcher = GitHubRawClient::new(GitHubRawConfig {
        base_url: config.upstream.github_raw_url.clone(),
        timeout: config.upstream.timeout(),
        user_agent: config.upstream.user_agent.clone(),
    })?;

    Ok(ProxyEngine::new(
        Arc::new(guard),
        cache,
        Arc::new(fetcher),
        config.cache.ttl(),
        metrics,
    ))
}
