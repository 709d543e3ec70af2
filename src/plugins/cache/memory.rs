//! In-process cache
//!
//! A `HashMap` behind a tokio `RwLock`. Expiry is checked lazily on `get`;
//! nothing survives a restart. Suitable for single-instance deployments and
//! tests.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use crate::error::CacheError;

use super::traits::{CacheEntry, CacheMeta, CachePlugin, CacheStats};

/// Configuration for the in-memory cache
#[derive(Debug, Clone, Default)]
pub struct MemoryCacheConfig {
    /// Upper bound on stored entries; `None` means unbounded
    pub max_entries: Option<usize>,
}

#[derive(Default)]
struct MemoryState {
    entries: HashMap<String, CacheEntry>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl MemoryState {
    fn evict_oldest(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.meta.created_at)
            .map(|(key, _)| key.clone());

        if let Some(key) = oldest {
            self.entries.remove(&key);
            self.evictions += 1;
        }
    }
}

/// In-memory cache implementation
pub struct MemoryCache {
    config: MemoryCacheConfig,
    state: RwLock<MemoryState>,
}

impl MemoryCache {
    pub fn new(config: MemoryCacheConfig) -> Self {
        Self {
            config,
            state: RwLock::new(MemoryState::default()),
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(MemoryCacheConfig::default())
    }
}

#[async_trait]
impl CachePlugin for MemoryCache {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let mut state = self.state.write().await;

        let lookup = state
            .entries
            .get(key)
            .map(|entry| (entry.meta.is_expired(), entry.clone()));

        match lookup {
            Some((false, entry)) => {
                state.hits += 1;
                Ok(Some(entry))
            }
            Some((true, _)) => {
                state.entries.remove(key);
                state.misses += 1;
                Ok(None)
            }
            None => {
                state.misses += 1;
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, data: Bytes, meta: CacheMeta) -> Result<(), CacheError> {
        let mut state = self.state.write().await;

        if let Some(max) = self.config.max_entries {
            while !state.entries.contains_key(key) && state.entries.len() >= max.max(1) {
                state.evict_oldest();
            }
        }

        state
            .entries
            .insert(key.to_string(), CacheEntry { data, meta });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.state.write().await.entries.remove(key);
        Ok(())
    }

    async fn stats(&self) -> CacheStats {
        let state = self.state.read().await;
        CacheStats {
            entries: state.entries.len() as u64,
            total_size_bytes: state.entries.values().map(|e| e.data.len() as u64).sum(),
            hits: state.hits,
            misses: state.misses,
            evictions: state.evictions,
        }
    }

    async fn purge(&self) -> Result<(), CacheError> {
        self.state.write().await.entries.clear();
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, CacheError> {
        let mut state = self.state.write().await;
        let before = state.entries.len();
        state.entries.retain(|_, entry| !entry.meta.is_expired());
        Ok((before - state.entries.len()) as u64)
    }
}
