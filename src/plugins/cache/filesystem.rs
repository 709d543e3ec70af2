//! Filesystem-based cache implementation
//!
//! Each entry is a single file `base_path/<shard>/<digest>.entry`: one line of
//! JSON holding the original key and [`CacheMeta`], then the raw body. The
//! digest is the SHA-256 of the cache key, so any key maps to a safe,
//! fixed-length filename.
//!
//! Writes go to a temporary file unique to that write and are renamed into
//! place, so a reader sees either the previous entry or the new one, body and
//! metadata together.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::CacheError;

use super::traits::{CacheEntry, CacheMeta, CachePlugin, CacheStats};

const ENTRY_EXT: &str = "entry";
const TMP_EXT: &str = "tmp";

/// Configuration for the filesystem cache
#[derive(Debug, Clone)]
pub struct FilesystemCacheConfig {
    /// Base path for cache storage
    pub base_path: PathBuf,
    /// Maximum total body size in bytes
    pub max_size_bytes: u64,
}

impl Default for FilesystemCacheConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("ghly.cache"),
            max_size_bytes: 1024 * 1024 * 1024,
        }
    }
}

/// First line of an entry file
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EntryHeader {
    key: String,
    #[serde(flatten)]
    meta: CacheMeta,
}

impl EntryHeader {
    fn encode(&self, body: &[u8]) -> Result<Vec<u8>, CacheError> {
        // Compact JSON never contains a raw newline.
        let mut out =
            serde_json::to_vec(self).map_err(|e| CacheError::Serialization(e.to_string()))?;
        out.reserve(body.len() + 1);
        out.push(b'\n');
        out.extend_from_slice(body);
        Ok(out)
    }

    fn decode(raw: Vec<u8>) -> Result<(EntryHeader, Bytes), CacheError> {
        let split = raw
            .iter()
            .position(|b| *b == b'\n')
            .ok_or_else(|| CacheError::Serialization("entry header not terminated".to_string()))?;
        let header: EntryHeader = serde_json::from_slice(&raw[..split])
            .map_err(|e| CacheError::Serialization(e.to_string()))?;
        let body = Bytes::from(raw).slice(split + 1..);
        Ok((header, body))
    }
}

#[derive(Debug, Clone)]
struct Tracked {
    size: u64,
    last_accessed: DateTime<Utc>,
}

#[derive(Default)]
struct FsState {
    total_size: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
    tracked: HashMap<String, Tracked>,
}

impl FsState {
    fn forget(&mut self, key: &str) {
        if let Some(old) = self.tracked.remove(key) {
            self.total_size = self.total_size.saturating_sub(old.size);
        }
    }

    fn track(&mut self, key: &str, size: u64) {
        self.forget(key);
        self.total_size += size;
        self.tracked.insert(
            key.to_string(),
            Tracked {
                size,
                last_accessed: Utc::now(),
            },
        );
    }
}

/// Filesystem-based cache with a size cap and LRU eviction
pub struct FilesystemCache {
    config: FilesystemCacheConfig,
    state: RwLock<FsState>,
    write_seq: AtomicU64,
}

impl FilesystemCache {
    /// Opens the cache directory, creating it if needed
    ///
    /// Existing entries are indexed; expired ones and leftover temporary
    /// files are removed.
    pub async fn open(config: FilesystemCacheConfig) -> Result<Self, CacheError> {
        fs::create_dir_all(&config.base_path).await?;

        let cache = Self {
            config,
            state: RwLock::new(FsState::default()),
            write_seq: AtomicU64::new(0),
        };
        let removed = cache.scan().await?;
        if removed > 0 {
            debug!(removed, "Removed expired cache files on startup");
        }
        Ok(cache)
    }

    fn digest(key: &str) -> String {
        hex::encode(Sha256::digest(key.as_bytes()))
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let digest = Self::digest(key);
        self.config
            .base_path
            .join(&digest[..2])
            .join(format!("{}.{}", digest, ENTRY_EXT))
    }

    /// Temporary path private to one write
    fn temp_path(&self, entry_path: &Path) -> PathBuf {
        let seq = self.write_seq.fetch_add(1, Ordering::Relaxed);
        entry_path.with_extension(format!("{}.{}.{}", std::process::id(), seq, TMP_EXT))
    }

    async fn remove_entry(&self, key: &str) {
        let _ = fs::remove_file(self.entry_path(key)).await;
    }

    /// Reads the whole entry, `None` if the file is absent
    async fn read_entry(path: &Path) -> Result<Option<(EntryHeader, Bytes)>, CacheError> {
        match fs::read(path).await {
            Ok(raw) => EntryHeader::decode(raw).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Reads only the header line and reports the body size
    async fn read_header(path: &Path) -> Result<Option<(EntryHeader, u64)>, CacheError> {
        let file = match fs::File::open(path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let file_len = file.metadata().await?.len();

        let mut line = Vec::new();
        let read = BufReader::new(file).read_until(b'\n', &mut line).await?;
        if line.last() != Some(&b'\n') {
            return Err(CacheError::Serialization(
                "entry header not terminated".to_string(),
            ));
        }
        let header: EntryHeader = serde_json::from_slice(&line[..line.len() - 1])
            .map_err(|e| CacheError::Serialization(e.to_string()))?;
        Ok(Some((header, file_len.saturating_sub(read as u64))))
    }

    /// Indexes entries under the base path, dropping expired ones
    async fn scan(&self) -> Result<u64, CacheError> {
        let mut removed = 0u64;
        let mut shards = fs::read_dir(&self.config.base_path).await?;
        let mut state = self.state.write().await;

        while let Some(shard) = shards.next_entry().await? {
            if !shard.file_type().await?.is_dir() {
                continue;
            }
            let mut files = fs::read_dir(shard.path()).await?;
            while let Some(file) = files.next_entry().await? {
                let path = file.path();
                match path.extension().and_then(|e| e.to_str()) {
                    Some(ENTRY_EXT) => {}
                    Some(TMP_EXT) => {
                        let _ = fs::remove_file(&path).await;
                        continue;
                    }
                    _ => continue,
                }

                let (header, size) = match Self::read_header(&path).await {
                    Ok(Some(found)) => found,
                    Ok(None) => continue,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Skipping unreadable cache entry");
                        continue;
                    }
                };

                if header.meta.is_expired() {
                    let _ = fs::remove_file(&path).await;
                    removed += 1;
                    continue;
                }
                state.track(&header.key, size);
            }
        }

        Ok(removed)
    }

    async fn evict_until_fits(&self, incoming: u64) {
        loop {
            let victim = {
                let mut state = self.state.write().await;
                if state.total_size + incoming <= self.config.max_size_bytes
                    || state.tracked.is_empty()
                {
                    return;
                }
                let key = state
                    .tracked
                    .iter()
                    .min_by_key(|(_, t)| t.last_accessed)
                    .map(|(k, _)| k.clone());
                if let Some(ref key) = key {
                    state.forget(key);
                    state.evictions += 1;
                }
                key
            };

            match victim {
                Some(key) => {
                    debug!(cache_key = %key, "Evicting least recently used cache entry");
                    self.remove_entry(&key).await;
                }
                None => return,
            }
        }
    }

    async fn miss(&self, forget: Option<&str>) -> Result<Option<CacheEntry>, CacheError> {
        let mut state = self.state.write().await;
        if let Some(key) = forget {
            state.forget(key);
        }
        state.misses += 1;
        Ok(None)
    }
}

#[async_trait]
impl CachePlugin for FilesystemCache {
    fn name(&self) -> &str {
        "filesystem"
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let path = self.entry_path(key);

        let (header, data) = match Self::read_entry(&path).await? {
            Some((header, data)) if header.key == key => (header, data),
            _ => return self.miss(None).await,
        };

        if header.meta.is_expired() {
            let _ = fs::remove_file(&path).await;
            return self.miss(Some(key)).await;
        }

        let mut state = self.state.write().await;
        state.hits += 1;
        if let Some(tracked) = state.tracked.get_mut(key) {
            tracked.last_accessed = Utc::now();
        }

        Ok(Some(CacheEntry {
            data,
            meta: header.meta,
        }))
    }

    async fn set(&self, key: &str, data: Bytes, meta: CacheMeta) -> Result<(), CacheError> {
        let size = data.len() as u64;
        self.evict_until_fits(size).await;

        let path = self.entry_path(key);
        if let Some(shard) = path.parent() {
            fs::create_dir_all(shard).await?;
        }

        let contents = EntryHeader {
            key: key.to_string(),
            meta,
        }
        .encode(&data)?;

        let tmp = self.temp_path(&path);
        if let Err(e) = fs::write(&tmp, &contents).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        self.state.write().await.track(key, size);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.state.write().await.forget(key);
        self.remove_entry(key).await;
        Ok(())
    }

    async fn stats(&self) -> CacheStats {
        let state = self.state.read().await;
        CacheStats {
            entries: state.tracked.len() as u64,
            total_size_bytes: state.total_size,
            hits: state.hits,
            misses: state.misses,
            evictions: state.evictions,
        }
    }

    async fn purge(&self) -> Result<(), CacheError> {
        let keys: Vec<String> = {
            let mut state = self.state.write().await;
            state.total_size = 0;
            state.tracked.drain().map(|(k, _)| k).collect()
        };
        for key in keys {
            self.remove_entry(&key).await;
        }
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, CacheError> {
        let keys: Vec<String> = self.state.read().await.tracked.keys().cloned().collect();
        let mut removed = 0u64;

        for key in keys {
            if let Ok(Some((header, _))) = Self::read_header(&self.entry_path(&key)).await {
                if header.meta.is_expired() {
                    self.delete(&key).await?;
                    removed += 1;
                }
            }
        }

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    async fn create_test_cache(max_size_bytes: u64) -> (FilesystemCache, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config = FilesystemCacheConfig {
            base_path: temp_dir.path().to_path_buf(),
            max_size_bytes,
        };
        let cache = FilesystemCache::open(config)
            .await
            .expect("Failed to open cache");
        (cache, temp_dir)
    }

    fn meta(size: u64) -> CacheMeta {
        CacheMeta::new(size, Duration::from_secs(3600), "text/plain")
    }

    fn aged_meta(ttl_secs: u64, age_secs: i64) -> CacheMeta {
        let mut meta = CacheMeta::new(4, Duration::from_secs(ttl_secs), "text/plain");
        meta.created_at = Utc::now() - chrono::Duration::seconds(age_secs);
        meta
    }

    #[tokio::test]
    async fn test_cache_name() {
        let (cache, _temp) = create_test_cache(1024).await;
        assert_eq!(cache.name(), "filesystem");
    }

    #[tokio::test]
    async fn test_set_and_get_entry() {
        let (cache, _temp) = create_test_cache(1024 * 1024).await;
        let data = Bytes::from("Hello, World!");
        let meta = meta(13).with_etag(Some("etag123".to_string()));

        cache.set("gh:acme:widgets:main:a.txt", data.clone(), meta).await.unwrap();

        let entry = cache
            .get("gh:acme:widgets:main:a.txt")
            .await
            .unwrap()
            .expect("Entry should exist");
        assert_eq!(entry.data, data);
        assert_eq!(entry.meta.etag.as_deref(), Some("etag123"));
    }

    #[tokio::test]
    async fn test_get_missing_and_delete_missing() {
        let (cache, _temp) = create_test_cache(1024).await;
        assert!(cache.get("missing").await.unwrap().is_none());
        cache.delete("missing").await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_entry() {
        let (cache, _temp) = create_test_cache(1024).await;
        cache.set("k", Bytes::from("data"), meta(4)).await.unwrap();
        cache.delete("k").await.unwrap();
        assert!(cache.get("k").await.unwrap().is_none());
        assert_eq!(cache.stats().await.entries, 0);
    }

    #[tokio::test]
    async fn test_ttl_five_seconds_hit_then_miss() {
        let (cache, _temp) = create_test_cache(1024).await;

        cache.set("k4", Bytes::from("data"), aged_meta(5, 4)).await.unwrap();
        assert!(cache.get("k4").await.unwrap().is_some());

        cache.set("k6", Bytes::from("data"), aged_meta(5, 6)).await.unwrap();
        assert!(cache.get("k6").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_entries_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let config = FilesystemCacheConfig {
            base_path: temp_dir.path().to_path_buf(),
            max_size_bytes: 1024,
        };

        {
            let cache = FilesystemCache::open(config.clone()).await.unwrap();
            cache.set("live", Bytes::from("keep"), meta(4)).await.unwrap();
            cache.set("stale", Bytes::from("drop"), aged_meta(1, 10)).await.unwrap();
        }

        let reopened = FilesystemCache::open(config).await.unwrap();
        let stats = reopened.stats().await;
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.total_size_bytes, 4);
        assert_eq!(
            reopened.get("live").await.unwrap().unwrap().data,
            Bytes::from("keep")
        );
    }

    #[tokio::test]
    async fn test_lru_eviction() {
        let (cache, _temp) = create_test_cache(100).await;

        cache.set("key1", Bytes::from(vec![0u8; 50]), meta(50)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        cache.set("key2", Bytes::from(vec![1u8; 50]), meta(50)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        cache.set("key3", Bytes::from(vec![2u8; 50]), meta(50)).await.unwrap();

        let stats = cache.stats().await;
        assert!(stats.evictions >= 1);
        assert!(stats.total_size_bytes <= 100);
        assert!(cache.get("key1").await.unwrap().is_none());
        assert!(cache.get("key3").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_overwrite_updates_size() {
        let (cache, _temp) = create_test_cache(1024).await;
        cache.set("k", Bytes::from("Original"), meta(8)).await.unwrap();
        cache.set("k", Bytes::from("Updated content"), meta(15)).await.unwrap();

        let stats = cache.stats().await;
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.total_size_bytes, 15);
    }

    #[tokio::test]
    async fn test_keys_with_special_characters_do_not_collide() {
        let (cache, _temp) = create_test_cache(1024).await;

        cache.set("path/with/slashes", Bytes::from("a"), meta(1)).await.unwrap();
        cache.set("path:with:colons", Bytes::from("b"), meta(1)).await.unwrap();
        cache.set("../escape", Bytes::from("c"), meta(1)).await.unwrap();

        assert_eq!(cache.get("path/with/slashes").await.unwrap().unwrap().data, "a");
        assert_eq!(cache.get("path:with:colons").await.unwrap().unwrap().data, "b");
        assert_eq!(cache.get("../escape").await.unwrap().unwrap().data, "c");
        assert_eq!(cache.stats().await.entries, 3);
    }

    #[tokio::test]
    async fn test_entry_file_layout() {
        let (cache, temp_dir) = create_test_cache(1024).await;
        cache.set("meta_test", Bytes::from("Test"), meta(4)).await.unwrap();

        let digest = FilesystemCache::digest("meta_test");
        let entry_path = temp_dir
            .path()
            .join(&digest[..2])
            .join(format!("{}.{}", digest, ENTRY_EXT));
        let raw = std::fs::read(entry_path).unwrap();
        let split = raw.iter().position(|b| *b == b'\n').unwrap();
        let header = String::from_utf8_lossy(&raw[..split]);
        assert!(header.contains("meta_test"));
        assert!(header.contains("text/plain"));
        assert_eq!(&raw[split + 1..], b"Test");
    }

    #[tokio::test]
    async fn test_body_may_contain_newlines() {
        let (cache, _temp) = create_test_cache(1024).await;
        let body = Bytes::from("line one\nline two\n");
        cache.set("k", body.clone(), meta(body.len() as u64)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().unwrap().data, body);
    }

    #[tokio::test]
    async fn test_open_removes_leftover_temp_files() {
        let temp_dir = TempDir::new().unwrap();
        let shard = temp_dir.path().join("ab");
        std::fs::create_dir_all(&shard).unwrap();
        let leftover = shard.join("abcd.1.7.tmp");
        std::fs::write(&leftover, b"partial").unwrap();

        let cache = FilesystemCache::open(FilesystemCacheConfig {
            base_path: temp_dir.path().to_path_buf(),
            max_size_bytes: 1024,
        })
        .await
        .unwrap();

        assert!(!leftover.exists());
        assert_eq!(cache.stats().await.entries, 0);
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_an_error() {
        let (cache, _temp) = create_test_cache(1024).await;
        let path = cache.entry_path("k");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"no header here").unwrap();

        assert!(matches!(
            cache.get("k").await,
            Err(CacheError::Serialization(_))
        ));
    }

    // Concurrent writers to one key must never produce a torn entry
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_set_same_key_never_tears() {
        let (cache, _temp) = create_test_cache(64 * 1024 * 1024).await;
        let cache = std::sync::Arc::new(cache);
        let large = Bytes::from(vec![b'L'; 200 * 1024]);
        let small = Bytes::from_static(b"small-body");

        for _round in 0..50 {
            let mut handles = Vec::new();
            for i in 0..4 {
                let cache = cache.clone();
                let body = if i % 2 == 0 { large.clone() } else { small.clone() };
                handles.push(tokio::spawn(async move {
                    let meta = meta(body.len() as u64);
                    cache.set("k", body, meta).await
                }));
            }
            for handle in handles {
                handle.await.unwrap().expect("concurrent set failed");
            }

            let entry = cache.get("k").await.unwrap().expect("entry missing");
            assert!(entry.data == large || entry.data == small);
            assert_eq!(entry.meta.size, entry.data.len() as u64);
        }

        assert_eq!(cache.stats().await.entries, 1);
    }

    #[tokio::test]
    async fn test_purge_and_purge_expired() {
        let (cache, _temp) = create_test_cache(1024).await;
        cache.set("valid", Bytes::from("Valid"), meta(5)).await.unwrap();
        cache.set("expired", Bytes::from("Expired"), aged_meta(0, 10)).await.unwrap();

        assert_eq!(cache.purge_expired().await.unwrap(), 1);
        assert_eq!(cache.stats().await.entries, 1);

        cache.purge().await.unwrap();
        let stats = cache.stats().await;
        assert_eq!(stats.entries, 0);
        assert_eq!(stats.total_size_bytes, 0);
        assert!(cache.get("valid").await.unwrap().is_none());
    }
}
