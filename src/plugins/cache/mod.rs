//! Cache plugins for ghly
//!
//! Three interchangeable backends: in-process memory, local filesystem and
//! Redis. All of them apply TTL expiry on read.

pub mod traits;

mod filesystem;
mod memory;
mod redis;
mod sweeper;

pub use traits::{CacheEntry, CacheMeta, CachePlugin, CacheStats};

#[cfg(test)]
pub use traits::MockCachePlugin;

pub use filesystem::{FilesystemCache, FilesystemCacheConfig};
pub use memory::{MemoryCache, MemoryCacheConfig};
pub use redis::{RedisCache, RedisCacheConfig};
pub use sweeper::spawn_expiry_sweeper;
