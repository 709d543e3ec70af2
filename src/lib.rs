//! ghly - a caching proxy for GitHub raw content
//!
//! Serves `raw.githubusercontent.com` files through a TTL cache (in-memory,
//! filesystem or Redis) and only for repositories on a configured whitelist.

pub mod app;
pub mod config;
pub mod error;
pub mod otel;
pub mod plugins;
pub mod proxy;
pub mod server;
pub mod whitelist;
