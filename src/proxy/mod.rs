//! Caching and access-control decision layer

mod engine;
mod key;

pub use engine::{CacheSource, ProxyEngine, ProxyResult, ServedContent};
pub use key::{ContentKey, DEFAULT_REF};
