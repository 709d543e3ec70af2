//! Application error types for ghly
//!
//! Each concern gets its own `thiserror` enum. Cache faults are always
//! recovered inside the proxy engine; upstream errors are surfaced to the
//! HTTP layer, which maps them to status codes.

use thiserror::Error;

/// Cache backend errors
#[derive(Debug, Error)]
pub enum CacheError {
    /// IO error during cache operation
    #[error("Cache IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Cache serialization error: {0}")]
    Serialization(String),

    /// Backend (e.g. Redis) reported an error or is unreachable
    #[error("Cache backend error: {0}")]
    Backend(String),

    /// Backend operation exceeded its deadline
    #[error("Cache operation timed out")]
    Timeout,
}

/// Errors from fetching content at the origin
#[derive(Debug, Error, Clone, PartialEq)]
pub enum UpstreamError {
    /// The file does not exist at the requested ref
    #[error("Resource not found")]
    NotFound,

    /// Network timeout
    #[error("Network timeout")]
    Timeout,

    /// Connection refused
    #[error("Connection refused")]
    ConnectionRefused,

    /// Unexpected HTTP status from origin
    #[error("Upstream returned HTTP {0}")]
    Status(u16),

    /// Generic network error
    #[error("Network error: {0}")]
    Network(String),

    /// The upstream URL could not be built
    #[error("Invalid upstream URL: {0}")]
    InvalidUrl(String),
}

impl UpstreamError {
    /// Returns true if the origin definitively reported the file missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, UpstreamError::NotFound)
    }

    /// Short label used for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            UpstreamError::NotFound => "not_found",
            UpstreamError::Timeout => "timeout",
            UpstreamError::ConnectionRefused => "connection_refused",
            UpstreamError::Status(_) => "status",
            UpstreamError::Network(_) => "network",
            UpstreamError::InvalidUrl(_) => "invalid_url",
        }
    }
}

/// Application-level error type
///
/// Used at startup and in `main`; request handling never produces it.
#[derive(Debug, Error)]
pub enum AppError {
    /// Cache error
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Upstream error
    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Server error
    #[error("Server error: {0}")]
    Server(#[from] crate::server::ServerError),

    /// Telemetry error
    #[error("Telemetry error: {0}")]
    Otel(#[from] crate::otel::OtelError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;

    #[test]
    fn test_cache_error_messages() {
        assert_eq!(
            CacheError::Serialization("bad json".to_string()).to_string(),
            "Cache serialization error: bad json"
        );
        assert_eq!(
            CacheError::Backend("connection reset".to_string()).to_string(),
            "Cache backend error: connection reset"
        );
        assert_eq!(CacheError::Timeout.to_string(), "Cache operation timed out");
    }

    #[test]
    fn test_cache_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let cache_err: CacheError = io_err.into();
        assert!(matches!(cache_err, CacheError::Io(_)));
    }

    #[test]
    fn test_upstream_error_messages() {
        assert_eq!(UpstreamError::NotFound.to_string(), "Resource not found");
        assert_eq!(UpstreamError::Status(503).to_string(), "Upstream returned HTTP 503");
        assert_eq!(
            UpstreamError::Network("reset".to_string()).to_string(),
            "Network error: reset"
        );
    }

    #[test]
    fn test_upstream_error_not_found_distinguished() {
        assert!(UpstreamError::NotFound.is_not_found());
        assert!(!UpstreamError::Timeout.is_not_found());
        assert!(!UpstreamError::Status(404).is_not_found());
        assert!(!UpstreamError::ConnectionRefused.is_not_found());
    }

    #[test]
    fn test_upstream_error_kind_labels() {
        assert_eq!(UpstreamError::NotFound.kind(), "not_found");
        assert_eq!(UpstreamError::Timeout.kind(), "timeout");
        assert_eq!(UpstreamError::Status(500).kind(), "status");
    }

    #[test]
    fn test_app_error_wraps_sources() {
        let app_err: AppError = CacheError::Timeout.into();
        assert_eq!(app_err.to_string(), "Cache error: Cache operation timed out");

        let app_err: AppError = ConfigError::InvalidValue("ttl".to_string()).into();
        assert_eq!(
            app_err.to_string(),
            "Configuration error: Invalid configuration value: ttl"
        );
    }

    #[test]
    fn test_app_error_wraps_server_and_otel() {
        let app_err: AppError = crate::server::ServerError::Bind("in use".to_string()).into();
        assert!(matches!(app_err, AppError::Server(_)));
        assert_eq!(
            app_err.to_string(),
            "Server error: Failed to bind to address: in use"
        );

        let app_err: AppError = crate::otel::OtelError::Config("no endpoint".to_string()).into();
        assert!(matches!(app_err, AppError::Otel(_)));
        assert_eq!(
            app_err.to_string(),
            "Telemetry error: Configuration error: no endpoint"
        );
    }
}
