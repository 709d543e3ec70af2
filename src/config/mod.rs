//! Configuration management for ghly
//!
//! Configuration comes either from a YAML file (with `${VAR}` expansion) or
//! from `GHLY_*` environment variables. It is read once at startup.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::whitelist::{WhitelistGuard, WhitelistRule};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Origin host configuration
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Repository whitelist
    #[serde(default)]
    pub whitelist: WhitelistConfig,

    /// OpenTelemetry configuration
    #[serde(default)]
    pub otel: OtelConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileRead(format!("Failed to read config file: {}", e)))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(yaml);
        serde_yaml::from_str(&expanded)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse YAML: {}", e)))
    }

    /// Load configuration from `GHLY_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(host) = lookup("GHLY_SERVER_HOST") {
            config.server.host = host;
        }
        if let Some(port) = lookup("GHLY_SERVER_PORT") {
            config.server.port = parse_number("GHLY_SERVER_PORT", &port)?;
        }

        if let Some(url) = lookup("GHLY_GITHUB_RAW_URL") {
            config.upstream.github_raw_url = url;
        }
        if let Some(secs) = lookup("GHLY_UPSTREAM_TIMEOUT_SECS") {
            config.upstream.timeout_secs = parse_number("GHLY_UPSTREAM_TIMEOUT_SECS", &secs)?;
        }

        if let Some(ttl) = lookup("GHLY_CACHE_TTL_SECONDS") {
            config.cache.ttl_secs = parse_number("GHLY_CACHE_TTL_SECONDS", &ttl)?;
        }
        if let Some(plugin) = lookup("GHLY_CACHE_PLUGIN") {
            config.cache.plugin = Some(CacheBackend::parse(&plugin)?);
        }
        if let Some(path) = lookup("GHLY_CACHE_PATH") {
            config.cache.filesystem.base_path = path;
        }
        if let Some(url) = lookup("GHLY_REDIS_URL").filter(|u| !u.trim().is_empty()) {
            config.cache.redis = Some(RedisCacheConfig {
                url,
                ..RedisCacheConfig::default()
            });
        }

        if let Some(repositories) = lookup("GHLY_REPOSITORIES") {
            config.whitelist.repositories = repositories
                .split(',')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .map(String::from)
                .collect();
        }

        if let Some(level) = lookup("GHLY_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Some(format) = lookup("GHLY_LOG_FORMAT") {
            config.logging.format = LogFormat::parse(&format)?;
        }

        if let Some(enabled) = lookup("GHLY_OTEL_ENABLED") {
            config.otel.enabled = enabled.parse().unwrap_or(false);
        }
        if let Some(endpoint) = lookup("GHLY_OTEL_ENDPOINT") {
            config.otel.endpoint = Some(endpoint);
        }

        Ok(config)
    }

    /// Checks cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.ttl_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "cache.ttl_secs must be greater than zero".to_string(),
            ));
        }
        if self.upstream.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "upstream.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if let Some(redis) = &self.cache.redis {
            if redis.timeout_secs == 0 {
                return Err(ConfigError::InvalidValue(
                    "cache.redis.timeout_secs must be greater than zero".to_string(),
                ));
            }
        }
        if self.cache.plugin == Some(CacheBackend::Redis) && self.cache.redis.is_none() {
            return Err(ConfigError::MissingRequired(
                "cache.redis is required when cache.plugin is redis".to_string(),
            ));
        }
        self.whitelist_rules()?;
        Ok(())
    }

    /// Parses every whitelist entry
    pub fn whitelist_rules(&self) -> Result<Vec<WhitelistRule>, ConfigError> {
        self.whitelist
            .repositories
            .iter()
            .map(|entry| WhitelistRule::parse(entry))
            .collect()
    }

    /// Builds the immutable guard used by the proxy engine
    pub fn whitelist_guard(&self) -> Result<WhitelistGuard, ConfigError> {
        Ok(WhitelistGuard::new(self.whitelist_rules()?))
    }

    /// Which cache backend to instantiate
    ///
    /// An explicit `plugin` wins; otherwise a configured Redis connection
    /// selects Redis, and the filesystem store is the fallback.
    pub fn cache_backend(&self) -> CacheBackend {
        match self.cache.plugin {
            Some(backend) => backend,
            None if self.cache.redis.is_some() => CacheBackend::Redis,
            None => CacheBackend::Filesystem,
        }
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Parse(format!("Invalid number in {}: {}", name, value)))
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

/// Origin host configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpstreamConfig {
    /// Base URL of the raw content host
    #[serde(default = "default_github_raw_url")]
    pub github_raw_url: String,

    /// Per-fetch deadline in seconds
    #[serde(default = "default_upstream_timeout")]
    pub timeout_secs: u64,

    /// `User-Agent` sent upstream
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            github_raw_url: default_github_raw_url(),
            timeout_secs: default_upstream_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_github_raw_url() -> String {
    "https://raw.githubusercontent.com".to_string()
}

fn default_upstream_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("ghly/{}", env!("CARGO_PKG_VERSION"))
}

/// Cache store variants
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Memory,
    Filesystem,
    Redis,
}

impl CacheBackend {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_lowercase().as_str() {
            "memory" => Ok(CacheBackend::Memory),
            "filesystem" | "file" => Ok(CacheBackend::Filesystem),
            "redis" => Ok(CacheBackend::Redis),
            other => Err(ConfigError::InvalidValue(format!(
                "unknown cache plugin: {}",
                other
            ))),
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheConfig {
    /// Cache plugin to use; see [`Config::cache_backend`]
    #[serde(default)]
    pub plugin: Option<CacheBackend>,

    /// TTL applied to every entry written
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,

    /// Interval of the expiry sweeper; 0 disables it
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Filesystem cache configuration
    #[serde(default)]
    pub filesystem: FilesystemCacheConfig,

    /// In-memory cache configuration
    #[serde(default)]
    pub memory: MemoryCacheConfig,

    /// Redis cache configuration (optional)
    #[serde(default)]
    pub redis: Option<RedisCacheConfig>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            plugin: None,
            ttl_secs: default_cache_ttl(),
            sweep_interval_secs: default_sweep_interval(),
            filesystem: FilesystemCacheConfig::default(),
            memory: MemoryCacheConfig::default(),
            redis: None,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

fn default_cache_ttl() -> u64 {
    300
}

fn default_sweep_interval() -> u64 {
    600
}

/// Filesystem cache configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FilesystemCacheConfig {
    /// Base path for cache storage
    #[serde(default = "default_cache_base_path")]
    pub base_path: String,

    /// Maximum cache size in MB
    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: u64,
}

impl Default for FilesystemCacheConfig {
    fn default() -> Self {
        Self {
            base_path: default_cache_base_path(),
            max_size_mb: default_max_size_mb(),
        }
    }
}

fn default_cache_base_path() -> String {
    "ghly.cache".to_string()
}

fn default_max_size_mb() -> u64 {
    1024
}

/// In-memory cache configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MemoryCacheConfig {
    /// Entry cap; unbounded when absent
    #[serde(default)]
    pub max_entries: Option<usize>,
}

/// Redis cache configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RedisCacheConfig {
    /// Redis connection URL
    pub url: String,

    /// Key prefix
    #[serde(default = "default_redis_prefix")]
    pub prefix: String,

    /// Pooled connections
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,

    /// Per-command deadline in seconds
    #[serde(default = "default_redis_timeout")]
    pub timeout_secs: u64,
}

impl Default for RedisCacheConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            prefix: default_redis_prefix(),
            pool_size: default_redis_pool_size(),
            timeout_secs: default_redis_timeout(),
        }
    }
}

fn default_redis_prefix() -> String {
    "ghly:".to_string()
}

fn default_redis_pool_size() -> usize {
    4
}

fn default_redis_timeout() -> u64 {
    2
}

/// Repository whitelist configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WhitelistConfig {
    /// `owner`, `owner/repo` or GitHub URL entries; empty allows everything
    #[serde(default)]
    pub repositories: Vec<String>,
}

/// OpenTelemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OtelConfig {
    /// Whether OpenTelemetry is enabled
    #[serde(default)]
    pub enabled: bool,

    /// OTLP endpoint URL
    pub endpoint: Option<String>,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            service_name: default_service_name(),
        }
    }
}

fn default_service_name() -> String {
    "ghly".to_string()
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl LogFormat {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" | "text" => Ok(LogFormat::Pretty),
            other => Err(ConfigError::InvalidValue(format!(
                "unknown log format: {}",
                other
            ))),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Configuration error types
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum ConfigError {
    /// Error reading configuration file
    #[error("Failed to read configuration file: {0}")]
    FileRead(String),

    /// Error parsing configuration
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// Invalid configuration value
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// Missing required configuration
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

/// Expand environment variables in a string
///
/// Supports `${VAR_NAME}` syntax; unknown variables are left as written.
fn expand_env_vars(input: &str) -> String {
    let Ok(re) = regex_lite::Regex::new(r"\$\{([^}]+)\}") else {
        return input.to_string();
    };

    re.replace_all(input, |caps: &regex_lite::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    // Test 1: Parse complete configuration from YAML
    #[test]
    fn test_parse_complete_yaml_config() {
        let yaml = r#"
server:
  host: "127.0.0.1"
  port: 9090

upstream:
  github_raw_url: "http://localhost:1234"
  timeout_secs: 10
  user_agent: "custom-agent"

cache:
  plugin: redis
  ttl_secs: 60
  sweep_interval_secs: 0
  filesystem:
    base_path: "/tmp/ghly"
    max_size_mb: 64
  memory:
    max_entries: 500
  redis:
    url: "redis://cache:6379"
    prefix: "test:"

whitelist:
  repositories:
    - "acme/widgets"
    - "litestar-org"
    - "https://github.com/owner/repo.git"

otel:
  enabled: true
  endpoint: "http://otel:4317"

logging:
  level: "debug"
  format: "pretty"
"#;

        let config = Config::from_yaml(yaml).unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.upstream.github_raw_url, "http://localhost:1234");
        assert_eq!(config.upstream.timeout(), Duration::from_secs(10));
        assert_eq!(config.cache.plugin, Some(CacheBackend::Redis));
        assert_eq!(config.cache.ttl(), Duration::from_secs(60));
        assert_eq!(config.cache.sweep_interval_secs, 0);
        assert_eq!(config.cache.filesystem.max_size_mb, 64);
        assert_eq!(config.cache.memory.max_entries, Some(500));

        let redis = config.cache.redis.as_ref().unwrap();
        assert_eq!(redis.url, "redis://cache:6379");
        assert_eq!(redis.prefix, "test:");
        assert_eq!(redis.pool_size, 4);

        assert_eq!(config.whitelist.repositories.len(), 3);
        assert!(config.otel.enabled);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.validate().is_ok());
    }

    // Test 2: Defaults
    #[test]
    fn test_default_values() {
        let config = Config::from_yaml("{}").unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8000);
        assert_eq!(
            config.upstream.github_raw_url,
            "https://raw.githubusercontent.com"
        );
        assert_eq!(config.cache.ttl_secs, 300);
        assert_eq!(config.cache.plugin, None);
        assert_eq!(config.cache.filesystem.base_path, "ghly.cache");
        assert!(config.cache.redis.is_none());
        assert!(config.whitelist.repositories.is_empty());
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.otel.service_name, "ghly");
        assert_eq!(config, Config::default());
    }

    // Test 3: Environment variable expansion
    #[test]
    fn test_env_var_expansion() {
        std::env::set_var("GHLY_TEST_EXPAND_REDIS", "redis://expanded:6379");

        let yaml = r#"
cache:
  redis:
    url: "${GHLY_TEST_EXPAND_REDIS}"
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(
            config.cache.redis.unwrap().url,
            "redis://expanded:6379"
        );

        std::env::remove_var("GHLY_TEST_EXPAND_REDIS");
    }

    // Test 4: Unknown variables are left untouched
    #[test]
    fn test_env_var_expansion_unknown_variable() {
        let expanded = expand_env_vars("value: ${GHLY_TEST_DOES_NOT_EXIST}");
        assert_eq!(expanded, "value: ${GHLY_TEST_DOES_NOT_EXIST}");
    }

    // Test 5: Load from file
    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "server:\n  port: 7000").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.server.port, 7000);
    }

    // Test 6: Missing file
    #[test]
    fn test_load_from_missing_file() {
        let result = Config::from_file("/nonexistent/ghly.yaml");
        assert!(matches!(result, Err(ConfigError::FileRead(_))));
    }

    // Test 7: Invalid YAML
    #[test]
    fn test_invalid_yaml() {
        let result = Config::from_yaml("server: [unclosed");
        assert!(matches!(result, Err(ConfigError::Parse(_))));

        let result = Config::from_yaml("cache:\n  plugin: sqlite");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    // Test 8: Load from environment variables
    #[test]
    fn test_from_lookup() {
        let config = Config::from_lookup(lookup_from(&[
            ("GHLY_SERVER_HOST", "127.0.0.1"),
            ("GHLY_SERVER_PORT", "8081"),
            ("GHLY_GITHUB_RAW_URL", "http://mirror"),
            ("GHLY_UPSTREAM_TIMEOUT_SECS", "5"),
            ("GHLY_CACHE_TTL_SECONDS", "42"),
            ("GHLY_CACHE_PLUGIN", "memory"),
            ("GHLY_CACHE_PATH", "/var/cache/ghly"),
            ("GHLY_REPOSITORIES", "acme/widgets, litestar-org ,,"),
            ("GHLY_LOG_LEVEL", "debug"),
            ("GHLY_LOG_FORMAT", "pretty"),
            ("GHLY_OTEL_ENABLED", "true"),
            ("GHLY_OTEL_ENDPOINT", "http://otel:4317"),
        ]))
        .unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.upstream.github_raw_url, "http://mirror");
        assert_eq!(config.upstream.timeout_secs, 5);
        assert_eq!(config.cache.ttl_secs, 42);
        assert_eq!(config.cache_backend(), CacheBackend::Memory);
        assert_eq!(config.cache.filesystem.base_path, "/var/cache/ghly");
        assert_eq!(
            config.whitelist.repositories,
            vec!["acme/widgets".to_string(), "litestar-org".to_string()]
        );
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.otel.enabled);
        assert_eq!(config.otel.endpoint.as_deref(), Some("http://otel:4317"));
    }

    // Test 9: Invalid numbers in environment
    #[test]
    fn test_from_lookup_invalid_number() {
        let result = Config::from_lookup(lookup_from(&[("GHLY_SERVER_PORT", "eighty")]));
        assert!(matches!(result, Err(ConfigError::Parse(_))));

        let result = Config::from_lookup(lookup_from(&[("GHLY_CACHE_PLUGIN", "sqlite")]));
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    // Test 10: A Redis URL alone selects the Redis backend
    #[test]
    fn test_cache_backend_selection() {
        let config = Config::default();
        assert_eq!(config.cache_backend(), CacheBackend::Filesystem);

        let config = Config::from_lookup(lookup_from(&[("GHLY_REDIS_URL", "redis://r:6379")]))
            .unwrap();
        assert_eq!(config.cache_backend(), CacheBackend::Redis);

        let config = Config::from_lookup(lookup_from(&[
            ("GHLY_REDIS_URL", "redis://r:6379"),
            ("GHLY_CACHE_PLUGIN", "filesystem"),
        ]))
        .unwrap();
        assert_eq!(config.cache_backend(), CacheBackend::Filesystem);

        let config = Config::from_lookup(lookup_from(&[("GHLY_REDIS_URL", "  ")])).unwrap();
        assert_eq!(config.cache_backend(), CacheBackend::Filesystem);
    }

    // Test 11: Validation
    #[test]
    fn test_validate() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.cache.ttl_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue(_))));

        let mut config = Config::default();
        config.cache.plugin = Some(CacheBackend::Redis);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingRequired(_))
        ));

        let mut config = Config::default();
        config.whitelist.repositories = vec!["a/b/c".to_string()];
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue(_))));
    }

    // Test 12: Zero Redis command timeout is rejected
    #[test]
    fn test_validate_rejects_zero_redis_timeout() {
        let mut config = Config::default();
        config.cache.redis = Some(RedisCacheConfig {
            timeout_secs: 0,
            ..RedisCacheConfig::default()
        });
        match config.validate() {
            Err(ConfigError::InvalidValue(msg)) => assert!(msg.contains("timeout_secs")),
            other => panic!("Expected InvalidValue, got {:?}", other),
        }

        config.cache.redis = Some(RedisCacheConfig::default());
        assert!(config.validate().is_ok());
    }

    // Test 13: Whitelist guard built from configuration
    #[test]
    fn test_whitelist_guard() {
        let mut config = Config::default();
        assert!(config.whitelist_guard().unwrap().is_unrestricted());

        config.whitelist.repositories = vec![
            "acme/widgets".to_string(),
            "https://github.com/litestar-org".to_string(),
        ];
        let guard = config.whitelist_guard().unwrap();
        assert_eq!(guard.rule_count(), 2);
        assert!(guard.is_allowed("acme", "widgets"));
        assert!(!guard.is_allowed("acme", "other"));
        assert!(guard.is_allowed("litestar-org", "litestar"));
    }

    // Test 14: ConfigError display
    #[test]
    fn test_config_error_display() {
        assert_eq!(
            ConfigError::InvalidValue("ttl".to_string()).to_string(),
            "Invalid configuration value: ttl"
        );
        assert_eq!(
            ConfigError::MissingRequired("redis".to_string()).to_string(),
            "Missing required configuration: redis"
        );
    }
}
