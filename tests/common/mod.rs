//! Common test utilities and helpers for integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use ghly::config::ServerConfig;
use ghly::otel::Metrics;
use ghly::plugins::cache::{CachePlugin, MemoryCache};
use ghly::plugins::upstream::{GitHubRawClient, GitHubRawConfig};
use ghly::proxy::ProxyEngine;
use ghly::server::{AppState, Server};
use ghly::whitelist::{WhitelistGuard, WhitelistRule};

/// Metrics bound to the global (no-op) meter
pub fn create_test_metrics() -> Arc<Metrics> {
    Arc::new(Metrics::new(&opentelemetry::global::meter("ghly-integration")))
}

/// Whitelist built from `owner` or `owner/repo` entries; empty allows all
pub fn create_test_guard(entries: &[&str]) -> WhitelistGuard {
    if entries.is_empty() {
        return WhitelistGuard::allow_all();
    }
    WhitelistGuard::new(
        entries
            .iter()
            .map(|e| WhitelistRule::parse(e).expect("Invalid whitelist entry")),
    )
}

/// Raw content client pointed at a mock origin
pub fn create_test_fetcher(base_url: &str) -> GitHubRawClient {
    GitHubRawClient::new(GitHubRawConfig {
        base_url: base_url.to_string(),
        timeout: Duration::from_secs(2),
        user_agent: "ghly-integration".to_string(),
    })
    .expect("Failed to build upstream client")
}

/// Application state over an arbitrary cache
pub fn create_test_state_with_cache(
    origin: &str,
    whitelist: &[&str],
    cache: Arc<dyn CachePlugin>,
    ttl: Duration,
) -> AppState {
    let engine = ProxyEngine::new(
        Arc::new(create_test_guard(whitelist)),
        cache,
        Arc::new(create_test_fetcher(origin)),
        ttl,
        create_test_metrics(),
    );
    AppState {
        engine: Arc::new(engine),
    }
}

/// Application state with an in-memory cache and a 300s TTL
pub fn create_test_state(origin: &str, whitelist: &[&str]) -> AppState {
    create_test_state_with_cache(
        origin,
        whitelist,
        Arc::new(MemoryCache::default()),
        Duration::from_secs(300),
    )
}

/// Create a test server configuration with a random port
pub fn create_test_server_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0, // Let OS assign a free port
    }
}

/// Create a test server
pub fn create_test_server(state: AppState) -> Server {
    Server::new(create_test_server_config(), state)
}

/// Run a test server in the background and return the address
/// The server will be shut down when the returned shutdown sender is dropped or sent
pub async fn run_test_server(
    state: AppState,
) -> (std::net::SocketAddr, tokio::sync::oneshot::Sender<()>) {
    use tokio::net::TcpListener;

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test server");
    let addr = listener.local_addr().expect("Failed to get local address");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    let app = ghly::server::build_router(state)
        .layer(tower_http::trace::TraceLayer::new_for_http());

    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
            .expect("Server error");
    });

    // Give the server a moment to start
    tokio::time::sleep(Duration::from_millis(100)).await;

    (addr, shutdown_tx)
}
