//! HTTP router for ghly
//!
//! Maps `/gh/{owner}/{repo}/{path}?ref=&refresh=` onto the proxy engine and
//! translates [`ProxyResult`] into status codes. Also exposes health and
//! cache administration endpoints.

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Json, Response},
    routing::{delete, get},
    Router,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::plugins::cache::CacheStats;
use crate::proxy::{ContentKey, ProxyEngine, ProxyResult, ServedContent};

const CACHE_CONTROL_VALUE: &str = "public, max-age=3600, must-revalidate";
const CACHE_STATUS_HEADER: &str = "x-cache-status";
const INVALID_PATH_DETAIL: &str =
    "Invalid API path format. Correct template: /gh/{owner}/{repo}/{path}?ref={branch}";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ProxyEngine>,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Error body shared by every non-200 answer
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status_code: u16,
    pub detail: String,
}

/// Cache statistics response
#[derive(Debug, Serialize, Deserialize)]
pub struct CacheStatsResponse {
    pub plugin: String,
    pub ttl_secs: u64,
    pub hit_rate: f64,
    #[serde(flatten)]
    pub stats: CacheStats,
}

/// Query string of proxy requests
#[derive(Debug, Default, Deserialize)]
pub struct ProxyQuery {
    #[serde(rename = "ref")]
    pub git_ref: Option<String>,
    pub refresh: Option<String>,
}

impl ProxyQuery {
    fn refresh(&self) -> bool {
        matches!(
            self.refresh.as_deref().map(str::to_ascii_lowercase).as_deref(),
            Some("true" | "1" | "yes" | "on")
        )
    }
}

/// Build the main application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/gh/:owner/:repo/*path", get(proxy_handler))
        .route("/api/cache/stats", get(api_cache_stats_handler))
        .route("/api/cache", delete(api_cache_clear_handler))
        .route(
            "/api/cache/gh/:owner/:repo/*path",
            delete(api_cache_invalidate_handler),
        )
        .fallback(fallback_handler)
        .with_state(state)
}

fn error_response(status: StatusCode, detail: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            status_code: status.as_u16(),
            detail: detail.into(),
        }),
    )
        .into_response()
}

/// Builds a request key, rejecting empty, `.` and `..` segments in any field
fn content_key(owner: &str, repo: &str, path: &str, git_ref: Option<&str>) -> Option<ContentKey> {
    let key = ContentKey::new(owner, repo, git_ref, path);
    key.has_safe_segments().then_some(key)
}

/// Quoted ETag: upstream value when known, else a body digest, cut to 16 chars
fn etag_for(content: &ServedContent) -> String {
    let source = match &content.etag {
        Some(etag) => etag.clone(),
        None => hex::encode(Sha256::digest(&content.data)),
    };
    let short: String = source.chars().take(16).collect();
    format!("\"{}\"", short)
}

// =============================================================================
// Proxy Handler
// =============================================================================

async fn proxy_handler(
    State(state): State<AppState>,
    Path((owner, repo, path)): Path<(String, String, String)>,
    Query(query): Query<ProxyQuery>,
) -> Response {
    let Some(key) = content_key(&owner, &repo, &path, query.git_ref.as_deref()) else {
        return error_response(StatusCode::BAD_REQUEST, INVALID_PATH_DETAIL);
    };

    match state.engine.resolve(&key, query.refresh()).await {
        ProxyResult::Served { content, source } => {
            let etag = etag_for(&content);
            let content_type = HeaderValue::from_str(&content.content_type)
                .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));

            let mut response = content.data.into_response();
            let headers = response.headers_mut();
            headers.insert(header::CONTENT_TYPE, content_type);
            headers.insert(
                header::CACHE_CONTROL,
                HeaderValue::from_static(CACHE_CONTROL_VALUE),
            );
            headers.insert(
                CACHE_STATUS_HEADER,
                HeaderValue::from_static(source.as_header_value()),
            );
            if let Ok(value) = HeaderValue::from_str(&etag) {
                headers.insert(header::ETAG, value);
            }
            response
        }
        ProxyResult::Denied => error_response(
            StatusCode::FORBIDDEN,
            format!(
                "Access to repository {}/{} is not allowed",
                key.owner(),
                key.repo()
            ),
        ),
        ProxyResult::UpstreamError(e) if e.is_not_found() => error_response(
            StatusCode::NOT_FOUND,
            format!("File not found: {}/{}/{}@{}", key.owner(), key.repo(), key.path(), key.git_ref()),
        ),
        ProxyResult::UpstreamError(e) => error_response(
            StatusCode::BAD_GATEWAY,
            format!("Upstream fetch failed: {}", e.kind()),
        ),
    }
}

async fn fallback_handler(uri: Uri) -> Response {
    let path = uri.path();
    if path == "/gh" || path.starts_with("/gh/") {
        error_response(StatusCode::BAD_REQUEST, INVALID_PATH_DETAIL)
    } else {
        error_response(StatusCode::NOT_FOUND, "Not Found")
    }
}

// =============================================================================
// Health and Admin Handlers
// =============================================================================

async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn api_cache_stats_handler(State(state): State<AppState>) -> impl IntoResponse {
    let cache = state.engine.cache();
    let stats = cache.stats().await;
    Json(CacheStatsResponse {
        plugin: cache.name().to_string(),
        ttl_secs: state.engine.ttl().as_secs(),
        hit_rate: stats.hit_rate(),
        stats,
    })
}

async fn api_cache_clear_handler(State(state): State<AppState>) -> Response {
    match state.engine.cache().purge().await {
        Ok(()) => {
            tracing::info!("Cache cleared");
            Json(serde_json::json!({ "message": "Cache cleared" })).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to clear cache");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to clear cache")
        }
    }
}

async fn api_cache_invalidate_handler(
    State(state): State<AppState>,
    Path((owner, repo, path)): Path<(String, String, String)>,
    Query(query): Query<ProxyQuery>,
) -> Response {
    let Some(key) = content_key(&owner, &repo, &path, query.git_ref.as_deref()) else {
        return error_response(StatusCode::BAD_REQUEST, INVALID_PATH_DETAIL);
    };

    match state.engine.invalidate(&key).await {
        Ok(()) => Json(serde_json::json!({
            "message": "Cache entry invalidated",
            "key": key.cache_key(),
        }))
        .into_response(),
        Err(e) => {
            tracing::error!(error = %e, content = %key, "Failed to invalidate cache entry");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to invalidate cache entry",
            )
        }
    }
}
