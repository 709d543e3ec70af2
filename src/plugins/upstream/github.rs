//! Client for `raw.githubusercontent.com`
//!
//! Raw URLs have the shape `{base}/{owner}/{repo}/{ref}/{path}`. Refs given in
//! full form (`refs/heads/x`, `refs/tags/x`) are shortened because the raw
//! host only accepts the short name.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, ETAG};
use reqwest::{Client, StatusCode, Url};
use tracing::{debug, warn};

use crate::error::UpstreamError;
use crate::proxy::ContentKey;

use super::traits::{ContentFetcher, FetchedContent};

const OCTET_STREAM: &str = "application/octet-stream";

/// Configuration for the raw content client
#[derive(Debug, Clone)]
pub struct GitHubRawConfig {
    /// Base URL of the raw content host
    pub base_url: String,
    /// Deadline for one fetch, including the body
    pub timeout: Duration,
    /// `User-Agent` sent upstream
    pub user_agent: String,
}

impl Default for GitHubRawConfig {
    fn default() -> Self {
        Self {
            base_url: "https://raw.githubusercontent.com".to_string(),
            timeout: Duration::from_secs(30),
            user_agent: format!("ghly/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Fetches files from the GitHub raw content host
#[derive(Debug, Clone)]
pub struct GitHubRawClient {
    client: Client,
    base_url: Url,
}

impl GitHubRawClient {
    pub fn new(config: GitHubRawConfig) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent)
            .build()
            .map_err(|e| UpstreamError::Network(e.to_string()))?;

        Self::with_client(client, &config.base_url)
    }

    /// Uses a preconfigured reqwest client
    pub fn with_client(client: Client, base_url: &str) -> Result<Self, UpstreamError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| UpstreamError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(UpstreamError::InvalidUrl(format!(
                "{}: not a base URL",
                base_url
            )));
        }
        Ok(Self { client, base_url })
    }

    /// Builds the raw URL for `key`
    ///
    /// Each segment is appended separately and percent-encoded, so `?`, `#`
    /// and `%` in names stay part of the file name. Keys with empty, `.` or
    /// `..` segments are refused.
    pub fn raw_url(&self, key: &ContentKey) -> Result<Url, UpstreamError> {
        if !key.has_safe_segments() {
            return Err(UpstreamError::InvalidUrl(format!(
                "unsafe path segments in {}",
                key
            )));
        }

        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                UpstreamError::InvalidUrl(format!("{}: not a base URL", self.base_url))
            })?;
            segments
                .pop_if_empty()
                .push(key.owner())
                .push(key.repo())
                .extend(short_ref(key.git_ref()).split('/'))
                .extend(key.path().split('/'));
        }
        Ok(url)
    }
}

fn short_ref(git_ref: &str) -> &str {
    git_ref
        .strip_prefix("refs/heads/")
        .or_else(|| git_ref.strip_prefix("refs/tags/"))
        .unwrap_or(git_ref)
}

/// Chooses the served MIME type
///
/// The raw host labels most text as `text/plain`, so that value is replaced by
/// a guess from the file extension.
pub(crate) fn detect_content_type(path: &str, header: Option<&str>) -> String {
    if let Some(header) = header {
        let essence = header.split(';').next().unwrap_or("").trim();
        if !essence.is_empty() && !essence.starts_with("text/plain") {
            return essence.to_string();
        }
    }

    if let Some(guess) = mime_guess::from_path(path).first_raw() {
        return guess.to_string();
    }

    let lower = path.to_ascii_lowercase();
    let fallback = if lower.ends_with(".md") || lower.ends_with(".markdown") {
        "text/markdown"
    } else if lower.ends_with(".txt") {
        "text/plain"
    } else {
        OCTET_STREAM
    };
    fallback.to_string()
}

fn map_transport_error(e: reqwest::Error) -> UpstreamError {
    if e.is_timeout() {
        UpstreamError::Timeout
    } else if e.is_connect() {
        UpstreamError::ConnectionRefused
    } else {
        UpstreamError::Network(e.to_string())
    }
}

#[async_trait]
impl ContentFetcher for GitHubRawClient {
    async fn fetch(&self, key: &ContentKey) -> Result<FetchedContent, UpstreamError> {
        let url = self.raw_url(key)?;
        debug!(url = %url, "Fetching raw content");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(map_transport_error)?;

        match response.status() {
            StatusCode::OK => {
                let content_type = detect_content_type(
                    key.path(),
                    response
                        .headers()
                        .get(CONTENT_TYPE)
                        .and_then(|v| v.to_str().ok()),
                );
                let etag = response
                    .headers()
                    .get(ETAG)
                    .and_then(|v| v.to_str().ok())
                    .map(|v| v.trim_start_matches("W/").trim_matches('"').to_string())
                    .filter(|v| !v.is_empty());

                let data = response.bytes().await.map_err(map_transport_error)?;

                debug!(
                    url = %url,
                    body_size = data.len(),
                    content_type = %content_type,
                    "Received raw content"
                );

                Ok(FetchedContent {
                    data,
                    content_type,
                    etag,
                })
            }
            StatusCode::NOT_FOUND => {
                debug!(url = %url, "Raw content not found (404)");
                Err(UpstreamError::NotFound)
            }
            status => {
                warn!(url = %url, status = status.as_u16(), "Unexpected upstream status");
                Err(UpstreamError::Status(status.as_u16()))
            }
        }
    }
}
