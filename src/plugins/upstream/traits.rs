//! Fetcher trait consumed by the proxy engine

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::UpstreamError;
use crate::proxy::ContentKey;

/// A file successfully fetched from the origin
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedContent {
    /// Raw body
    pub data: Bytes,
    /// Resolved MIME type
    pub content_type: String,
    /// Origin ETag with surrounding quotes removed
    pub etag: Option<String>,
}

/// Retrieves file content from the origin host
///
/// Not-found must be reported as [`UpstreamError::NotFound`] so callers can
/// tell it apart from transport failures.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Fetches the file identified by `key`
    async fn fetch(&self, key: &ContentKey) -> Result<FetchedContent, UpstreamError>;
}
