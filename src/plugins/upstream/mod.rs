//! Upstream content fetchers

pub mod traits;

mod github;

pub use github::{GitHubRawClient, GitHubRawConfig};
pub use traits::{ContentFetcher, FetchedContent};

#[cfg(test)]
pub use traits::MockContentFetcher;
