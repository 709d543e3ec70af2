//! Repository whitelist
//!
//! The whitelist is parsed once at startup into a [`WhitelistGuard`] and is
//! read-only afterwards. An empty guard allows every repository.

use std::collections::HashSet;
use std::fmt;

use crate::config::ConfigError;

/// A single allow-list entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WhitelistRule {
    /// Every repository of this owner (org-wide rule)
    Owner(String),
    /// One exact owner/repo pair
    Repository { owner: String, repo: String },
}

impl WhitelistRule {
    /// Parses a configured entry
    ///
    /// Accepted forms: `owner`, `owner/repo`, and GitHub URLs such as
    /// `https://github.com/owner/repo` (an optional `.git` suffix and
    /// trailing slash are ignored).
    pub fn parse(entry: &str) -> Result<Self, ConfigError> {
        let trimmed = entry.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::InvalidValue(
                "empty whitelist entry".to_string(),
            ));
        }

        let without_scheme = trimmed
            .strip_prefix("https://")
            .or_else(|| trimmed.strip_prefix("http://"));

        let target = match without_scheme {
            Some(rest) => {
                let (host, path) = rest.split_once('/').unwrap_or((rest, ""));
                if host != "github.com" && host != "www.github.com" {
                    return Err(ConfigError::InvalidValue(format!(
                        "whitelist URL must point at github.com: {}",
                        entry
                    )));
                }
                path
            }
            None => trimmed,
        };

        let target = target.trim_end_matches('/');
        let target = target.strip_suffix(".git").unwrap_or(target);
        let segments: Vec<&str> = target.split('/').collect();

        match segments.as_slice() {
            [owner] if is_valid_segment(owner) => Ok(WhitelistRule::Owner(owner.to_string())),
            [owner, repo] if is_valid_segment(owner) && is_valid_segment(repo) => {
                Ok(WhitelistRule::Repository {
                    owner: owner.to_string(),
                    repo: repo.to_string(),
                })
            }
            _ => Err(ConfigError::InvalidValue(format!(
                "invalid whitelist entry: {}",
                entry
            ))),
        }
    }
}

impl fmt::Display for WhitelistRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WhitelistRule::Owner(owner) => write!(f, "{}", owner),
            WhitelistRule::Repository { owner, repo } => write!(f, "{}/{}", owner, repo),
        }
    }
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.chars().any(|c| c.is_whitespace())
}

/// Decides whether an owner/repo pair may be proxied
#[derive(Debug, Clone, Default)]
pub struct WhitelistGuard {
    owners: HashSet<String>,
    repositories: HashSet<(String, String)>,
}

impl WhitelistGuard {
    /// Builds a guard from parsed rules
    pub fn new(rules: impl IntoIterator<Item = WhitelistRule>) -> Self {
        let mut guard = Self::default();
        for rule in rules {
            match rule {
                WhitelistRule::Owner(owner) => {
                    guard.owners.insert(owner);
                }
                WhitelistRule::Repository { owner, repo } => {
                    guard.repositories.insert((owner, repo));
                }
            }
        }
        guard
    }

    /// A guard that allows everything
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// True when no rules are configured
    pub fn is_unrestricted(&self) -> bool {
        self.owners.is_empty() && self.repositories.is_empty()
    }

    /// Number of configured rules
    pub fn rule_count(&self) -> usize {
        self.owners.len() + self.repositories.len()
    }

    /// Returns true if the pair is permitted
    ///
    /// Matching is exact and case-sensitive per segment.
    pub fn is_allowed(&self, owner: &str, repo: &str) -> bool {
        if self.is_unrestricted() {
            return true;
        }
        if self.owners.contains(owner) {
            return true;
        }
        self.repositories
            .contains(&(owner.to_string(), repo.to_string()))
    }
}
