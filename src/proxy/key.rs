//! Request identity and cache key derivation

use std::fmt;

/// Ref used when a request does not name one
pub const DEFAULT_REF: &str = "main";

const CACHE_KEY_PREFIX: &str = "gh";

/// Identifies one file at one version of one repository
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentKey {
    owner: String,
    repo: String,
    git_ref: String,
    path: String,
}

impl ContentKey {
    /// Builds a key; an absent or blank ref falls back to [`DEFAULT_REF`]
    ///
    /// Leading slashes of `path` are dropped.
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        git_ref: Option<&str>,
        path: impl Into<String>,
    ) -> Self {
        let git_ref = git_ref
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_REF);

        Self {
            owner: owner.into(),
            repo: repo.into(),
            git_ref: git_ref.to_string(),
            path: path.into().trim_start_matches('/').to_string(),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    pub fn git_ref(&self) -> &str {
        &self.git_ref
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// True when every field is made of plain path segments
    ///
    /// Owner and repo are single segments; ref and path may span several.
    /// Empty, `.` and `..` segments are rejected anywhere, so the key always
    /// names a file inside `owner/repo` once turned into an upstream URL.
    pub fn has_safe_segments(&self) -> bool {
        is_plain_segment(&self.owner)
            && is_plain_segment(&self.repo)
            && self.git_ref.split('/').all(is_plain_segment)
            && self.path.split('/').all(is_plain_segment)
    }

    /// Derives the storage key
    ///
    /// Fields are joined with `:` after percent-escaping `%` and `:` in each
    /// one, so the result is a pure, injective function of the tuple.
    pub fn cache_key(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}",
            CACHE_KEY_PREFIX,
            escape(&self.owner),
            escape(&self.repo),
            escape(&self.git_ref),
            escape(&self.path)
        )
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}:{}", self.owner, self.repo, self.git_ref, self.path)
    }
}

fn is_plain_segment(segment: &str) -> bool {
    !segment.is_empty() && segment != "." && segment != ".." && !segment.contains('/')
}

fn escape(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    for c in field.chars() {
        match c {
            '%' => out.push_str("%25"),
            ':' => out.push_str("%3A"),
            _ => out.push(c),
        }
    }
    out
}
