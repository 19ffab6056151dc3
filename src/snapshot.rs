//! Snapshot types.
//!
//! A [`Snapshot`] pairs a content hash with a ready-to-serve tree. Snapshots
//! are never mutated; a refresh builds a new one and swaps it in.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::tree::FilesystemProvider;

/// Reference used when none is configured.
pub const DEFAULT_REFERENCE: &str = "HEAD";

/// Opaque fingerprint of resolved repository content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash(String);

impl ContentHash {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContentHash {
    fn from(hash: &str) -> Self {
        Self::new(hash)
    }
}

/// Repository location plus the reference to track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoReference {
    pub url: String,
    pub reference: String,
}

impl RepoReference {
    /// An empty reference falls back to [`DEFAULT_REFERENCE`].
    pub fn new(url: impl Into<String>, reference: Option<String>) -> Self {
        let reference = reference
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_REFERENCE.to_string());
        Self { url: url.into(), reference }
    }
}

pub struct Snapshot {
    pub hash: ContentHash,
    pub tree: Arc<dyn FilesystemProvider>,
    pub fetched_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(hash: ContentHash, tree: Arc<dyn FilesystemProvider>) -> Self {
        Self { hash, tree, fetched_at: Utc::now() }
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("hash", &self.hash)
            .field("fetched_at", &self.fetched_at)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::MemoryTree;

    #[test]
    fn test_content_hash_equality_and_display() {
        let a = ContentHash::new("abc123");
        let b: ContentHash = "abc123".into();
        assert_eq!(a, b);
        assert_ne!(a, ContentHash::new("def456"));
        assert_eq!(a.to_string(), "abc123");
        assert_eq!(a.as_str(), "abc123");
    }

    #[test]
    fn test_reference_defaults_to_head() {
        assert_eq!(RepoReference::new("https://example.com/r.git", None).reference, "HEAD");
        assert_eq!(
            RepoReference::new("https://example.com/r.git", Some("  ".to_string())).reference,
            "HEAD"
        );
        assert_eq!(
            RepoReference::new("https://example.com/r.git", Some("main".to_string())).reference,
            "main"
        );
    }

    #[test]
    fn test_snapshot_debug_omits_tree() {
        let tree = MemoryTree::builder().file("/a.txt", "hello").unwrap().build();
        let snapshot = Snapshot::new(ContentHash::new("h1"), Arc::new(tree));
        let debug = format!("{:?}", snapshot);
        assert!(debug.contains("h1"));
        assert!(!debug.contains("hello"));
    }
}
