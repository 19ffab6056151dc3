//! Repository clients.
//!
//! A client resolves references to content hashes and materializes content
//! as read-only trees. The snapshot manager only talks to the
//! [`RepositoryClient`] trait; [`GitCliClient`] is the production
//! implementation.

mod git;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
#[cfg(any(test, feature = "mockall"))]
use mockall::automock;

use crate::snapshot::ContentHash;
use crate::tree::FilesystemProvider;

pub use git::{GitCliClient, parse_ls_remote};

#[cfg_attr(any(test, feature = "mockall"), automock)]
#[async_trait]
pub trait RepositoryClient: Send + Sync {
    /// Resolve `reference` to a content hash without transferring content.
    async fn resolve(&self, reference: &str) -> Result<ContentHash>;

    /// Fetch the content at `reference` and materialize it as a tree.
    async fn clone_tree(&self, reference: &str)
    -> Result<(ContentHash, Arc<dyn FilesystemProvider>)>;
}
