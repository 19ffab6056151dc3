//! Named snapshot managers.
//!
//! External triggers look managers up here by their configured name and get
//! a typed handle back.

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::manager::SnapshotManager;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Filesystem already registered: {0}")]
    Duplicate(String),
}

#[derive(Debug, Default)]
pub struct FilesystemRegistry {
    managers: BTreeMap<String, Arc<SnapshotManager>>,
}

impl FilesystemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `manager` under its own name.
    pub fn register(&mut self, manager: Arc<SnapshotManager>) -> Result<(), RegistryError> {
        let name = manager.name().to_string();
        if self.managers.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        self.managers.insert(name, manager);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<SnapshotManager>> {
        self.managers.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.managers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.managers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.managers.is_empty()
    }

    /// Stop every manager's refresh loop.
    pub fn shutdown_all(&self) {
        for manager in self.managers.values() {
            if manager.shutdown() {
                info!(repo = %manager.name(), "Stopped refresh loop");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockRepositoryClient;
    use crate::snapshot::{ContentHash, RepoReference, Snapshot};
    use crate::tree::MemoryTree;

    fn manager(name: &str) -> Arc<SnapshotManager> {
        let tree = MemoryTree::builder().build();
        Arc::new(SnapshotManager::new(
            name,
            Arc::new(MockRepositoryClient::new()),
            RepoReference::new("https://example.com/repo.git", None),
            Snapshot::new(ContentHash::new("h1"), Arc::new(tree)),
        ))
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = FilesystemRegistry::new();
        assert!(registry.is_empty());
        registry.register(manager("docs")).unwrap();
        registry.register(manager("site")).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("docs").unwrap().name(), "docs");
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["docs", "site"]);
    }

    #[test]
    fn test_duplicate_name() {
        let mut registry = FilesystemRegistry::new();
        registry.register(manager("docs")).unwrap();
        assert_eq!(
            registry.register(manager("docs")),
            Err(RegistryError::Duplicate("docs".to_string()))
        );
    }

    #[tokio::test]
    async fn test_shutdown_all_is_idempotent() {
        let mut registry = FilesystemRegistry::new();
        let docs = manager("docs");
        docs.start_refresh_loop(std::time::Duration::from_secs(60)).unwrap();
        registry.register(docs.clone()).unwrap();

        registry.shutdown_all();
        registry.shutdown_all();
        assert!(!docs.shutdown());
    }
}
