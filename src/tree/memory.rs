//! Immutable in-memory file tree.
//!
//! A `MemoryTree` is built once by a [`MemoryTreeBuilder`] and never mutated
//! afterwards, which is what lets a snapshot share it freely between readers.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::interface::{DirEntry, FileHandle, FileKind, FileMetadata, FilesystemProvider};
use crate::fs::path::{normalize_path, split_path};
use crate::fs::{FsError, FsResult};

const DIR_MODE: u32 = 0o755;

#[derive(Debug)]
enum Node {
    File { data: Arc<[u8]>, mode: u32 },
    Symlink { target: Arc<[u8]> },
    Directory { children: BTreeSet<String> },
}

#[derive(Debug)]
pub struct MemoryTree {
    nodes: BTreeMap<String, Node>,
    modified: DateTime<Utc>,
}

impl MemoryTree {
    pub fn builder() -> MemoryTreeBuilder {
        MemoryTreeBuilder::new()
    }

    /// Number of regular files and symlinks in the tree.
    pub fn file_count(&self) -> usize {
        self.nodes.values().filter(|n| !matches!(n, Node::Directory { .. })).count()
    }

    /// Total size in bytes of all file contents.
    pub fn total_size(&self) -> u64 {
        self.nodes
            .values()
            .map(|n| match n {
                Node::File { data, .. } => data.len() as u64,
                _ => 0,
            })
            .sum()
    }

    fn metadata_for(&self, path: &str, node: &Node) -> FileMetadata {
        let name = match path.rsplit_once('/') {
            Some((_, name)) if !name.is_empty() => name.to_string(),
            _ => "/".to_string(),
        };
        let (kind, size, mode) = match node {
            Node::File { data, mode } => (FileKind::RegularFile, data.len() as u64, *mode),
            Node::Symlink { target } => (FileKind::Symlink, target.len() as u64, 0o777),
            Node::Directory { .. } => (FileKind::Directory, 0, DIR_MODE),
        };
        FileMetadata { name, kind, size, mode, modified: self.modified }
    }
}

impl FilesystemProvider for MemoryTree {
    fn open(&self, path: &str) -> FsResult<FileHandle> {
        let normalized = normalize_path(path)?;
        let node = self.nodes.get(&normalized).ok_or_else(|| FsError::NotFound(path.to_string()))?;

        let contents: Arc<[u8]> = match node {
            Node::File { data, .. } => data.clone(),
            Node::Symlink { target } => target.clone(),
            Node::Directory { .. } => Arc::from(Vec::new()),
        };
        let metadata = self.metadata_for(&normalized, node);
        Ok(FileHandle::new(normalized, metadata, contents))
    }

    fn read_dir(&self, path: &str) -> FsResult<Vec<DirEntry>> {
        let normalized = normalize_path(path)?;
        let node = self.nodes.get(&normalized).ok_or_else(|| FsError::NotFound(path.to_string()))?;

        let Node::Directory { children } = node else {
            return Err(FsError::NotDirectory(path.to_string()));
        };

        let mut entries = Vec::with_capacity(children.len());
        for name in children {
            let child_path =
                if normalized == "/" { format!("/{}", name) } else { format!("{}/{}", normalized, name) };
            if let Some(child) = self.nodes.get(&child_path) {
                let meta = self.metadata_for(&child_path, child);
                entries.push(DirEntry { name: meta.name, kind: meta.kind, size: meta.size });
            }
        }
        Ok(entries)
    }
}

/// Accumulates entries for a [`MemoryTree`], creating parent directories
/// implicitly.
#[derive(Debug)]
pub struct MemoryTreeBuilder {
    nodes: BTreeMap<String, Node>,
    modified: DateTime<Utc>,
}

impl Default for MemoryTreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTreeBuilder {
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert("/".to_string(), Node::Directory { children: BTreeSet::new() });
        Self { nodes, modified: Utc::now() }
    }

    /// Modification time reported for every entry.
    pub fn modified(mut self, modified: DateTime<Utc>) -> Self {
        self.modified = modified;
        self
    }

    pub fn file(self, path: &str, data: impl Into<Vec<u8>>) -> FsResult<Self> {
        self.file_with_mode(path, data, 0o644)
    }

    pub fn file_with_mode(
        mut self,
        path: &str,
        data: impl Into<Vec<u8>>,
        mode: u32,
    ) -> FsResult<Self> {
        let data: Vec<u8> = data.into();
        self.insert(path, Node::File { data: Arc::from(data), mode })?;
        Ok(self)
    }

    pub fn symlink(mut self, path: &str, target: &str) -> FsResult<Self> {
        self.insert(path, Node::Symlink { target: Arc::from(target.as_bytes()) })?;
        Ok(self)
    }

    pub fn dir(mut self, path: &str) -> FsResult<Self> {
        let normalized = normalize_path(path)?;
        if normalized != "/" {
            self.ensure_dir(&normalized)?;
        }
        Ok(self)
    }

    pub fn build(self) -> MemoryTree {
        MemoryTree { nodes: self.nodes, modified: self.modified }
    }

    fn insert(&mut self, path: &str, node: Node) -> FsResult<()> {
        let (parent, name) = split_path(path)?;
        let normalized = normalize_path(path)?;
        if matches!(self.nodes.get(&normalized), Some(Node::Directory { .. })) {
            return Err(FsError::IsDirectory(normalized));
        }
        self.ensure_dir(&parent)?;
        self.link_child(&parent, name)?;
        self.nodes.insert(normalized, node);
        Ok(())
    }

    fn ensure_dir(&mut self, path: &str) -> FsResult<()> {
        if path == "/" {
            return Ok(());
        }
        match self.nodes.get(path) {
            Some(Node::Directory { .. }) => return Ok(()),
            Some(_) => return Err(FsError::NotDirectory(path.to_string())),
            None => {}
        }
        let (parent, name) = split_path(path)?;
        self.ensure_dir(&parent)?;
        self.link_child(&parent, name)?;
        self.nodes.insert(path.to_string(), Node::Directory { children: BTreeSet::new() });
        Ok(())
    }

    fn link_child(&mut self, parent: &str, name: String) -> FsResult<()> {
        match self.nodes.get_mut(parent) {
            Some(Node::Directory { children }) => {
                children.insert(name);
                Ok(())
            }
            Some(_) => Err(FsError::NotDirectory(parent.to_string())),
            None => Err(FsError::NotFound(parent.to_string())),
        }
    }
}
