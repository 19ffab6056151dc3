// Read-only filesystem interface
//
// Every snapshot tree and the snapshot manager itself expose this interface,
// so a file-serving consumer never needs to know about refresh or versioning.

use std::io::{self, Read};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::fs::FsResult;

/// File type enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    RegularFile,
    Directory,
    Symlink,
}

/// File metadata, derived from an open handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    pub name: String,
    pub kind: FileKind,
    pub size: u64,
    pub mode: u32, // Permission bits
    pub modified: DateTime<Utc>,
}

impl FileMetadata {
    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }
}

/// Directory entry structure
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DirEntry {
    pub name: String,
    pub kind: FileKind,
    pub size: u64,
}

/// An open file within a snapshot.
///
/// The handle shares its contents with the tree it came from, so it stays
/// valid after the snapshot that produced it has been replaced.
#[derive(Debug, Clone)]
pub struct FileHandle {
    path: String,
    metadata: FileMetadata,
    contents: Arc<[u8]>,
    position: usize,
}

impl FileHandle {
    pub fn new(path: String, metadata: FileMetadata, contents: Arc<[u8]>) -> Self {
        Self { path, metadata, contents, position: 0 }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn metadata(&self) -> FileMetadata {
        self.metadata.clone()
    }

    /// Whole file contents. Empty for directories; the link target for symlinks.
    pub fn contents(&self) -> &[u8] {
        &self.contents
    }
}

impl Read for FileHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = &self.contents[self.position.min(self.contents.len())..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.position += n;
        Ok(n)
    }
}

/// Read-only filesystem capability.
///
/// Paths are rooted at the repository root and normalized with
/// [`crate::fs::normalize_path`].
pub trait FilesystemProvider: Send + Sync {
    fn open(&self, path: &str) -> FsResult<FileHandle>;

    fn stat(&self, path: &str) -> FsResult<FileMetadata> {
        self.open(path).map(|handle| handle.metadata())
    }

    fn read_dir(&self, path: &str) -> FsResult<Vec<DirEntry>>;
}
