// Snapshot file trees
//
// The read-only filesystem interface shared by snapshot trees and the
// snapshot manager, and the in-memory tree the git client materializes
// checkouts into.

pub mod interface;
pub mod memory;

pub use interface::{DirEntry, FileHandle, FileKind, FileMetadata, FilesystemProvider};
pub use memory::{MemoryTree, MemoryTreeBuilder};
