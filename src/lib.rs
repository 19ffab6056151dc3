//! Live, read-only snapshots of remote git repositories.
//!
//! Each configured repository is cloned into an in-memory tree held by a
//! [`SnapshotManager`]. Readers always see one complete snapshot; a refresh
//! triggered by a timer or a webhook builds the next snapshot off to the side
//! and swaps it in atomically.

pub mod client;
pub mod config;
pub mod fs;
pub mod manager;
pub mod metrics;
pub mod provision;
pub mod refresher;
pub mod registry;
pub mod server;
pub mod snapshot;
pub mod tree;

pub use client::{GitCliClient, RepositoryClient};
pub use fs::{FsError, FsResult};
pub use manager::{RefreshError, RefreshResult, SnapshotManager};
pub use refresher::{LoopState, RefreshLoop};
pub use registry::FilesystemRegistry;
pub use snapshot::{ContentHash, RepoReference, Snapshot};
pub use tree::{FilesystemProvider, MemoryTree};
