//! Live snapshot manager.
//!
//! Owns the current [`Snapshot`] of a repository and replaces it on refresh.
//! Readers take the read lock only long enough to clone the snapshot
//! pointer; refreshes resolve and clone outside that lock and take the write
//! lock only to swap the pointer. Concurrent refreshes are serialized by a
//! separate async mutex, so a slow clone never starves readers.

use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::client::RepositoryClient;
use crate::fs::FsResult;
use crate::metrics::RefreshMetrics;
use crate::refresher::{LoopState, RefreshLoop};
use crate::snapshot::{ContentHash, RepoReference, Snapshot};
use crate::tree::{DirEntry, FileHandle, FilesystemProvider};

/// Errors that can occur while refreshing a snapshot.
#[derive(Error, Debug)]
pub enum RefreshError {
    #[error("Failed to resolve reference {reference}: {source:#}")]
    Resolve {
        reference: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to clone reference {reference}: {source:#}")]
    Clone {
        reference: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Refresh loop already running for {0}")]
    LoopAlreadyRunning(String),
}

/// Result type for refresh operations.
pub type RefreshResult<T> = Result<T, RefreshError>;

const TRIGGER_CHECK: &str = "check";
const TRIGGER_REFRESH: &str = "refresh";

pub struct SnapshotManager {
    name: String,
    reference: RepoReference,
    client: Arc<dyn RepositoryClient>,
    current: RwLock<Arc<Snapshot>>,
    refresh_gate: tokio::sync::Mutex<()>,
    refresher: Mutex<Option<RefreshLoop>>,
    metrics: Option<Arc<RefreshMetrics>>,
}

impl SnapshotManager {
    /// Create a manager serving `initial`.
    pub fn new(
        name: impl Into<String>,
        client: Arc<dyn RepositoryClient>,
        reference: RepoReference,
        initial: Snapshot,
    ) -> Self {
        Self {
            name: name.into(),
            reference,
            client,
            current: RwLock::new(Arc::new(initial)),
            refresh_gate: tokio::sync::Mutex::new(()),
            refresher: Mutex::new(None),
            metrics: None,
        }
    }

    /// Clone the reference and create a manager serving the result.
    pub async fn provision(
        name: impl Into<String>,
        client: Arc<dyn RepositoryClient>,
        reference: RepoReference,
    ) -> RefreshResult<Self> {
        let name = name.into();
        let (hash, tree) = client.clone_tree(&reference.reference).await.map_err(|source| {
            RefreshError::Clone { reference: reference.reference.clone(), source }
        })?;

        info!(
            repo = %name,
            url = %reference.url,
            reference = %reference.reference,
            hash = %hash,
            "Provisioned snapshot"
        );

        Ok(Self::new(name, client, reference, Snapshot::new(hash, tree)))
    }

    pub fn with_metrics(mut self, metrics: Arc<RefreshMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn reference(&self) -> &RepoReference {
        &self.reference
    }

    /// The snapshot current at the time of the call.
    ///
    /// Several reads against the returned snapshot are mutually consistent
    /// even if a refresh installs a newer one in between.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn current_hash(&self) -> ContentHash {
        self.snapshot().hash.clone()
    }

    /// Unconditionally resolve, clone and install a new snapshot.
    ///
    /// On failure the current snapshot is left in place.
    pub async fn refresh(&self) -> RefreshResult<ContentHash> {
        let _gate = self.refresh_gate.lock().await;
        let started = Instant::now();

        info!(repo = %self.name, reference = %self.reference.reference, "Pulling repository");

        let result = self.clone_and_install().await;
        let outcome = if result.is_ok() { "changed" } else { "error" };
        self.record(TRIGGER_REFRESH, outcome, started.elapsed());
        result
    }

    /// Resolve the reference and clone only if its hash moved.
    ///
    /// Returns whether a new snapshot was installed.
    pub async fn check_and_refresh(&self) -> RefreshResult<bool> {
        let _gate = self.refresh_gate.lock().await;
        let started = Instant::now();

        let result = self.check_and_install().await;
        let outcome = match result {
            Ok(true) => "changed",
            Ok(false) => "unchanged",
            Err(_) => "error",
        };
        self.record(TRIGGER_CHECK, outcome, started.elapsed());
        result
    }

    /// Start the periodic refresh loop.
    ///
    /// Only one loop runs per manager; a stopped loop may be replaced.
    pub fn start_refresh_loop(self: &Arc<Self>, period: Duration) -> RefreshResult<()> {
        if period.is_zero() {
            warn!(repo = %self.name, "Refresh period is zero; periodic refresh disabled");
            return Ok(());
        }

        let mut slot = self.refresher.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|running| !running.is_stopped()) {
            return Err(RefreshError::LoopAlreadyRunning(self.name.clone()));
        }

        info!(
            repo = %self.name,
            reference = %self.reference.reference,
            hash = %self.current_hash(),
            period = ?period,
            "Starting reference hash refresh"
        );
        *slot = Some(RefreshLoop::spawn(self, period));
        Ok(())
    }

    pub fn refresh_loop_state(&self) -> Option<LoopState> {
        self.refresher.lock().unwrap_or_else(PoisonError::into_inner).as_ref().map(|l| l.state())
    }

    /// Stop the refresh loop, if any.
    ///
    /// Idempotent: only the first call signals the loop. Does not wait for
    /// an in-flight refresh. Returns whether this call sent the signal.
    pub fn shutdown(&self) -> bool {
        let slot = self.refresher.lock().unwrap_or_else(PoisonError::into_inner);
        let stopped = slot.as_ref().is_some_and(|refresher| refresher.stop());
        if stopped {
            debug!(repo = %self.name, "Cleaning up");
        }
        stopped
    }

    async fn check_and_install(&self) -> RefreshResult<bool> {
        let current = self.current_hash();
        debug!(
            repo = %self.name,
            reference = %self.reference.reference,
            hash = %current,
            "Checking reference hash"
        );

        let remote = self.client.resolve(&self.reference.reference).await.map_err(|source| {
            RefreshError::Resolve { reference: self.reference.reference.clone(), source }
        })?;

        if remote == current {
            debug!(repo = %self.name, "No change in reference hash");
            return Ok(false);
        }

        info!(
            repo = %self.name,
            reference = %self.reference.reference,
            old = %current,
            new = %remote,
            "Reference hash changed; cloning"
        );
        self.clone_and_install().await?;
        Ok(true)
    }

    async fn clone_and_install(&self) -> RefreshResult<ContentHash> {
        let (hash, tree) =
            self.client.clone_tree(&self.reference.reference).await.map_err(|source| {
                RefreshError::Clone { reference: self.reference.reference.clone(), source }
            })?;

        self.install(Snapshot::new(hash.clone(), tree));
        Ok(hash)
    }

    fn install(&self, snapshot: Snapshot) {
        let new_hash = snapshot.hash.clone();
        let previous = {
            let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *current, Arc::new(snapshot))
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_swap(&self.name);
        }
        info!(repo = %self.name, old = %previous.hash, new = %new_hash, "Installed snapshot");
    }

    fn record(&self, trigger: &str, outcome: &str, elapsed: Duration) {
        if let Some(metrics) = &self.metrics {
            metrics.record_refresh(&self.name, trigger, outcome, elapsed);
        }
    }
}

impl FilesystemProvider for SnapshotManager {
    fn open(&self, path: &str) -> FsResult<FileHandle> {
        self.snapshot().tree.open(path)
    }

    fn read_dir(&self, path: &str) -> FsResult<Vec<DirEntry>> {
        self.snapshot().tree.read_dir(path)
    }
}

impl Drop for SnapshotManager {
    fn drop(&mut self) {
        let slot = self.refresher.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(refresher) = slot.take() {
            refresher.stop();
        }
    }
}

impl std::fmt::Debug for SnapshotManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotManager")
            .field("name", &self.name)
            .field("reference", &self.reference)
            .field("current", &self.current_hash())
            .finish_non_exhaustive()
    }
}
