#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;
use gitsnap::client::RepositoryClient;
use gitsnap::snapshot::ContentHash;
use gitsnap::tree::{FilesystemProvider, MemoryTree};

/// Path of the marker file every stub tree carries; its contents equal the
/// tree's content hash.
pub const MARKER: &str = "/.snapshot";

/// A scripted repository whose head can be moved by the test.
pub struct StubClient {
    head: Mutex<(String, Vec<(String, String)>)>,
    failing: AtomicBool,
    clone_delay: Option<Duration>,
    resolves: AtomicUsize,
    clones: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl StubClient {
    pub fn new(hash: &str, files: &[(&str, &str)]) -> Self {
        Self {
            head: Mutex::new((hash.to_string(), owned(files))),
            failing: AtomicBool::new(false),
            clone_delay: None,
            resolves: AtomicUsize::new(0),
            clones: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_clone_delay(mut self, delay: Duration) -> Self {
        self.clone_delay = Some(delay);
        self
    }

    /// Move the head to a new revision.
    pub fn push(&self, hash: &str, files: &[(&str, &str)]) {
        *self.head.lock().unwrap() = (hash.to_string(), owned(files));
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn resolves(&self) -> usize {
        self.resolves.load(Ordering::SeqCst)
    }

    pub fn clones(&self) -> usize {
        self.clones.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RepositoryClient for StubClient {
    async fn resolve(&self, _reference: &str) -> Result<ContentHash> {
        self.resolves.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            bail!("remote unavailable");
        }
        Ok(ContentHash::new(self.head.lock().unwrap().0.clone()))
    }

    async fn clone_tree(
        &self,
        _reference: &str,
    ) -> Result<(ContentHash, Arc<dyn FilesystemProvider>)> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        if let Some(delay) = self.clone_delay {
            tokio::time::sleep(delay).await;
        }

        let result = if self.failing.load(Ordering::SeqCst) {
            Err(anyhow::anyhow!("remote unavailable"))
        } else {
            let (hash, files) = self.head.lock().unwrap().clone();
            let tree: Arc<dyn FilesystemProvider> = Arc::new(build_tree(&hash, &files));
            Ok((ContentHash::new(hash), tree))
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.clones.fetch_add(1, Ordering::SeqCst);
        result
    }
}

fn owned(files: &[(&str, &str)]) -> Vec<(String, String)> {
    files.iter().map(|(p, c)| (p.to_string(), c.to_string())).collect()
}

fn build_tree(hash: &str, files: &[(String, String)]) -> MemoryTree {
    let mut builder = MemoryTree::builder().file(MARKER, hash.as_bytes().to_vec()).unwrap();
    for (path, contents) in files {
        builder = builder.file(path, contents.as_bytes().to_vec()).unwrap();
    }
    builder.build()
}

pub fn read_to_string(provider: &dyn FilesystemProvider, path: &str) -> String {
    String::from_utf8(provider.open(path).unwrap().contents().to_vec()).unwrap()
}
