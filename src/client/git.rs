use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;
use walkdir::WalkDir;

use super::RepositoryClient;
use crate::snapshot::ContentHash;
use crate::tree::{FilesystemProvider, MemoryTree, MemoryTreeBuilder};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Repository client backed by the `git` command line.
///
/// Every call works in its own temporary directory, so concurrent calls
/// never share state.
#[derive(Debug, Clone)]
pub struct GitCliClient {
    url: String,
    binary: PathBuf,
    timeout: Duration,
}

impl GitCliClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), binary: PathBuf::from("git"), timeout: DEFAULT_TIMEOUT }
    }

    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Upper bound for a single git invocation.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn git(&self, dir: Option<&Path>, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = dir {
            cmd.current_dir(dir);
        }

        debug!(url = %self.url, ?args, "Running git");

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .with_context(|| format!("git {} timed out after {:?}", args[0], self.timeout))?
            .with_context(|| format!("Failed to run {}", self.binary.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("git {} failed ({}): {}", args[0], output.status, stderr.trim());
        }

        String::from_utf8(output.stdout).context("git produced non-UTF-8 output")
    }
}

#[async_trait]
impl RepositoryClient for GitCliClient {
    async fn resolve(&self, reference: &str) -> Result<ContentHash> {
        if is_object_id(reference) {
            return Ok(ContentHash::new(reference.to_ascii_lowercase()));
        }

        let listing = self.git(None, &["ls-remote", "--", &self.url, reference]).await?;
        parse_ls_remote(&listing, reference)
            .with_context(|| format!("Reference {} not found in {}", reference, self.url))
    }

    async fn clone_tree(
        &self,
        reference: &str,
    ) -> Result<(ContentHash, Arc<dyn FilesystemProvider>)> {
        let workdir = tempfile::Builder::new()
            .prefix("gitsnap-")
            .tempdir()
            .context("Failed to create checkout directory")?;
        let dir = workdir.path();

        self.git(Some(dir), &["init", "--quiet"]).await?;
        self.git(Some(dir), &["fetch", "--quiet", "--depth", "1", "--", &self.url, reference])
            .await?;
        self.git(Some(dir), &["checkout", "--quiet", "--detach", "FETCH_HEAD"]).await?;
        let head = self.git(Some(dir), &["rev-parse", "HEAD"]).await?;
        let hash = ContentHash::new(head.trim());

        let root = dir.to_path_buf();
        let tree = tokio::task::spawn_blocking(move || materialize(&root))
            .await
            .context("Checkout materialization task failed")??;

        debug!(
            url = %self.url,
            reference = %reference,
            hash = %hash,
            files = tree.file_count(),
            bytes = tree.total_size(),
            "Materialized checkout"
        );

        Ok((hash, Arc::new(tree)))
    }
}

/// Pick the hash for `reference` out of `git ls-remote` output.
///
/// Preference order: exact ref name, branch, peeled tag, tag.
pub fn parse_ls_remote(listing: &str, reference: &str) -> Option<ContentHash> {
    let refs: Vec<(&str, &str)> = listing
        .lines()
        .filter_map(|line| line.split_once('\t'))
        .map(|(hash, name)| (hash.trim(), name.trim()))
        .collect();

    let candidates = [
        reference.to_string(),
        format!("refs/heads/{}", reference),
        format!("refs/tags/{}^{{}}", reference),
        format!("refs/tags/{}", reference),
    ];

    candidates.iter().find_map(|wanted| {
        refs.iter().find(|(_, name)| name == wanted).map(|(hash, _)| ContentHash::new(*hash))
    })
}

fn is_object_id(reference: &str) -> bool {
    matches!(reference.len(), 40 | 64) && reference.chars().all(|c| c.is_ascii_hexdigit())
}

fn materialize(root: &Path) -> Result<MemoryTree> {
    let mut builder = MemoryTreeBuilder::new();

    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.file_name() != ".git");

    for entry in walker {
        let entry = entry.context("Failed to walk checkout")?;
        let relative = entry.path().strip_prefix(root).context("Entry outside checkout")?;
        let path = tree_path(relative)?;
        let file_type = entry.file_type();

        builder = if file_type.is_dir() {
            builder.dir(&path)?
        } else if file_type.is_symlink() {
            let target = std::fs::read_link(entry.path())
                .with_context(|| format!("Failed to read link {}", path))?;
            let target = target
                .to_str()
                .with_context(|| format!("Non-UTF-8 link target at {}", path))?
                .to_string();
            builder.symlink(&path, &target)?
        } else {
            let data = std::fs::read(entry.path())
                .with_context(|| format!("Failed to read {}", path))?;
            let mode = file_mode(&entry)?;
            builder.file_with_mode(&path, data, mode)?
        };
    }

    Ok(builder.build())
}

fn tree_path(relative: &Path) -> Result<String> {
    let mut path = String::new();
    for component in relative.components() {
        let part = component
            .as_os_str()
            .to_str()
            .with_context(|| format!("Non-UTF-8 path in checkout: {}", relative.display()))?;
        path.push('/');
        path.push_str(part);
    }
    Ok(path)
}

#[cfg(unix)]
fn file_mode(entry: &walkdir::DirEntry) -> Result<u32> {
    use std::os::unix::fs::PermissionsExt;

    let mode = entry.metadata().context("Failed to stat checkout entry")?.permissions().mode();
    // git only tracks the executable bit
    Ok(if mode & 0o111 != 0 { 0o755 } else { 0o644 })
}

#[cfg(not(unix))]
fn file_mode(_entry: &walkdir::DirEntry) -> Result<u32> {
    Ok(0o644)
}
