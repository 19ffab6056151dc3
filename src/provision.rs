//! Startup wiring: configuration -> client -> initial clone -> manager.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::client::{GitCliClient, RepositoryClient};
use crate::config::{Config, ConfigError, GitConfig, RepoSettings};
use crate::manager::{RefreshError, SnapshotManager};
use crate::metrics::RefreshMetrics;
use crate::registry::{FilesystemRegistry, RegistryError};

#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Repository {name}: {source}")]
    Refresh {
        name: String,
        #[source]
        source: RefreshError,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Provision one repository with the git command-line client.
pub async fn provision_repo(
    settings: &RepoSettings,
    git: &GitConfig,
    metrics: Option<Arc<RefreshMetrics>>,
) -> Result<Arc<SnapshotManager>, ProvisionError> {
    let client = GitCliClient::new(settings.reference.url.clone())
        .with_binary(&git.binary)
        .with_timeout(git.timeout());
    provision_with_client(settings, Arc::new(client), metrics).await
}

/// Clone the initial snapshot and start the refresh loop if a period is set.
pub async fn provision_with_client(
    settings: &RepoSettings,
    client: Arc<dyn RepositoryClient>,
    metrics: Option<Arc<RefreshMetrics>>,
) -> Result<Arc<SnapshotManager>, ProvisionError> {
    let mut manager =
        SnapshotManager::provision(settings.name.clone(), client, settings.reference.clone())
            .await
            .map_err(|source| ProvisionError::Refresh { name: settings.name.clone(), source })?;
    if let Some(metrics) = metrics {
        manager = manager.with_metrics(metrics);
    }

    let manager = Arc::new(manager);
    if let Some(period) = settings.refresh_period {
        manager
            .start_refresh_loop(period)
            .map_err(|source| ProvisionError::Refresh { name: settings.name.clone(), source })?;
    }
    Ok(manager)
}

/// Provision every configured repository into a registry.
///
/// Fails on the first invalid entry or failed initial clone; managers
/// provisioned before the failure are torn down when dropped.
pub async fn provision_all(
    config: &Config,
    metrics: Option<Arc<RefreshMetrics>>,
) -> Result<FilesystemRegistry, ProvisionError> {
    let repositories = config.repositories()?;
    let mut registry = FilesystemRegistry::new();

    for settings in &repositories {
        let manager = provision_repo(settings, &config.git, metrics.clone()).await?;
        registry.register(manager)?;
    }

    info!(count = registry.len(), "Provisioned repositories");
    Ok(registry)
}
