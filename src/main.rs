use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gitsnap::client::{GitCliClient, RepositoryClient};
use gitsnap::config::Config;
use gitsnap::metrics::RefreshMetrics;
use gitsnap::provision::provision_all;
use gitsnap::server::{self, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "gitsnap", version, about = "Serve live read-only snapshots of git repositories")]
struct Cli {
    /// Configuration file (defaults to ./gitsnap.toml when present)
    #[arg(short, long, env = "GITSNAP_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, env = "GITSNAP_LOG_JSON", global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Clone every repository and serve it over HTTP (default)
    Serve {
        /// Override server.listen_addr
        #[arg(short, long)]
        listen: Option<String>,
    },
    /// Validate the configuration and resolve every reference
    Check,
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "gitsnap=debug,info".into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command.unwrap_or(Command::Serve { listen: None }) {
        Command::Serve { listen } => serve(config, listen).await,
        Command::Check => check(&config).await,
    }
}

async fn serve(config: Config, listen: Option<String>) -> Result<()> {
    tracing::info!("Starting gitsnap");

    let metrics_registry = Arc::new(prometheus::Registry::new());
    let metrics = Arc::new(RefreshMetrics::new(metrics_registry.clone())?);
    let registry = Arc::new(provision_all(&config, Some(metrics)).await?);

    let listen_addr = listen.unwrap_or_else(|| config.server.listen_addr.clone());
    let state = AppState::new(registry.clone(), metrics_registry);

    let result = server::serve(&listen_addr, state, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
        }
        tracing::info!("Shutting down");
    })
    .await;

    registry.shutdown_all();
    result
}

async fn check(config: &Config) -> Result<()> {
    let repositories = config.repositories()?;

    for settings in &repositories {
        let client = GitCliClient::new(settings.reference.url.clone())
            .with_binary(&config.git.binary)
            .with_timeout(config.git.timeout());
        let hash = client
            .resolve(&settings.reference.reference)
            .await
            .with_context(|| format!("Repository {}", settings.name))?;

        println!(
            "{}\t{}@{}\t{}",
            settings.name, settings.reference.url, settings.reference.reference, hash
        );
    }

    Ok(())
}
