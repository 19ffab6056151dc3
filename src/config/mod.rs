mod duration;

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::snapshot::RepoReference;

pub use duration::{DurationError, parse_duration};

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_GIT_TIMEOUT_SECS: u64 = 300;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("No repositories configured")]
    NoRepositories,

    #[error("Repository name is empty or contains '/': {0:?}")]
    InvalidName(String),

    #[error("Duplicate repository name: {0}")]
    DuplicateName(String),

    #[error("Repository {0}: 'url' is empty")]
    MissingUrl(String),

    #[error("Repository {name}: invalid refresh_period: {source}")]
    InvalidDuration {
        name: String,
        #[source]
        source: DurationError,
    },

    #[error("Repository {0}: refresh_period must be positive")]
    NonPositivePeriod(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub git: GitConfig,
    pub repos: Vec<RepoConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    pub binary: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoConfig {
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub refresh_period: Option<String>,
}

/// A validated repository entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSettings {
    pub name: String,
    pub reference: RepoReference,
    pub refresh_period: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { listen_addr: DEFAULT_LISTEN_ADDR.to_string() }
    }
}

impl Default for GitConfig {
    fn default() -> Self {
        Self { binary: "git".to_string(), timeout_secs: DEFAULT_GIT_TIMEOUT_SECS }
    }
}

impl GitConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load from `path` (or an optional `gitsnap.*` file in the working
    /// directory) layered with `GITSNAP_*` environment variables.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name("gitsnap").required(false),
        };
        Self::from_sources(file, Self::environment())
    }

    /// Parse a TOML document, still layered with the environment.
    pub fn from_toml(document: &str) -> ConfigResult<Self> {
        Self::from_sources(
            config::File::from_str(document, config::FileFormat::Toml),
            Self::environment(),
        )
    }

    fn environment() -> config::Environment {
        config::Environment::with_prefix("GITSNAP").prefix_separator("_").separator("__")
    }

    fn from_sources<F>(file: F, environment: config::Environment) -> ConfigResult<Self>
    where
        F: config::Source + Send + Sync + 'static,
    {
        let config = config::Config::builder().add_source(file).add_source(environment).build()?;

        Ok(config.try_deserialize()?)
    }

    /// Validate every repository entry.
    pub fn repositories(&self) -> ConfigResult<Vec<RepoSettings>> {
        if self.repos.is_empty() {
            return Err(ConfigError::NoRepositories);
        }

        let mut seen = BTreeSet::new();
        let mut settings = Vec::with_capacity(self.repos.len());
        for repo in &self.repos {
            let validated = repo.validate()?;
            if !seen.insert(validated.name.clone()) {
                return Err(ConfigError::DuplicateName(validated.name));
            }
            settings.push(validated);
        }
        Ok(settings)
    }
}

impl RepoConfig {
    pub fn validate(&self) -> ConfigResult<RepoSettings> {
        let name = self.name.trim();
        if name.is_empty() || name.contains('/') {
            return Err(ConfigError::InvalidName(self.name.clone()));
        }

        let url = self.url.trim();
        if url.is_empty() {
            return Err(ConfigError::MissingUrl(name.to_string()));
        }

        // an explicit `ref` wins over a `url@ref` suffix
        let (url, suffix_ref) = split_url_reference(url);
        let reference =
            self.reference.clone().filter(|r| !r.trim().is_empty()).or(suffix_ref);

        let refresh_period = match self.refresh_period.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => {
                let period = parse_duration(raw).map_err(|source| ConfigError::InvalidDuration {
                    name: name.to_string(),
                    source,
                })?;
                if period.is_zero() {
                    return Err(ConfigError::NonPositivePeriod(name.to_string()));
                }
                Some(period)
            }
        };

        Ok(RepoSettings {
            name: name.to_string(),
            reference: RepoReference::new(url, reference),
            refresh_period,
        })
    }
}

/// Split `https://host/repo.git@ref` into the URL and the reference.
///
/// Only URLs that parse, with exactly one `@` in the path, are split;
/// scp-style remotes and local paths are returned untouched.
pub fn split_url_reference(raw: &str) -> (String, Option<String>) {
    let Ok(mut parsed) = Url::parse(raw) else {
        return (raw.to_string(), None);
    };

    let path = parsed.path().to_string();
    let parts: Vec<&str> = path.split('@').collect();
    match parts.as_slice() {
        [base, reference] if !reference.is_empty() => {
            let reference = reference.to_string();
            parsed.set_path(base);
            (parsed.to_string(), Some(reference))
        }
        _ => (raw.to_string(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo(name: &str, url: &str) -> RepoConfig {
        RepoConfig {
            name: name.to_string(),
            url: url.to_string(),
            reference: None,
            refresh_period: None,
        }
    }

    #[test]
    fn test_config_default_values() {
        let config = Config::default();

        assert_eq!(config.server.listen_addr, "127.0.0.1:8080");
        assert_eq!(config.git.binary, "git");
        assert_eq!(config.git.timeout(), Duration::from_secs(300));
        assert!(config.repos.is_empty());
    }

    #[test]
    fn test_config_from_toml() {
        let config = Config::from_toml(
            r#"
            [server]
            listen_addr = "0.0.0.0:9000"

            [git]
            timeout_secs = 60

            [[repos]]
            name = "docs"
            url = "https://github.com/example/docs.git"
            ref = "main"
            refresh_period = "5m"

            [[repos]]
            name = "site"
            url = "https://github.com/example/site.git"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.listen_addr, "0.0.0.0:9000");
        assert_eq!(config.git.timeout_secs, 60);
        assert_eq!(config.git.binary, "git");
        assert_eq!(config.repos.len(), 2);

        let repos = config.repositories().unwrap();
        assert_eq!(repos[0].name, "docs");
        assert_eq!(repos[0].reference.reference, "main");
        assert_eq!(repos[0].refresh_period, Some(Duration::from_secs(300)));
        assert_eq!(repos[1].reference.reference, "HEAD");
        assert_eq!(repos[1].refresh_period, None);
    }

    #[test]
    fn test_no_repositories() {
        assert!(matches!(Config::default().repositories(), Err(ConfigError::NoRepositories)));
    }

    #[test]
    fn test_duplicate_names() {
        let config = Config {
            repos: vec![repo("docs", "https://a/x.git"), repo("docs", "https://b/y.git")],
            ..Default::default()
        };
        assert!(matches!(config.repositories(), Err(ConfigError::DuplicateName(n)) if n == "docs"));
    }

    #[test]
    fn test_missing_url() {
        assert!(matches!(repo("docs", "  ").validate(), Err(ConfigError::MissingUrl(_))));
    }

    #[test]
    fn test_invalid_name() {
        assert!(matches!(repo("", "https://a/x.git").validate(), Err(ConfigError::InvalidName(_))));
        assert!(matches!(
            repo("a/b", "https://a/x.git").validate(),
            Err(ConfigError::InvalidName(_))
        ));
    }

    #[test]
    fn test_refresh_period_validation() {
        let mut cfg = repo("docs", "https://a/x.git");

        cfg.refresh_period = Some("1h30m".to_string());
        assert_eq!(cfg.validate().unwrap().refresh_period, Some(Duration::from_secs(5400)));

        cfg.refresh_period = Some("".to_string());
        assert_eq!(cfg.validate().unwrap().refresh_period, None);

        cfg.refresh_period = Some("0s".to_string());
        assert!(matches!(cfg.validate(), Err(ConfigError::NonPositivePeriod(_))));

        cfg.refresh_period = Some("soon".to_string());
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidDuration { .. })));
    }

    #[test]
    fn test_url_reference_suffix() {
        let settings = repo("docs", "https://github.com/example/docs.git@v1.2").validate().unwrap();
        assert_eq!(settings.reference.url, "https://github.com/example/docs.git");
        assert_eq!(settings.reference.reference, "v1.2");
    }

    #[test]
    fn test_explicit_reference_wins_over_suffix() {
        let mut cfg = repo("docs", "https://github.com/example/docs.git@v1.2");
        cfg.reference = Some("main".to_string());
        let settings = cfg.validate().unwrap();
        assert_eq!(settings.reference.url, "https://github.com/example/docs.git");
        assert_eq!(settings.reference.reference, "main");
    }

    #[test]
    fn test_split_url_reference_passthrough() {
        assert_eq!(
            split_url_reference("git@github.com:example/docs.git"),
            ("git@github.com:example/docs.git".to_string(), None)
        );
        assert_eq!(
            split_url_reference("https://github.com/example/docs.git"),
            ("https://github.com/example/docs.git".to_string(), None)
        );
        assert_eq!(
            split_url_reference("https://host/a@b@c"),
            ("https://host/a@b@c".to_string(), None)
        );
    }

    #[test]
    fn test_split_url_reference_with_slash_in_ref() {
        let (url, reference) = split_url_reference("https://host/repo.git@feature/x");
        assert_eq!(url, "https://host/repo.git");
        assert_eq!(reference.as_deref(), Some("feature/x"));
    }

    #[test]
    fn test_environment_overrides_file() {
        let mut env = config::Map::new();
        env.insert("GITSNAP_SERVER__LISTEN_ADDR".to_string(), "0.0.0.0:7000".to_string());

        let config = Config::from_sources(
            config::File::from_str("[server]\nlisten_addr = \"127.0.0.1:1\"", config::FileFormat::Toml),
            Config::environment().source(Some(env)),
        )
        .unwrap();

        assert_eq!(config.server.listen_addr, "0.0.0.0:7000");
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = Config {
            repos: vec![repo("docs", "https://a/x.git")],
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(back.repos[0].name, "docs");
        assert_eq!(back.server.listen_addr, DEFAULT_LISTEN_ADDR);
    }
}
