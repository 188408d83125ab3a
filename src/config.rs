//! Endpoint configuration: command line, then dotenv file, then environment
//!
//! The dotenv file is read into a map rather than exported into the process
//! environment, which keeps resolution a pure function of its inputs.

use log::{info, warn};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::{IngestError, Result};

/// Variable holding the base URL of the HTTP actions deployment
pub const URL_VAR: &str = "VITE_CONVEX_HTTP_ACTIONS_URL";
/// Variable holding the bearer token accepted by the ingestion route
pub const TOKEN_VAR: &str = "INGEST_TOKEN";
/// Dotenv file consulted when none is given explicitly
pub const DEFAULT_DOTENV: &str = ".env";

/// Where a configuration value came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Cli,
    DotEnv(PathBuf),
    Env,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::Cli => write!(f, "CLI arg"),
            ConfigSource::DotEnv(path) => write!(f, "dotenv {}", path.display()),
            ConfigSource::Env => write!(f, "env"),
        }
    }
}

/// Resolved endpoint settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    /// Base URL without a trailing slash
    pub base_url: String,
    pub token: String,
    pub url_source: ConfigSource,
    pub token_source: ConfigSource,
}

impl IngestConfig {
    /// Log the resolved values with the token masked
    pub fn log_summary(&self) {
        info!("Resolved configuration:");
        info!(
            "  {}={} (source={})",
            URL_VAR, self.base_url, self.url_source
        );
        info!("  {}=*** (source={})", TOKEN_VAR, self.token_source);
    }
}

/// Raw inputs to configuration resolution
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    pub cli_url: Option<String>,
    pub cli_token: Option<String>,
    /// Path of the dotenv file the values below were read from
    pub dotenv_path: Option<PathBuf>,
    pub dotenv: HashMap<String, String>,
    pub env: HashMap<String, String>,
}

impl ConfigSources {
    /// Gather sources from the command line, a dotenv file and the process
    /// environment.
    ///
    /// An explicit dotenv path that does not exist is reported and skipped;
    /// without one, `.env` in the working directory is used if present.
    pub fn gather(
        cli_url: Option<String>,
        cli_token: Option<String>,
        dot_env_file: Option<&Path>,
    ) -> Result<Self> {
        let (dotenv_path, kind) = match dot_env_file {
            Some(path) if path.exists() => (Some(path.to_path_buf()), "provided"),
            Some(path) => {
                warn!("Dot file {} was provided but not found", path.display());
                (None, "provided")
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_DOTENV);
                (default_path.exists().then_some(default_path), "default")
            }
        };

        let dotenv = match &dotenv_path {
            Some(path) => {
                let values = read_dotenv(path)?;
                info!("Loaded environment from {} dot file: {}", kind, path.display());
                values
            }
            None => HashMap::new(),
        };

        let env = [URL_VAR, TOKEN_VAR]
            .iter()
            .filter_map(|name| std::env::var(name).ok().map(|v| (name.to_string(), v)))
            .collect();

        Ok(Self {
            cli_url,
            cli_token,
            dotenv_path,
            dotenv,
            env,
        })
    }

    fn lookup(&self, cli: &Option<String>, name: &str) -> Option<(String, ConfigSource)> {
        if let Some(value) = cli.as_ref().filter(|v| !v.is_empty()) {
            return Some((value.clone(), ConfigSource::Cli));
        }
        if let Some(value) = self.dotenv.get(name).filter(|v| !v.is_empty()) {
            let path = self
                .dotenv_path
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DOTENV));
            return Some((value.clone(), ConfigSource::DotEnv(path)));
        }
        self.env
            .get(name)
            .filter(|v| !v.is_empty())
            .map(|value| (value.clone(), ConfigSource::Env))
    }

    /// Pick each value by precedence; both the URL and the token are required
    pub fn resolve(&self) -> Result<IngestConfig> {
        let url = self.lookup(&self.cli_url, URL_VAR);
        let token = self.lookup(&self.cli_token, TOKEN_VAR);

        match (url, token) {
            (Some((url, url_source)), Some((token, token_source))) => Ok(IngestConfig {
                base_url: url.trim_end_matches('/').to_string(),
                token,
                url_source,
                token_source,
            }),
            (url, token) => {
                let mut missing = Vec::new();
                if url.is_none() {
                    missing.push(URL_VAR);
                }
                if token.is_none() {
                    missing.push(TOKEN_VAR);
                }
                Err(IngestError::Config(format!(
                    "Convex URL or Ingest Token not provided (missing {})",
                    missing.join(", ")
                )))
            }
        }
    }
}

/// Parse a dotenv file without touching the process environment
pub fn read_dotenv(path: &Path) -> Result<HashMap<String, String>> {
    let iter = dotenv::from_path_iter(path).map_err(|e| {
        IngestError::Config(format!("Failed to read {}: {}", path.display(), e))
    })?;

    let mut values = HashMap::new();
    for item in iter {
        let (key, value) = item.map_err(|e| {
            IngestError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        values.insert(key, value);
    }
    Ok(values)
}

/// Convenience wrapper used by the binaries
pub fn load_configuration(
    cli_url: Option<String>,
    cli_token: Option<String>,
    dot_env_file: Option<&Path>,
) -> Result<IngestConfig> {
    let config = ConfigSources::gather(cli_url, cli_token, dot_env_file)?.resolve()?;
    config.log_summary();
    Ok(config)
}
