// ABOUTME: Client configuration loaded from config.toml with defaults for every setting
// Covers the workspace cache location, transport limits, query paging and logging

use anyhow::{bail, Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Environment variable overriding the workspace cache location.
pub const CACHE_FILE_ENV: &str = "TFVC_CACHE_FILE";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "tfvc-client", "tfvc-client")
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Workspace cache file; defaults to the platform cache directory.
    pub cache_file: Option<PathBuf>,
    pub transport: TransportConfig,
    pub query: QueryConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Upper bound on pooled connections (and concurrent requests) per session.
    pub max_connections: usize,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_connections: 4,
            connect_timeout_secs: 10,
            request_timeout_secs: 60,
            user_agent: format!("tfvc-client/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl TransportConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Pending changes requested per server page.
    pub page_size: u32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self { page_size: 500 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub directory: Option<PathBuf>,
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: None,
            filter: "tfvc_client=info".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn log_directory(&self) -> PathBuf {
        self.directory.clone().unwrap_or_else(|| {
            project_dirs()
                .map(|dirs| dirs.data_local_dir().join("logs"))
                .unwrap_or_else(|| PathBuf::from(".tfvc-client/logs"))
        })
    }
}

impl ClientConfig {
    /// Default location of `config.toml`.
    pub fn config_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load from the default location, falling back to defaults when absent.
    pub fn load() -> Result<Self> {
        Self::load_layered(
            Self::config_path().as_deref(),
            std::env::var(CACHE_FILE_ENV).ok(),
        )
    }

    /// Load `path` if it exists, then apply a cache file override.
    fn load_layered(path: Option<&Path>, cache_file: Option<String>) -> Result<Self> {
        let mut config = match path {
            Some(path) if path.exists() => Self::load_from(path)?,
            _ => {
                debug!("No config file found, using defaults");
                Self::default()
            }
        };

        if let Some(cache_file) = cache_file {
            debug!("Using workspace cache from {}: {}", CACHE_FILE_ENV, cache_file);
            config.cache_file = Some(PathBuf::from(cache_file));
        }

        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.transport.max_connections == 0 {
            bail!("transport.max_connections must be at least 1");
        }
        if self.query.page_size == 0 {
            bail!("query.page_size must be at least 1");
        }
        Ok(())
    }

    pub fn cache_file_path(&self) -> PathBuf {
        self.cache_file.clone().unwrap_or_else(|| {
            project_dirs()
                .map(|dirs| dirs.cache_dir().join("workspaces.json"))
                .unwrap_or_else(|| PathBuf::from(".tfvc-client/workspaces.json"))
        })
    }
}
