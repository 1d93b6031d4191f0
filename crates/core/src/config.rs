//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Enable the /metrics endpoint for Prometheus scraping (default: true).
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
    /// Largest accepted request body for a single PUT, in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_max_upload_bytes() -> u64 {
    512 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            metrics_enabled: default_metrics_enabled(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.bind.trim().is_empty() {
            return Err("server.bind cannot be empty".to_string());
        }
        if self.max_upload_bytes == 0 {
            return Err("server.max_upload_bytes must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Storage backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem storage.
    Filesystem {
        /// Root directory for storage.
        path: PathBuf,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("./data/repository"),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StorageConfig::Filesystem { path } if path.as_os_str().is_empty() => {
                Err("filesystem storage requires a non-empty path".to_string())
            }
            StorageConfig::Filesystem { .. } => Ok(()),
        }
    }
}

/// How the repository serves reads.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum RepositoryConfig {
    /// Hosted repository: reads and writes go to the local store.
    #[default]
    Local,
    /// Read-through cache in front of a remote Maven repository.
    Proxy {
        /// Base URL of the remote repository (e.g., "https://repo1.maven.org/maven2").
        remote_url: String,
        /// Connect timeout for the remote, in seconds.
        connect_timeout_secs: Option<u64>,
        /// Whole-request timeout for the remote, in seconds.
        request_timeout_secs: Option<u64>,
        /// Basic-auth username for the remote.
        username: Option<String>,
        /// Basic-auth password for the remote.
        /// WARNING: Prefer DEPOT_REPOSITORY__PASSWORD over storing in config.
        password: Option<String>,
    },
}

impl RepositoryConfig {
    pub fn is_proxy(&self) -> bool {
        matches!(self, Self::Proxy { .. })
    }

    /// Connect timeout for the remote, if configured.
    pub fn connect_timeout(&self) -> Option<Duration> {
        match self {
            Self::Proxy {
                connect_timeout_secs,
                ..
            } => connect_timeout_secs.map(Duration::from_secs),
            Self::Local => None,
        }
    }

    /// Request timeout for the remote, if configured.
    pub fn request_timeout(&self) -> Option<Duration> {
        match self {
            Self::Proxy {
                request_timeout_secs,
                ..
            } => request_timeout_secs.map(Duration::from_secs),
            Self::Local => None,
        }
    }

    /// Validate repository configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::Local => Ok(()),
            Self::Proxy {
                remote_url,
                username,
                password,
                ..
            } => {
                if !(remote_url.starts_with("http://") || remote_url.starts_with("https://")) {
                    return Err(format!(
                        "repository.remote_url must be an http(s) URL, got {remote_url:?}"
                    ));
                }
                match (username.as_ref(), password.as_ref()) {
                    (None, Some(_)) => {
                        Err("repository.password requires repository.username".to_string())
                    }
                    _ => Ok(()),
                }
            }
        }
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Storage backend configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Repository mode.
    #[serde(default)]
    pub repository: RepositoryConfig,
}

impl AppConfig {
    /// Create a test configuration with sensible defaults.
    ///
    /// **For testing only.** Local mode over the default filesystem path.
    pub fn for_testing() -> Self {
        Self::default()
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), String> {
        self.server.validate()?;
        self.storage.validate()?;
        self.repository.validate()
    }
}
