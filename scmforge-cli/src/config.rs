//! CLI configuration handling.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use scmforge_core::ClientCredentials;
use scmforge_core::endpoint::DEFAULT_API_BASE_URL;
use scmforge_core::provider::DEFAULT_TOKEN_URL;
use scmforge_core::token::DEFAULT_EXPIRY_BUFFER_SECS;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const ENV_CLIENT_ID: &str = "SCM_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "SCM_CLIENT_SECRET";
pub const ENV_TSG_ID: &str = "SCM_TSG_ID";

/// Errors loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config from {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("missing {field}: set it in the config file or via {env}")]
    MissingCredential { field: &'static str, env: &'static str },

    #[error("invalid setting {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScmforgeConfig {
    /// Service account client ID.
    pub client_id: Option<String>,

    /// Service account client secret.
    pub client_secret: Option<String>,

    /// Tenant service group the token is scoped to.
    pub tsg_id: Option<String>,

    /// Where the access token is cached between runs.
    pub token_file: PathBuf,

    pub auth_url: String,
    pub api_base_url: String,

    /// Default worker pool size for `create`.
    pub max_workers: usize,

    pub max_retries: u32,
    pub retry_delay_secs: u64,
    pub request_timeout_secs: u64,
    pub expiry_buffer_secs: u64,
}

impl Default for ScmforgeConfig {
    fn default() -> Self {
        let token_file = project_dirs()
            .map(|d| d.cache_dir().join("token_cache.json"))
            .unwrap_or_else(|| PathBuf::from("token_cache.json"));

        Self {
            client_id: None,
            client_secret: None,
            tsg_id: None,
            token_file,
            auth_url: DEFAULT_TOKEN_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            max_workers: 8,
            max_retries: 2,
            retry_delay_secs: 10,
            request_timeout_secs: 10,
            expiry_buffer_secs: DEFAULT_EXPIRY_BUFFER_SECS as u64,
        }
    }
}

impl ScmforgeConfig {
    /// Load from `path`, or the default location when `None`.
    ///
    /// A missing file yields defaults. Environment overrides are applied last.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => default_config_path(),
        };

        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            tracing::debug!("No config at {:?}, using defaults", path);
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Replace credential fields with values from `lookup` where present.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());
        if let Some(value) = non_empty(ENV_CLIENT_ID) {
            self.client_id = Some(value);
        }
        if let Some(value) = non_empty(ENV_CLIENT_SECRET) {
            self.client_secret = Some(value);
        }
        if let Some(value) = non_empty(ENV_TSG_ID) {
            self.tsg_id = Some(value);
        }
    }

    /// Service account credentials, or the first missing field.
    pub fn credentials(&self) -> Result<ClientCredentials, ConfigError> {
        let client_id = required(&self.client_id, "client_id", ENV_CLIENT_ID)?;
        let client_secret = required(&self.client_secret, "client_secret", ENV_CLIENT_SECRET)?;
        let tsg_id = required(&self.tsg_id, "tsg_id", ENV_TSG_ID)?;
        Ok(ClientCredentials::new(client_id, client_secret, tsg_id))
    }

    /// Check numeric settings that would make a run impossible.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_workers == 0 {
            return Err(ConfigError::Invalid {
                field: "max_workers",
                message: "must be at least 1".to_string(),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "request_timeout_secs",
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn expiry_buffer(&self) -> Duration {
        Duration::from_secs(self.expiry_buffer_secs)
    }
}

fn required<'a>(
    value: &'a Option<String>,
    field: &'static str,
    env: &'static str,
) -> Result<&'a str, ConfigError> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::MissingCredential { field, env })
}

pub fn default_config_path() -> PathBuf {
    project_dirs()
        .map(|d| d.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("scmforge.toml"))
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "scmforge", "scmforge")
}
