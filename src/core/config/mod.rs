//! core::config
//!
//! Configuration loading and accessors.
//!
//! # Precedence
//!
//! 1. Default values
//! 2. Config file
//! 3. CLI flags (applied by the CLI, not here)
//!
//! # Locations
//!
//! The first existing file wins:
//! 1. `$DOCSAUTH_CONFIG`
//! 2. `$XDG_CONFIG_HOME/docsauth/config.toml`
//! 3. `~/.docsauth/config.toml`
//!
//! # Example
//!
//! ```no_run
//! use docsauth::core::config::Config;
//!
//! let config = Config::load().unwrap();
//! println!("environment: {}", config.environment());
//! println!("sign-in timeout: {:?}", config.sign_in_timeout());
//! ```

pub mod schema;

pub use schema::{ConfigFile, EndpointsConfig, RedirectConfig, SecretsConfig, SignInConfig};

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::auth::{LifecycleOptions, DEFAULT_SIGN_IN_TIMEOUT};
use crate::environment::{ContributorClass, Environment, EnvironmentSnapshot, RepoHostType};
use crate::redirect::Endpoints;
use crate::secrets::DEFAULT_PROVIDER;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "DOCSAUTH_CONFIG";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Loaded configuration with defaults applied by the accessors.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub file: ConfigFile,
    loaded_from: Option<PathBuf>,
}

impl Config {
    /// Load from the first existing standard location, or defaults.
    ///
    /// # Errors
    ///
    /// A config file that exists but cannot be read, parsed or validated.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_first(&Self::search_paths())
    }

    /// Candidate locations, most specific first.
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            paths.push(PathBuf::from(path));
        }
        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            paths.push(PathBuf::from(xdg_home).join("docsauth/config.toml"));
        }
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".docsauth/config.toml"));
        }
        paths
    }

    /// Load the first of `paths` that exists.
    pub fn load_first(paths: &[PathBuf]) -> Result<Self, ConfigError> {
        match paths.iter().find(|p| p.exists()) {
            Some(path) => Self::load_from(path),
            None => {
                tracing::debug!("no config file found; using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load a specific file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let file: ConfigFile = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        file.validate()?;

        tracing::debug!(path = %path.display(), "loaded config");
        Ok(Self {
            file,
            loaded_from: Some(path.to_path_buf()),
        })
    }

    pub fn loaded_from(&self) -> Option<&Path> {
        self.loaded_from.as_deref()
    }

    // Values were validated on load, so parse failures cannot happen here;
    // fall back to defaults regardless.

    /// Defaults to PROD.
    pub fn environment(&self) -> Environment {
        self.file
            .environment
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }

    /// Defaults to external.
    pub fn contributor_class(&self) -> ContributorClass {
        self.file
            .user_type
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }

    /// Defaults to GitHub.
    pub fn repo_host_type(&self) -> RepoHostType {
        self.file
            .repo_host
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }

    pub fn environment_snapshot(&self) -> EnvironmentSnapshot {
        EnvironmentSnapshot {
            env: self.environment(),
            contributor_class: self.contributor_class(),
            repo_host_type: self.repo_host_type(),
        }
    }

    /// Defaults to five minutes.
    pub fn sign_in_timeout(&self) -> Duration {
        self.file
            .sign_in
            .as_ref()
            .and_then(|s| s.timeout_ms)
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_SIGN_IN_TIMEOUT)
    }

    pub fn lifecycle_options(&self) -> LifecycleOptions {
        LifecycleOptions {
            sign_in_timeout: self.sign_in_timeout(),
        }
    }

    /// Defaults to 0 (ephemeral).
    pub fn redirect_port(&self) -> u16 {
        self.file
            .redirect
            .as_ref()
            .and_then(|r| r.port)
            .unwrap_or(0)
    }

    pub fn endpoints(&self) -> Endpoints {
        let mut endpoints = Endpoints::default();
        if let Some(configured) = &self.file.endpoints {
            if let Some(prod) = &configured.prod {
                endpoints.prod = prod.clone();
            }
            if let Some(ppe) = &configured.ppe {
                endpoints.ppe = ppe.clone();
            }
        }
        endpoints
    }

    /// Defaults to `"file"`.
    pub fn secrets_provider(&self) -> &str {
        self.file
            .secrets
            .as_ref()
            .and_then(|s| s.provider.as_deref())
            .unwrap_or(DEFAULT_PROVIDER)
    }
}
