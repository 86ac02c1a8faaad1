//! core::config::schema
//!
//! Configuration file schema.
//!
//! Every field is optional; missing values fall back to the defaults the
//! [`Config`](super::Config) accessors apply. Unknown keys are rejected so
//! that typos surface instead of being silently ignored.
//!
//! # Example
//!
//! ```toml
//! environment = "PPE"
//! user_type = "internal"
//! repo_host = "azure-devops"
//!
//! [sign_in]
//! timeout_ms = 120000
//!
//! [redirect]
//! port = 43123
//!
//! [endpoints]
//! ppe = "https://op-build-sandbox2.azurewebsites.net"
//!
//! [secrets]
//! provider = "keychain"
//! ```

use reqwest::Url;
use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::environment::{ContributorClass, Environment, RepoHostType};
use crate::secrets::PROVIDERS;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    /// `"PROD"` or `"PPE"`
    pub environment: Option<String>,

    /// `"internal"` or `"external"`
    pub user_type: Option<String>,

    /// `"github"` or `"azure-devops"`
    pub repo_host: Option<String>,

    pub sign_in: Option<SignInConfig>,

    pub redirect: Option<RedirectConfig>,

    pub endpoints: Option<EndpointsConfig>,

    pub secrets: Option<SecretsConfig>,
}

impl ConfigFile {
    /// Validate values that TOML typing alone does not constrain.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(env) = &self.environment {
            env.parse::<Environment>().map_err(ConfigError::InvalidValue)?;
        }
        if let Some(user_type) = &self.user_type {
            user_type
                .parse::<ContributorClass>()
                .map_err(ConfigError::InvalidValue)?;
        }
        if let Some(host) = &self.repo_host {
            host.parse::<RepoHostType>()
                .map_err(ConfigError::InvalidValue)?;
        }
        if let Some(sign_in) = &self.sign_in {
            sign_in.validate()?;
        }
        if let Some(endpoints) = &self.endpoints {
            endpoints.validate()?;
        }
        if let Some(secrets) = &self.secrets {
            secrets.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SignInConfig {
    /// How long to wait for the browser redirect, in milliseconds.
    pub timeout_ms: Option<u64>,
}

impl SignInConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms == Some(0) {
            return Err(ConfigError::InvalidValue(
                "sign_in.timeout_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RedirectConfig {
    /// Loopback port for the redirect listener; 0 picks a free port.
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct EndpointsConfig {
    pub prod: Option<String>,
    pub ppe: Option<String>,
}

impl EndpointsConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [("prod", &self.prod), ("ppe", &self.ppe)] {
            let Some(value) = value else { continue };
            let url = Url::parse(value).map_err(|e| {
                ConfigError::InvalidValue(format!("endpoints.{} '{}': {}", name, value, e))
            })?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(ConfigError::InvalidValue(format!(
                    "endpoints.{} must be an http(s) URL, got '{}'",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SecretsConfig {
    /// `"file"` or `"keychain"`
    pub provider: Option<String>,
}

impl SecretsConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(provider) = &self.provider {
            if !PROVIDERS.contains(&provider.as_str()) {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid secrets provider '{}', must be one of: {}",
                    provider,
                    PROVIDERS.join(", ")
                )));
            }
        }
        Ok(())
    }
}
