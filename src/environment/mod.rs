//! environment
//!
//! Deployment environment, repository host and contributor class.
//!
//! The credential lifecycle consumes these through the narrow
//! [`EnvironmentContext`] trait. [`EnvironmentController`] is the mutable
//! implementation used by the CLI: it publishes
//! [`Event::EnvironmentChanged`] whenever a value actually changes so that
//! the lifecycle can re-read its cached credential for the new context.

use std::fmt;
use std::str::FromStr;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::events::{Event, EventBus};

/// Deployment environment of the documentation build service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Environment {
    #[default]
    #[serde(rename = "PROD")]
    Prod,
    #[serde(rename = "PPE")]
    Ppe,
}

impl Environment {
    /// Lowercase key used in secret-store keys.
    pub fn key(&self) -> &'static str {
        match self {
            Environment::Prod => "prod",
            Environment::Ppe => "ppe",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Prod => write!(f, "PROD"),
            Environment::Ppe => write!(f, "PPE"),
        }
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PROD" => Ok(Environment::Prod),
            "PPE" => Ok(Environment::Ppe),
            other => Err(format!("unknown environment '{}' (valid: PROD, PPE)", other)),
        }
    }
}

/// Whether the user declared themselves an internal (employee-class) or
/// external contributor. Only internal contributors sign in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContributorClass {
    Internal,
    #[default]
    External,
}

impl fmt::Display for ContributorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContributorClass::Internal => write!(f, "internal"),
            ContributorClass::External => write!(f, "external"),
        }
    }
}

impl FromStr for ContributorClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "internal" => Ok(ContributorClass::Internal),
            "external" => Ok(ContributorClass::External),
            other => Err(format!(
                "unknown user type '{}' (valid: internal, external)",
                other
            )),
        }
    }
}

/// Host of the documentation repository being validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RepoHostType {
    #[default]
    #[serde(rename = "github")]
    GitHub,
    #[serde(rename = "azure-devops")]
    AzureDevOps,
}

impl fmt::Display for RepoHostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepoHostType::GitHub => write!(f, "github"),
            RepoHostType::AzureDevOps => write!(f, "azure-devops"),
        }
    }
}

impl FromStr for RepoHostType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "github" => Ok(RepoHostType::GitHub),
            "azure-devops" | "azuredevops" => Ok(RepoHostType::AzureDevOps),
            other => Err(format!(
                "unknown repository host '{}' (valid: github, azure-devops)",
                other
            )),
        }
    }
}

/// Read-only view of the environment consumed by the credential lifecycle.
pub trait EnvironmentContext: Send + Sync {
    fn env(&self) -> Environment;
    fn contributor_class(&self) -> ContributorClass;
    fn repo_host_type(&self) -> RepoHostType;
}

/// A fixed set of environment values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EnvironmentSnapshot {
    pub env: Environment,
    pub contributor_class: ContributorClass,
    pub repo_host_type: RepoHostType,
}

impl EnvironmentContext for EnvironmentSnapshot {
    fn env(&self) -> Environment {
        self.env
    }

    fn contributor_class(&self) -> ContributorClass {
        self.contributor_class
    }

    fn repo_host_type(&self) -> RepoHostType {
        self.repo_host_type
    }
}

/// Mutable environment that announces changes on the event bus.
#[derive(Debug)]
pub struct EnvironmentController {
    current: RwLock<EnvironmentSnapshot>,
    bus: EventBus,
}

impl EnvironmentController {
    pub fn new(initial: EnvironmentSnapshot, bus: EventBus) -> Self {
        Self {
            current: RwLock::new(initial),
            bus,
        }
    }

    /// Current values.
    pub fn snapshot(&self) -> EnvironmentSnapshot {
        match self.current.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Replace all values, publishing `EnvironmentChanged` if anything differs.
    ///
    /// Returns true if a change was published.
    pub fn update(&self, next: EnvironmentSnapshot) -> bool {
        let changed = {
            let mut guard = match self.current.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let changed = *guard != next;
            *guard = next;
            changed
        };

        if changed {
            tracing::debug!(env = %next.env, host = ?next.repo_host_type, "environment changed");
            self.bus.publish(Event::EnvironmentChanged { env: next.env });
        }
        changed
    }

    pub fn set_env(&self, env: Environment) -> bool {
        self.update(EnvironmentSnapshot {
            env,
            ..self.snapshot()
        })
    }

    pub fn set_contributor_class(&self, contributor_class: ContributorClass) -> bool {
        self.update(EnvironmentSnapshot {
            contributor_class,
            ..self.snapshot()
        })
    }

    pub fn set_repo_host_type(&self, repo_host_type: RepoHostType) -> bool {
        self.update(EnvironmentSnapshot {
            repo_host_type,
            ..self.snapshot()
        })
    }
}

impl EnvironmentContext for EnvironmentController {
    fn env(&self) -> Environment {
        self.snapshot().env
    }

    fn contributor_class(&self) -> ContributorClass {
        self.snapshot().contributor_class
    }

    fn repo_host_type(&self) -> RepoHostType {
        self.snapshot().repo_host_type
    }
}
