//! events::types
//!
//! Lifecycle events and the validation failures they may carry.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::auth::{AuthError, Credential, SignInReason};
use crate::environment::Environment;

/// Everything that travels over the [`EventBus`](super::EventBus).
///
/// The credential lifecycle publishes the sign-in/sign-out variants and
/// consumes `EnvironmentChanged`, `CredentialExpired`, the build variants
/// and `StartLanguageServerCompleted`, which are produced elsewhere.
#[derive(Debug, Clone)]
pub enum Event {
    CredentialReset,
    UserSignInTriggered {
        correlation_id: String,
    },
    UserSignInProgress {
        message: String,
        tag: String,
    },
    UserSignInSucceeded {
        correlation_id: String,
        credential: Credential,
        from_cache: bool,
        sign_in_reason: Option<SignInReason>,
    },
    UserSignInFailed {
        correlation_id: String,
        error: Arc<AuthError>,
    },
    UserSignOutTriggered {
        correlation_id: String,
    },
    UserSignOutSucceeded {
        correlation_id: String,
    },
    UserSignOutFailed {
        correlation_id: String,
        error: Arc<AuthError>,
    },
    PublicContributorSignIn,

    EnvironmentChanged {
        env: Environment,
    },
    /// The server rejected the credential. `during_live_session` is set when
    /// the rejection came from the running language server.
    CredentialExpired {
        during_live_session: bool,
    },
    BuildCompleted {
        correlation_id: String,
        result: BuildResult,
    },
    BuildFailed {
        correlation_id: String,
        error: ValidationError,
    },
    StartLanguageServerCompleted {
        succeeded: bool,
        error: Option<ValidationError>,
    },
}

/// Payload-free tag for an [`Event`], handy for asserting sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EventType {
    CredentialReset,
    UserSignInTriggered,
    UserSignInProgress,
    UserSignInSucceeded,
    UserSignInFailed,
    UserSignOutTriggered,
    UserSignOutSucceeded,
    UserSignOutFailed,
    PublicContributorSignIn,
    EnvironmentChanged,
    CredentialExpired,
    BuildCompleted,
    BuildFailed,
    StartLanguageServerCompleted,
}

impl Event {
    pub fn event_type(&self) -> EventType {
        match self {
            Event::CredentialReset => EventType::CredentialReset,
            Event::UserSignInTriggered { .. } => EventType::UserSignInTriggered,
            Event::UserSignInProgress { .. } => EventType::UserSignInProgress,
            Event::UserSignInSucceeded { .. } => EventType::UserSignInSucceeded,
            Event::UserSignInFailed { .. } => EventType::UserSignInFailed,
            Event::UserSignOutTriggered { .. } => EventType::UserSignOutTriggered,
            Event::UserSignOutSucceeded { .. } => EventType::UserSignOutSucceeded,
            Event::UserSignOutFailed { .. } => EventType::UserSignOutFailed,
            Event::PublicContributorSignIn => EventType::PublicContributorSignIn,
            Event::EnvironmentChanged { .. } => EventType::EnvironmentChanged,
            Event::CredentialExpired { .. } => EventType::CredentialExpired,
            Event::BuildCompleted { .. } => EventType::BuildCompleted,
            Event::BuildFailed { .. } => EventType::BuildFailed,
            Event::StartLanguageServerCompleted { .. } => EventType::StartLanguageServerCompleted,
        }
    }

    /// Correlation id threaded through this event, if it carries one.
    pub fn correlation_id(&self) -> Option<&str> {
        match self {
            Event::UserSignInTriggered { correlation_id }
            | Event::UserSignInSucceeded { correlation_id, .. }
            | Event::UserSignInFailed { correlation_id, .. }
            | Event::UserSignOutTriggered { correlation_id }
            | Event::UserSignOutSucceeded { correlation_id }
            | Event::UserSignOutFailed { correlation_id, .. }
            | Event::BuildCompleted { correlation_id, .. }
            | Event::BuildFailed { correlation_id, .. } => Some(correlation_id),
            _ => None,
        }
    }
}

/// Final state of a full repository build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BuildResult {
    Succeeded,
    Failed,
    Canceled,
}

/// Error codes reported by the external validation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ValidationErrorCode {
    TriggerBuildBeforeSignIn,
    TriggerBuildWithCredentialExpired,
    TriggerBuildOnInvalidDocsRepo,
    TriggerBuildOnNonWorkspace,
    RunDocfxFailed,
    StartServerFailed,
}

impl ValidationErrorCode {
    /// Whether the failure is explained by a missing or expired credential.
    pub fn is_credential_related(&self) -> bool {
        matches!(
            self,
            ValidationErrorCode::TriggerBuildBeforeSignIn
                | ValidationErrorCode::TriggerBuildWithCredentialExpired
        )
    }
}

/// A validation failure reported by the build pipeline or language server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub code: ValidationErrorCode,
    pub message: String,
}

impl ValidationError {
    pub fn new(code: ValidationErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ValidationError {}
