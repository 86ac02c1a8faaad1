//! auth::errors
//!
//! Error types surfaced by the credential lifecycle.
//!
//! # Design
//!
//! Every failure inside `sign_in`, `sign_out` and `initialize` is converted
//! into an [`AuthError`] and published on the event bus rather than returned
//! to the caller. Each error therefore has to carry enough text to render a
//! meaningful message on its own, plus a stable [`ErrorKind`] / [`ErrorCode`]
//! pair so that presentation layers can decide what to offer the user.
//!
//! Error messages MUST NOT contain bearer tokens.
//!
//! # Example
//!
//! ```
//! use docsauth::auth::{AuthError, ErrorKind, SignType};
//!
//! let err = AuthError::ExternalUrlDeclined(SignType::GitHub);
//! assert_eq!(err.kind(), ErrorKind::ExternalUrlDeclined);
//! assert_eq!(
//!     err.to_string(),
//!     "Signing in with GitHub failed: please allow to open external URL to sign in"
//! );
//! ```

use serde::Serialize;
use thiserror::Error;

use super::user_info::SignType;
use crate::redirect::RedirectError;
use crate::secrets::SecretError;

/// The redirect never arrived within the configured sign-in window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Timed out")]
pub struct TimeOutError;

/// Errors from credential lifecycle operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The user refused to let the external browser open.
    #[error("Signing in with {0} failed: please allow to open external URL to sign in")]
    ExternalUrlDeclined(SignType),

    /// The redirect did not arrive before the sign-in timer fired.
    #[error("Signing in with {provider} failed: {source}")]
    SignInTimedOut {
        provider: SignType,
        #[source]
        source: TimeOutError,
    },

    /// Pass-through failure from the redirect channel or environment.
    #[error("Signing in with {provider} failed: {message}")]
    SignInFailed { provider: SignType, message: String },

    /// The redirect arrived but did not carry a complete identity.
    #[error("Signing in with {provider} failed: invalid redirect: {message}")]
    InvalidRedirect { provider: SignType, message: String },

    /// The secret store could not be read or written.
    #[error("credential store unavailable: {0}")]
    StoreUnavailable(String),
}

/// Coarse classification of an [`AuthError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    ExternalUrlDeclined,
    SignInTimedOut,
    SignInFailed,
    InvalidRedirect,
    StoreUnavailable,
}

/// Stable, provider-specific error codes.
///
/// These are what downstream consumers (telemetry, message rendering) key
/// off; the human message may change, the code may not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorCode {
    GitHubSignInExternalUrlDeclined,
    GitHubSignInTimeOut,
    GitHubSignInFailed,
    AzureDevOpsSignInExternalUrlDeclined,
    AzureDevOpsSignInTimeOut,
    AzureDevOpsSignInFailed,
    InvalidRedirect,
    StoreUnavailable,
}

impl AuthError {
    /// Wrap a redirect channel failure with the provider-specific prefix.
    ///
    /// A declined browser launch keeps its dedicated kind; everything else
    /// becomes [`AuthError::SignInFailed`].
    pub fn from_redirect(provider: SignType, err: RedirectError) -> Self {
        match err {
            RedirectError::Declined => AuthError::ExternalUrlDeclined(provider),
            other => AuthError::SignInFailed {
                provider,
                message: other.to_string(),
            },
        }
    }

    /// Build the timeout error for a provider.
    pub fn timed_out(provider: SignType) -> Self {
        AuthError::SignInTimedOut {
            provider,
            source: TimeOutError,
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::ExternalUrlDeclined(_) => ErrorKind::ExternalUrlDeclined,
            AuthError::SignInTimedOut { .. } => ErrorKind::SignInTimedOut,
            AuthError::SignInFailed { .. } => ErrorKind::SignInFailed,
            AuthError::InvalidRedirect { .. } => ErrorKind::InvalidRedirect,
            AuthError::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
        }
    }

    /// Provider-specific stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            AuthError::ExternalUrlDeclined(SignType::GitHub) => {
                ErrorCode::GitHubSignInExternalUrlDeclined
            }
            AuthError::ExternalUrlDeclined(SignType::AzureDevOps) => {
                ErrorCode::AzureDevOpsSignInExternalUrlDeclined
            }
            AuthError::SignInTimedOut {
                provider: SignType::GitHub,
                ..
            } => ErrorCode::GitHubSignInTimeOut,
            AuthError::SignInTimedOut {
                provider: SignType::AzureDevOps,
                ..
            } => ErrorCode::AzureDevOpsSignInTimeOut,
            AuthError::SignInFailed {
                provider: SignType::GitHub,
                ..
            } => ErrorCode::GitHubSignInFailed,
            AuthError::SignInFailed {
                provider: SignType::AzureDevOps,
                ..
            } => ErrorCode::AzureDevOpsSignInFailed,
            AuthError::InvalidRedirect { .. } => ErrorCode::InvalidRedirect,
            AuthError::StoreUnavailable(_) => ErrorCode::StoreUnavailable,
        }
    }

    /// Whether the presentation layer should offer to retry sign-in.
    pub fn offers_retry(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::ExternalUrlDeclined | ErrorKind::SignInTimedOut
        )
    }
}

impl From<SecretError> for AuthError {
    fn from(err: SecretError) -> Self {
        AuthError::StoreUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(err: serde_json::Error) -> Self {
        AuthError::StoreUnavailable(format!("invalid stored credential: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn declined_messages_are_provider_specific() {
        assert_eq!(
            AuthError::ExternalUrlDeclined(SignType::GitHub).to_string(),
            "Signing in with GitHub failed: please allow to open external URL to sign in"
        );
        assert_eq!(
            AuthError::ExternalUrlDeclined(SignType::AzureDevOps).to_string(),
            "Signing in with Azure DevOps failed: please allow to open external URL to sign in"
        );
    }

    #[test]
    fn timeout_wraps_timeout_condition() {
        let err = AuthError::timed_out(SignType::GitHub);
        assert_eq!(err.to_string(), "Signing in with GitHub failed: Timed out");
        assert_eq!(err.kind(), ErrorKind::SignInTimedOut);

        let source = err.source().expect("timeout has a source");
        assert_eq!(source.to_string(), "Timed out");
    }

    #[test]
    fn codes_follow_provider() {
        assert_eq!(
            AuthError::timed_out(SignType::AzureDevOps).code(),
            ErrorCode::AzureDevOpsSignInTimeOut
        );
        assert_eq!(
            AuthError::ExternalUrlDeclined(SignType::GitHub).code(),
            ErrorCode::GitHubSignInExternalUrlDeclined
        );
        assert_eq!(
            AuthError::StoreUnavailable("x".into()).code(),
            ErrorCode::StoreUnavailable
        );
    }

    #[test]
    fn redirect_declined_maps_to_declined_kind() {
        let err = AuthError::from_redirect(SignType::GitHub, RedirectError::Declined);
        assert_eq!(err.kind(), ErrorKind::ExternalUrlDeclined);
    }

    #[test]
    fn other_redirect_failures_are_prefixed() {
        let err = AuthError::from_redirect(
            SignType::AzureDevOps,
            RedirectError::Launch("no display".into()),
        );
        assert_eq!(err.kind(), ErrorKind::SignInFailed);
        let msg = err.to_string();
        assert!(msg.starts_with("Signing in with Azure DevOps failed: "));
        assert!(msg.contains("no display"));
    }

    #[test]
    fn retry_offered_for_declined_and_timeout_only() {
        assert!(AuthError::ExternalUrlDeclined(SignType::GitHub).offers_retry());
        assert!(AuthError::timed_out(SignType::GitHub).offers_retry());
        assert!(!AuthError::StoreUnavailable("disk".into()).offers_retry());
    }

    #[test]
    fn secret_errors_become_store_unavailable() {
        let err: AuthError = SecretError::ReadError("locked".into()).into();
        assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
        assert!(err.to_string().contains("locked"));
    }
}
