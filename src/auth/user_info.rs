//! auth::user_info
//!
//! Identity and credential types.
//!
//! # Invariant
//!
//! A [`Credential`] is `SignedIn` if and only if it carries a [`UserInfo`].
//! The fields are private and the only constructors are
//! [`Credential::signed_out`] and [`Credential::signed_in`], so no other
//! combination can be built.
//!
//! # Security
//!
//! [`UserInfo`] holds an opaque bearer token. Its `Debug` implementation
//! redacts the token so that credentials can be logged and put in events.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::AuthError;
use crate::environment::RepoHostType;
use crate::redirect::RedirectPayload;

/// Query parameter carrying the bearer token on the sign-in redirect.
pub const USER_TOKEN_PARAM: &str = "X-OP-BuildUserToken";

/// Identity provider used for a sign-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignType {
    #[serde(rename = "GitHub")]
    GitHub,
    #[serde(rename = "Azure DevOps")]
    AzureDevOps,
}

impl SignType {
    /// Short, lowercase key used in secret-store keys.
    pub fn key(&self) -> &'static str {
        match self {
            SignType::GitHub => "github",
            SignType::AzureDevOps => "azure-devops",
        }
    }

    /// Redirect route the provider calls back on.
    pub fn callback_path(&self) -> &'static str {
        match self {
            SignType::GitHub => "/github-authenticate",
            SignType::AzureDevOps => "/azure-devops-authenticate",
        }
    }

    /// Path segment of the provider's login endpoint.
    pub fn login_path(&self) -> &'static str {
        match self {
            SignType::GitHub => "v2/users/github-login",
            SignType::AzureDevOps => "v2/users/azure-devops-login",
        }
    }

    /// Human-readable progress message shown while waiting for the redirect.
    pub fn progress_message(&self) -> String {
        format!("Signing in to Docs with {} account...", self)
    }
}

impl fmt::Display for SignType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignType::GitHub => write!(f, "GitHub"),
            SignType::AzureDevOps => write!(f, "Azure DevOps"),
        }
    }
}

impl From<RepoHostType> for SignType {
    fn from(host: RepoHostType) -> Self {
        match host {
            RepoHostType::GitHub => SignType::GitHub,
            RepoHostType::AzureDevOps => SignType::AzureDevOps,
        }
    }
}

/// An authenticated identity.
///
/// Only produced by a completed redirect or read back from the key chain.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub sign_type: SignType,
    pub user_id: String,
    pub user_name: String,
    pub user_email: String,
    /// Opaque bearer credential. Never log it.
    pub user_token: String,
}

impl UserInfo {
    /// Build a user from the claims carried by a sign-in redirect.
    ///
    /// `id`, `name` and the token are required; `email` may be empty
    /// for accounts that keep it private.
    pub fn from_redirect(sign_type: SignType, payload: &RedirectPayload) -> Result<Self, AuthError> {
        let required = |name: &str| {
            payload
                .get(name)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or_else(|| AuthError::InvalidRedirect {
                    provider: sign_type,
                    message: format!("missing '{}'", name),
                })
        };

        Ok(Self {
            sign_type,
            user_id: required("id")?,
            user_name: required("name")?,
            user_email: payload.get("email").unwrap_or_default().to_string(),
            user_token: required(USER_TOKEN_PARAM)?,
        })
    }
}

impl fmt::Debug for UserInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserInfo")
            .field("sign_type", &self.sign_type)
            .field("user_id", &self.user_id)
            .field("user_name", &self.user_name)
            .field("user_email", &self.user_email)
            .field("user_token", &"[REDACTED]")
            .finish()
    }
}

/// Externally visible sign-in status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SignInStatus {
    SignedIn,
    SignedOut,
}

/// Authentication state owned by the credential lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    sign_in_status: SignInStatus,
    user_info: Option<UserInfo>,
}

impl Credential {
    pub fn signed_out() -> Self {
        Self {
            sign_in_status: SignInStatus::SignedOut,
            user_info: None,
        }
    }

    pub fn signed_in(user: UserInfo) -> Self {
        Self {
            sign_in_status: SignInStatus::SignedIn,
            user_info: Some(user),
        }
    }

    pub fn status(&self) -> SignInStatus {
        self.sign_in_status
    }

    pub fn user_info(&self) -> Option<&UserInfo> {
        self.user_info.as_ref()
    }

    pub fn is_signed_in(&self) -> bool {
        self.sign_in_status == SignInStatus::SignedIn
    }
}

impl Default for Credential {
    fn default() -> Self {
        Self::signed_out()
    }
}

/// Why a sign-in was needed, when a failure elsewhere was attributed to a
/// missing or expired credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SignInReason {
    /// A full repository validation (build) failed for lack of credentials.
    FullRepoValidation,
    /// Real-time validation (the language server) lost or lacked credentials.
    RealTimeValidation,
}
