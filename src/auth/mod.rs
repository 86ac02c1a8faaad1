//! auth - Docs sign-in and the credential lifecycle
//!
//! # Architecture
//!
//! - [`UserInfo`] / [`Credential`] - the identity produced by a browser
//!   redirect and the `SignedIn` / `SignedOut` state that carries it
//! - [`UserInfoStore`] - async persistence seam; [`KeyChain`] implements it
//!   on top of a [`SecretStore`](crate::secrets::SecretStore)
//! - [`CredentialLifecycle`] - the state machine: initialize from cache,
//!   sign in through a [`RedirectChannel`](crate::redirect::RedirectChannel)
//!   raced against a timeout, sign out, and react to expiry and
//!   credential-related build failures
//!
//! Outcomes are reported on the [`EventBus`](crate::events::EventBus); the
//! lifecycle operations themselves never fail.
//!
//! # Security
//!
//! The bearer token in [`UserInfo`] must never appear in logs, events'
//! `Debug` output or error messages. Types holding it implement a redacting
//! `Debug`.
//!
//! # Example
//!
//! ```ignore
//! use docsauth::auth::{CredentialLifecycle, KeyChain, LifecycleDeps, LifecycleOptions};
//!
//! let lifecycle = CredentialLifecycle::spawn(deps, LifecycleOptions::default());
//! lifecycle.initialize(correlation_id).await;
//! if !lifecycle.credential().is_signed_in() {
//!     lifecycle.sign_in(correlation_id).await;
//! }
//! ```

mod errors;
mod keychain;
mod lifecycle;
mod user_info;

pub use errors::{AuthError, ErrorCode, ErrorKind, TimeOutError};
pub use keychain::{KeyChain, StoredUser, UserInfoStore, STORED_USER_KIND, STORED_USER_VERSION};
pub use lifecycle::{
    CredentialLifecycle, LifecycleDeps, LifecycleOptions, DEFAULT_SIGN_IN_TIMEOUT,
    SIGN_IN_PROGRESS_TAG,
};
pub use user_info::{
    Credential, SignInReason, SignInStatus, SignType, UserInfo, USER_TOKEN_PARAM,
};
