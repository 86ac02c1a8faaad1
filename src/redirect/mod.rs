//! redirect
//!
//! The external, user-interactive half of sign-in.
//!
//! # Architecture
//!
//! - [`RedirectChannel`] - the seam the credential lifecycle drives: open
//!   the provider's sign-in page and hand back a [`RedirectSubscription`]
//!   that resolves with the redirect's claims.
//! - [`UriHandler`] - hub that routes incoming redirect URIs to the
//!   subscriptions waiting on that route.
//! - [`BrowserRedirectChannel`] - production channel: subscribes on the hub,
//!   then opens the system browser.
//! - [`RedirectListener`] - loopback HTTP listener that feeds the hub.
//!
//! # Cancellation
//!
//! A subscription unregisters from its hub when dropped. A sign-in attempt
//! that times out drops its subscription, so a redirect arriving later can
//! never be delivered into some other, unrelated attempt.

mod browser;
mod hub;
mod listener;

pub use browser::{BrowserRedirectChannel, Endpoints, SystemBrowser, UrlOpener};
pub use hub::UriHandler;
pub use listener::RedirectListener;

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;
use tokio::sync::oneshot;

use crate::auth::SignType;
use crate::environment::Environment;

/// Errors from the redirect channel.
#[derive(Debug, Error)]
pub enum RedirectError {
    /// The browser could not be opened (or the user refused).
    #[error("external URL was not opened")]
    Declined,

    /// Opening the browser failed for a reason other than refusal.
    #[error("failed to open browser: {0}")]
    Launch(String),

    /// The hub went away before a redirect arrived.
    #[error("redirect channel closed before a redirect arrived")]
    Closed,

    /// A redirect or sign-in URI could not be parsed.
    #[error("invalid redirect URI: {0}")]
    InvalidUri(String),

    /// The loopback listener failed.
    #[error("redirect listener error: {0}")]
    Listener(String),
}

/// Raw claims carried by a redirect: its route plus decoded query pairs.
#[derive(Clone, PartialEq, Eq)]
pub struct RedirectPayload {
    route: String,
    params: HashMap<String, String>,
}

impl RedirectPayload {
    pub fn new(route: impl Into<String>, params: HashMap<String, String>) -> Self {
        Self {
            route: route.into(),
            params,
        }
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

// Query values include the bearer token; only show which keys are present.
impl fmt::Debug for RedirectPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&str> = self.params.keys().map(String::as_str).collect();
        keys.sort_unstable();
        f.debug_struct("RedirectPayload")
            .field("route", &self.route)
            .field("keys", &keys)
            .finish()
    }
}

/// A pending wait for exactly one redirect.
///
/// Dropping the subscription detaches it from its hub.
#[derive(Debug)]
pub struct RedirectSubscription {
    rx: oneshot::Receiver<RedirectPayload>,
    registration: Option<(UriHandler, u64)>,
}

impl RedirectSubscription {
    /// A subscription fed directly through the returned sender, not via a
    /// hub. Used by custom channels.
    pub fn pair() -> (oneshot::Sender<RedirectPayload>, Self) {
        let (tx, rx) = oneshot::channel();
        (
            tx,
            Self {
                rx,
                registration: None,
            },
        )
    }

    pub(crate) fn registered(
        rx: oneshot::Receiver<RedirectPayload>,
        hub: UriHandler,
        id: u64,
    ) -> Self {
        Self {
            rx,
            registration: Some((hub, id)),
        }
    }

    /// Wait for the redirect.
    ///
    /// Fails with [`RedirectError::Closed`] if the sending side is gone.
    pub async fn recv(&mut self) -> Result<RedirectPayload, RedirectError> {
        (&mut self.rx).await.map_err(|_| RedirectError::Closed)
    }
}

impl Drop for RedirectSubscription {
    fn drop(&mut self) {
        if let Some((hub, id)) = self.registration.take() {
            hub.unsubscribe(id);
        }
    }
}

/// Opens a provider's sign-in page and waits for its redirect.
#[async_trait::async_trait]
pub trait RedirectChannel: Send + Sync {
    /// Start a sign-in with `provider` against `env`.
    ///
    /// The returned subscription is registered before the browser opens, so
    /// a fast redirect cannot be missed.
    ///
    /// # Errors
    ///
    /// - [`RedirectError::Declined`] if the browser could not be opened
    /// - any other variant for launch failures
    async fn launch(
        &self,
        provider: SignType,
        env: Environment,
    ) -> Result<RedirectSubscription, RedirectError>;
}
