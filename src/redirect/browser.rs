//! redirect::browser
//!
//! Production [`RedirectChannel`]: registers on the [`UriHandler`], then
//! opens the provider's sign-in page in the system browser.

use std::sync::Arc;

use reqwest::Url;

use super::{RedirectChannel, RedirectError, RedirectSubscription, UriHandler};
use crate::auth::SignType;
use crate::environment::Environment;

/// Documentation build service endpoint for PROD.
pub const DEFAULT_PROD_ENDPOINT: &str = "https://op-build-prod.azurewebsites.net";

/// Documentation build service endpoint for PPE.
pub const DEFAULT_PPE_ENDPOINT: &str = "https://op-build-sandbox2.azurewebsites.net";

/// Build service endpoints per environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub prod: String,
    pub ppe: String,
}

impl Endpoints {
    pub fn for_env(&self, env: Environment) -> &str {
        match env {
            Environment::Prod => &self.prod,
            Environment::Ppe => &self.ppe,
        }
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            prod: DEFAULT_PROD_ENDPOINT.to_string(),
            ppe: DEFAULT_PPE_ENDPOINT.to_string(),
        }
    }
}

/// Something that can show a URL to the user.
pub trait UrlOpener: Send + Sync {
    /// Open `url`. An error means the user will not see the page.
    fn open(&self, url: &str) -> Result<(), RedirectError>;
}

/// Opens URLs with the platform's default browser.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBrowser;

impl UrlOpener for SystemBrowser {
    fn open(&self, url: &str) -> Result<(), RedirectError> {
        open::that(url).map_err(|e| {
            tracing::warn!(error = %e, "could not open browser");
            RedirectError::Declined
        })
    }
}

/// Sign-in through the system browser with redirects delivered by a hub.
pub struct BrowserRedirectChannel {
    hub: UriHandler,
    opener: Arc<dyn UrlOpener>,
    endpoints: Endpoints,
    callback_base: String,
}

impl BrowserRedirectChannel {
    /// Create a channel.
    ///
    /// `callback_base` is the origin the provider redirects back to, e.g.
    /// the address of a [`RedirectListener`](super::RedirectListener).
    pub fn new(
        hub: UriHandler,
        opener: Arc<dyn UrlOpener>,
        endpoints: Endpoints,
        callback_base: impl Into<String>,
    ) -> Self {
        Self {
            hub,
            opener,
            endpoints,
            callback_base: callback_base.into(),
        }
    }

    /// The URL the browser is sent to for `provider` in `env`.
    pub fn sign_in_url(&self, provider: SignType, env: Environment) -> Result<String, RedirectError> {
        let endpoint = self.endpoints.for_env(env).trim_end_matches('/');
        let mut url = Url::parse(&format!("{}/{}", endpoint, provider.login_path()))
            .map_err(|e| RedirectError::InvalidUri(format!("{}: {}", endpoint, e)))?;

        let callback = format!(
            "{}{}",
            self.callback_base.trim_end_matches('/'),
            provider.callback_path()
        );
        url.query_pairs_mut().append_pair("redirect_url", &callback);
        Ok(url.into())
    }
}

#[async_trait::async_trait]
impl RedirectChannel for BrowserRedirectChannel {
    async fn launch(
        &self,
        provider: SignType,
        env: Environment,
    ) -> Result<RedirectSubscription, RedirectError> {
        let url = self.sign_in_url(provider, env)?;
        let subscription = self.hub.subscribe(provider.callback_path());

        tracing::info!(provider = %provider, env = %env, "opening sign-in page");
        let opener = Arc::clone(&self.opener);
        tokio::task::spawn_blocking(move || opener.open(&url))
            .await
            .map_err(|e| RedirectError::Launch(e.to_string()))??;

        Ok(subscription)
    }
}

impl std::fmt::Debug for BrowserRedirectChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserRedirectChannel")
            .field("endpoints", &self.endpoints)
            .field("callback_base", &self.callback_base)
            .finish_non_exhaustive()
    }
}
