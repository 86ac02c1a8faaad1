//! cli::session
//!
//! Wires the credential lifecycle together from configuration.
//!
//! A session owns one event bus, the environment controller, the key chain
//! over the configured secret store and, for sign-in, a loopback redirect
//! listener. Dropping the session stops the lifecycle, the bus forwarder and
//! the listener.

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use tokio::task::JoinHandle;

use crate::auth::{CredentialLifecycle, KeyChain, LifecycleDeps};
use crate::core::config::Config;
use crate::environment::EnvironmentController;
use crate::events::{Event, EventBus, Subscription};
use crate::redirect::{BrowserRedirectChannel, RedirectListener, SystemBrowser, UriHandler, UrlOpener};
use crate::secrets::{self, SecretStore};
use crate::ui::output::{self, Verbosity};

pub struct Session {
    pub bus: EventBus,
    pub environment: Arc<EnvironmentController>,
    pub lifecycle: CredentialLifecycle,
    listener: Option<RedirectListener>,
    forwarder: JoinHandle<()>,
}

impl Session {
    /// Build a session that never opens a browser.
    pub async fn offline(config: &Config) -> Result<Self> {
        Self::build(config, None).await
    }

    /// Build a session able to sign in, with redirects answered on a
    /// loopback listener and sign-in pages shown by `opener`.
    pub async fn interactive(config: &Config, opener: Arc<dyn UrlOpener>) -> Result<Self> {
        Self::build(config, Some(opener)).await
    }

    async fn build(config: &Config, opener: Option<Arc<dyn UrlOpener>>) -> Result<Self> {
        let bus = EventBus::new();
        let environment = Arc::new(EnvironmentController::new(
            config.environment_snapshot(),
            bus.clone(),
        ));

        let secrets: Arc<dyn SecretStore> = Arc::from(
            secrets::create_store(config.secrets_provider())
                .context("Failed to initialize secret store")?,
        );
        let store = Arc::new(KeyChain::new(secrets, environment.clone()));

        let hub = UriHandler::new();
        let (listener, callback_base, opener) = match opener {
            Some(opener) => {
                let listener = RedirectListener::bind(config.redirect_port(), hub.clone())
                    .await
                    .context("Failed to start the sign-in redirect listener")?;
                let callback_base = listener.callback_base();
                (Some(listener), callback_base, opener)
            }
            None => (
                None,
                format!("http://127.0.0.1:{}", config.redirect_port()),
                Arc::new(SystemBrowser) as Arc<dyn UrlOpener>,
            ),
        };
        let channel = Arc::new(BrowserRedirectChannel::new(
            hub,
            opener,
            config.endpoints(),
            callback_base,
        ));

        let lifecycle = CredentialLifecycle::spawn(
            LifecycleDeps {
                store,
                context: environment.clone(),
                channel,
                bus: bus.clone(),
            },
            config.lifecycle_options(),
        );
        let forwarder = lifecycle.attach(&bus);

        tracing::debug!(
            env = %config.environment(),
            provider = config.secrets_provider(),
            listener = listener.is_some(),
            "session started"
        );

        Ok(Self {
            bus,
            environment,
            lifecycle,
            listener,
            forwarder,
        })
    }

    /// Address of the redirect listener, if this session has one.
    pub fn redirect_base(&self) -> Option<String> {
        self.listener.as_ref().map(RedirectListener::callback_base)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.forwarder.abort();
    }
}

/// Run `operation` while showing the events it publishes.
///
/// Events are shown as they arrive, so progress is visible while a sign-in
/// waits on the browser. Returns every event seen, in order.
pub async fn drive<F>(operation: F, events: &mut Subscription, verbosity: Verbosity) -> Vec<Event>
where
    F: Future<Output = ()>,
{
    let mut seen = Vec::new();
    tokio::pin!(operation);

    loop {
        tokio::select! {
            _ = &mut operation => break,
            Some(event) = events.recv() => {
                output::show_event(&event, verbosity);
                seen.push(event);
            }
        }
    }

    // The lifecycle publishes before acknowledging, so whatever the
    // operation produced is already queued.
    for event in events.drain() {
        output::show_event(&event, verbosity);
        seen.push(event);
    }
    seen
}
