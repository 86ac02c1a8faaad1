//! auth::lifecycle
//!
//! The credential lifecycle state machine.
//!
//! # Design
//!
//! [`CredentialLifecycle`] is a cheap, cloneable handle to a single task
//! that owns the [`Credential`], the pending [`SignInReason`] and the
//! sign-in attempt counter. Every operation is a command sent to that task,
//! so state writes and their events are applied one at a time and always
//! in the same order.
//!
//! Reads do not go through the task: the current credential is mirrored
//! into a `watch` channel and [`CredentialLifecycle::credential`] just
//! clones the latest value.
//!
//! # Concurrent sign-ins
//!
//! A sign-in attempt waits for its redirect outside the owning task, so the
//! task keeps serving commands while attempts are in flight. Attempts
//! overlap freely: each is timed and correlated on its own, and they are
//! applied in the order they resolve. The attempt that resolves last
//! decides the final state (last writer wins).
//!
//! # Timeouts
//!
//! The redirect wait is raced against [`LifecycleOptions::sign_in_timeout`].
//! A timed-out attempt drops its [`RedirectSubscription`], which detaches it
//! from the redirect hub; a redirect arriving afterwards is not delivered
//! to it and is never persisted.
//!
//! # Events
//!
//! Outcomes are only reported on the [`EventBus`]. The operation methods
//! return once every event of the operation has been published, so a
//! caller that subscribed beforehand can drain them synchronously.
//!
//! ```text
//! sign_in  (success) : CredentialReset, UserSignInTriggered, UserSignInProgress, UserSignInSucceeded
//! sign_in  (failure) : CredentialReset, UserSignInTriggered, UserSignInProgress, CredentialReset, UserSignInFailed
//! sign_in  (public)  : PublicContributorSignIn
//! sign_out           : UserSignOutTriggered, CredentialReset, UserSignOutSucceeded | UserSignOutFailed
//! initialize         : UserSignInSucceeded (from cache) | CredentialReset
//! ```
//!
//! [`RedirectSubscription`]: crate::redirect::RedirectSubscription

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinHandle, JoinSet};
use uuid::Uuid;

use super::errors::AuthError;
use super::keychain::UserInfoStore;
use super::user_info::{Credential, SignInReason, SignType, UserInfo};
use crate::environment::{ContributorClass, Environment, EnvironmentContext};
use crate::events::{Event, EventBus};
use crate::redirect::RedirectChannel;

/// Default time allowed for the browser redirect to arrive.
pub const DEFAULT_SIGN_IN_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Provider-independent tag carried by `UserSignInProgress`.
pub const SIGN_IN_PROGRESS_TAG: &str = "Sign-in";

/// Tunables for the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleOptions {
    pub sign_in_timeout: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            sign_in_timeout: DEFAULT_SIGN_IN_TIMEOUT,
        }
    }
}

/// Collaborators the lifecycle is built from.
#[derive(Clone)]
pub struct LifecycleDeps {
    pub store: Arc<dyn UserInfoStore>,
    pub context: Arc<dyn EnvironmentContext>,
    pub channel: Arc<dyn RedirectChannel>,
    pub bus: EventBus,
}

enum Command {
    Initialize {
        correlation_id: String,
        done: oneshot::Sender<()>,
    },
    SignIn {
        correlation_id: String,
        done: oneshot::Sender<()>,
    },
    SignOut {
        correlation_id: String,
        done: oneshot::Sender<()>,
    },
    Handle {
        event: Event,
        done: oneshot::Sender<()>,
    },
    PendingReason {
        reply: oneshot::Sender<Option<SignInReason>>,
    },
}

/// Handle to the credential lifecycle. Clones share the same state.
#[derive(Clone)]
pub struct CredentialLifecycle {
    commands: mpsc::UnboundedSender<Command>,
    credential: watch::Receiver<Credential>,
}

impl CredentialLifecycle {
    /// Start the lifecycle task. Must be called inside a tokio runtime.
    ///
    /// The task stops once every handle is dropped.
    pub fn spawn(deps: LifecycleDeps, options: LifecycleOptions) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let (state, credential) = watch::channel(Credential::signed_out());

        let owner = Owner {
            deps,
            options,
            state,
            reason: None,
            next_attempt: 0,
        };
        tokio::spawn(owner.run(rx));

        Self {
            commands,
            credential,
        }
    }

    /// Current credential.
    pub fn credential(&self) -> Credential {
        self.credential.borrow().clone()
    }

    /// Receiver that observes every credential change.
    pub fn watch_credential(&self) -> watch::Receiver<Credential> {
        self.credential.clone()
    }

    /// Load the cached credential for the current environment.
    pub async fn initialize(&self, correlation_id: impl Into<String>) {
        let correlation_id = correlation_id.into();
        self.call(|done| Command::Initialize {
            correlation_id,
            done,
        })
        .await;
    }

    /// Sign in through the browser redirect of the current repository host.
    ///
    /// Returns once the attempt has succeeded, failed or timed out.
    pub async fn sign_in(&self, correlation_id: impl Into<String>) {
        let correlation_id = correlation_id.into();
        self.call(|done| Command::SignIn {
            correlation_id,
            done,
        })
        .await;
    }

    /// Forget the credential, both in memory and in the store.
    pub async fn sign_out(&self, correlation_id: impl Into<String>) {
        let correlation_id = correlation_id.into();
        self.call(|done| Command::SignOut {
            correlation_id,
            done,
        })
        .await;
    }

    /// React to an event produced elsewhere.
    ///
    /// Handles `EnvironmentChanged`, `CredentialExpired`, `BuildFailed` and
    /// `StartLanguageServerCompleted`; everything else is ignored.
    pub async fn handle_event(&self, event: Event) {
        self.call(|done| Command::Handle { event, done }).await;
    }

    /// Reason that will be attached to the next sign-in, if any.
    pub async fn pending_sign_in_reason(&self) -> Option<SignInReason> {
        let (reply, rx) = oneshot::channel();
        if self.commands.send(Command::PendingReason { reply }).is_err() {
            return None;
        }
        rx.await.ok().flatten()
    }

    /// Forward externally produced events from `bus` into the lifecycle.
    ///
    /// The forwarder stops when the bus closes or every lifecycle handle is
    /// gone; it does not keep the lifecycle alive on its own.
    pub fn attach(&self, bus: &EventBus) -> JoinHandle<()> {
        let mut subscription = bus.subscribe();
        let commands = self.commands.downgrade();

        tokio::spawn(async move {
            while let Some(event) = subscription.recv().await {
                if !is_external_signal(&event) {
                    continue;
                }
                let Some(commands) = commands.upgrade() else {
                    break;
                };
                let (done, rx) = oneshot::channel();
                if commands.send(Command::Handle { event, done }).is_err() {
                    break;
                }
                drop(commands);
                let _ = rx.await;
            }
            tracing::debug!("lifecycle event forwarder stopped");
        })
    }

    async fn call(&self, command: impl FnOnce(oneshot::Sender<()>) -> Command) {
        let (done, rx) = oneshot::channel();
        if self.commands.send(command(done)).is_err() {
            tracing::error!("credential lifecycle is not running");
            return;
        }
        if rx.await.is_err() {
            tracing::error!("credential lifecycle dropped an operation");
        }
    }
}

impl std::fmt::Debug for CredentialLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialLifecycle")
            .field("credential", &*self.credential.borrow())
            .finish()
    }
}

fn is_external_signal(event: &Event) -> bool {
    matches!(
        event,
        Event::EnvironmentChanged { .. }
            | Event::CredentialExpired { .. }
            | Event::BuildCompleted { .. }
            | Event::BuildFailed { .. }
            | Event::StartLanguageServerCompleted { .. }
    )
}

/// Result of one sign-in attempt, handed back to the owning task.
struct Resolution {
    attempt: u64,
    correlation_id: String,
    provider: SignType,
    outcome: Result<UserInfo, AuthError>,
    done: oneshot::Sender<()>,
}

/// The task that owns the credential.
struct Owner {
    deps: LifecycleDeps,
    options: LifecycleOptions,
    state: watch::Sender<Credential>,
    reason: Option<SignInReason>,
    next_attempt: u64,
}

impl Owner {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        let mut attempts: JoinSet<Resolution> = JoinSet::new();

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.dispatch(command, &mut attempts).await,
                    None => break,
                },
                Some(joined) = attempts.join_next(), if !attempts.is_empty() => match joined {
                    Ok(resolution) => self.finish_sign_in(resolution).await,
                    Err(e) => tracing::error!(error = %e, "sign-in attempt task failed"),
                },
            }
        }
        tracing::debug!(in_flight = attempts.len(), "credential lifecycle stopped");
    }

    async fn dispatch(&mut self, command: Command, attempts: &mut JoinSet<Resolution>) {
        match command {
            Command::Initialize {
                correlation_id,
                done,
            } => {
                self.initialize(correlation_id).await;
                let _ = done.send(());
            }
            Command::SignIn {
                correlation_id,
                done,
            } => self.start_sign_in(correlation_id, done, attempts).await,
            Command::SignOut {
                correlation_id,
                done,
            } => {
                self.sign_out(correlation_id).await;
                let _ = done.send(());
            }
            Command::Handle { event, done } => {
                self.handle_event(event).await;
                let _ = done.send(());
            }
            Command::PendingReason { reply } => {
                let _ = reply.send(self.reason);
            }
        }
    }

    fn is_internal(&self) -> bool {
        self.deps.context.contributor_class() == ContributorClass::Internal
    }

    fn publish(&self, event: Event) {
        self.deps.bus.publish(event);
    }

    /// Move to `SignedOut` and announce it.
    fn reset(&mut self) {
        self.state.send_replace(Credential::signed_out());
        self.publish(Event::CredentialReset);
    }

    /// Reset, also dropping whatever the store holds. Store failures are
    /// logged; the in-memory reset always happens.
    async fn discard(&mut self) {
        if let Err(e) = self.deps.store.clear().await {
            tracing::warn!(error = %e, "failed to clear stored credential");
        }
        self.reset();
    }

    async fn initialize(&mut self, correlation_id: String) {
        if !self.is_internal() {
            tracing::debug!(%correlation_id, "public contributor; not loading credential");
            self.reset();
            return;
        }

        match self.deps.store.load().await {
            Ok(Some(user)) => {
                tracing::info!(%correlation_id, provider = %user.sign_type, "signed in from cache");
                let credential = Credential::signed_in(user);
                self.state.send_replace(credential.clone());
                self.publish(Event::UserSignInSucceeded {
                    correlation_id,
                    credential,
                    from_cache: true,
                    sign_in_reason: None,
                });
            }
            Ok(None) => {
                tracing::debug!(%correlation_id, "no cached credential");
                self.discard().await;
            }
            Err(e) => {
                tracing::warn!(%correlation_id, error = %e, "could not load cached credential");
                self.discard().await;
            }
        }
    }

    async fn start_sign_in(
        &mut self,
        correlation_id: String,
        done: oneshot::Sender<()>,
        attempts: &mut JoinSet<Resolution>,
    ) {
        if !self.is_internal() {
            tracing::info!(%correlation_id, "sign-in requested by public contributor");
            self.publish(Event::PublicContributorSignIn);
            let _ = done.send(());
            return;
        }

        self.discard().await;
        self.publish(Event::UserSignInTriggered {
            correlation_id: correlation_id.clone(),
        });

        let provider = SignType::from(self.deps.context.repo_host_type());
        self.publish(Event::UserSignInProgress {
            message: provider.progress_message(),
            tag: SIGN_IN_PROGRESS_TAG.to_string(),
        });

        let attempt = self.next_attempt;
        self.next_attempt += 1;
        tracing::info!(%correlation_id, attempt, %provider, in_flight = attempts.len(), "sign-in started");

        let channel = Arc::clone(&self.deps.channel);
        let env = self.deps.context.env();
        let timeout = self.options.sign_in_timeout;
        attempts.spawn(async move {
            let outcome = await_redirect(channel.as_ref(), provider, env, timeout).await;
            Resolution {
                attempt,
                correlation_id,
                provider,
                outcome,
                done,
            }
        });
    }

    async fn finish_sign_in(&mut self, resolution: Resolution) {
        let Resolution {
            attempt,
            correlation_id,
            provider,
            outcome,
            done,
        } = resolution;

        let outcome = match outcome {
            Ok(user) => self.deps.store.save(user.clone()).await.map(|()| user),
            Err(e) => Err(e),
        };
        let sign_in_reason = self.reason.take();

        match outcome {
            Ok(user) => {
                tracing::info!(%correlation_id, attempt, %provider, reason = ?sign_in_reason, "sign-in succeeded");
                let credential = Credential::signed_in(user);
                self.state.send_replace(credential.clone());
                self.publish(Event::UserSignInSucceeded {
                    correlation_id,
                    credential,
                    from_cache: false,
                    sign_in_reason,
                });
            }
            Err(error) => {
                tracing::warn!(%correlation_id, attempt, %provider, code = ?error.code(), error = %error, "sign-in failed");
                self.discard().await;
                self.publish(Event::UserSignInFailed {
                    correlation_id,
                    error: Arc::new(error),
                });
            }
        }
        let _ = done.send(());
    }

    async fn sign_out(&mut self, correlation_id: String) {
        self.publish(Event::UserSignOutTriggered {
            correlation_id: correlation_id.clone(),
        });

        let cleared = self.deps.store.clear().await;
        self.reset();

        match cleared {
            Ok(()) => {
                tracing::info!(%correlation_id, "signed out");
                self.publish(Event::UserSignOutSucceeded { correlation_id });
            }
            Err(error) => {
                tracing::warn!(%correlation_id, error = %error, "sign-out could not clear the store");
                self.publish(Event::UserSignOutFailed {
                    correlation_id,
                    error: Arc::new(error),
                });
            }
        }
    }

    async fn handle_event(&mut self, event: Event) {
        match event {
            Event::EnvironmentChanged { env } => {
                let correlation_id = Uuid::new_v4().to_string();
                tracing::debug!(%env, %correlation_id, "environment changed; reloading credential");
                self.initialize(correlation_id).await;
            }
            Event::CredentialExpired {
                during_live_session,
            } => {
                tracing::info!(during_live_session, "credential expired");
                self.discard().await;
                if during_live_session {
                    self.reason = Some(SignInReason::RealTimeValidation);
                }
            }
            Event::BuildFailed { error, .. } if error.code.is_credential_related() => {
                tracing::debug!(code = ?error.code, "build failure attributed to sign-in");
                self.reason = Some(SignInReason::FullRepoValidation);
            }
            Event::StartLanguageServerCompleted {
                succeeded: false,
                error: Some(error),
            } if error.code.is_credential_related() => {
                tracing::debug!(code = ?error.code, "language server failure attributed to sign-in");
                self.reason = Some(SignInReason::RealTimeValidation);
            }
            _ => {}
        }
    }
}

/// Open the sign-in page and wait for the redirect, up to `timeout`.
async fn await_redirect(
    channel: &dyn RedirectChannel,
    provider: SignType,
    env: Environment,
    timeout: Duration,
) -> Result<UserInfo, AuthError> {
    let mut subscription = channel
        .launch(provider, env)
        .await
        .map_err(|e| AuthError::from_redirect(provider, e))?;

    let payload = match tokio::time::timeout(timeout, subscription.recv()).await {
        Ok(received) => received.map_err(|e| AuthError::from_redirect(provider, e))?,
        Err(_) => return Err(AuthError::timed_out(provider)),
    };

    UserInfo::from_redirect(provider, &payload)
}
