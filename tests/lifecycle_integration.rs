//! Integration tests for the credential lifecycle.
//!
//! These tests wire the real pieces together: the loopback redirect
//! listener, the redirect hub, the browser channel, the key chain and a
//! file secret store in a temporary directory. Only the browser is faked;
//! the fake plays the provider by sending the redirect over TCP.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::Url;
use tempfile::TempDir;

use docsauth::auth::{
    CredentialLifecycle, ErrorKind, KeyChain, LifecycleDeps, LifecycleOptions, SignType,
    StoredUser, USER_TOKEN_PARAM,
};
use docsauth::environment::{
    ContributorClass, Environment, EnvironmentController, EnvironmentSnapshot, RepoHostType,
};
use docsauth::events::{Event, EventBus, EventType, Subscription};
use docsauth::redirect::{
    BrowserRedirectChannel, Endpoints, RedirectError, RedirectListener, UriHandler, UrlOpener,
};
use docsauth::secrets::{FileSecretStore, SecretStore};

// =============================================================================
// Test Helpers
// =============================================================================

/// What the fake provider does when the sign-in page is opened.
#[derive(Clone, Copy)]
enum Provider {
    /// Redirect back with a complete identity.
    Approve,
    /// Never redirect.
    Silent,
    /// Refuse to open the page at all.
    Decline,
}

/// A browser that plays the provider.
struct FakeBrowser {
    provider: Provider,
    opened: Mutex<Vec<String>>,
    responses: Arc<Mutex<Vec<String>>>,
}

impl FakeBrowser {
    fn new(provider: Provider) -> Arc<Self> {
        Arc::new(Self {
            provider,
            opened: Mutex::new(Vec::new()),
            responses: Arc::new(Mutex::new(Vec::new())),
        })
    }

    fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

impl UrlOpener for FakeBrowser {
    fn open(&self, url: &str) -> Result<(), RedirectError> {
        self.opened.lock().unwrap().push(url.to_string());
        match self.provider {
            Provider::Decline => Err(RedirectError::Declined),
            Provider::Silent => Ok(()),
            Provider::Approve => {
                let callback = redirect_url(url);
                let responses = Arc::clone(&self.responses);
                std::thread::spawn(move || {
                    let status = http_get(&callback_with_claims(&callback, "octocat"));
                    responses.lock().unwrap().push(status);
                });
                Ok(())
            }
        }
    }
}

/// The `redirect_url` query parameter of a sign-in URL.
fn redirect_url(sign_in_url: &str) -> String {
    let url = Url::parse(sign_in_url).expect("sign-in url");
    url.query_pairs()
        .find(|(k, _)| k == "redirect_url")
        .map(|(_, v)| v.into_owned())
        .expect("redirect_url parameter")
}

/// The callback URL a provider would redirect to after approval.
fn callback_with_claims(callback: &str, name: &str) -> String {
    let mut url = Url::parse(callback).expect("callback url");
    url.query_pairs_mut()
        .append_pair("id", "1001")
        .append_pair("name", name)
        .append_pair("email", "octocat@example.test")
        .append_pair(USER_TOKEN_PARAM, "bearer-1001");
    url.into()
}

/// Send a GET and return the response status line.
fn http_get(url: &str) -> String {
    let url = Url::parse(url).expect("url");
    let host = url.host_str().expect("host");
    let port = url.port().expect("port");
    let target = match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    };

    let mut stream = TcpStream::connect((host, port)).expect("connect to listener");
    write!(
        stream,
        "GET {} HTTP/1.1\r\nHost: {}:{}\r\nConnection: close\r\n\r\n",
        target, host, port
    )
    .expect("write request");

    let mut response = String::new();
    stream.read_to_string(&mut response).expect("read response");
    response.lines().next().unwrap_or_default().to_string()
}

struct Harness {
    _dir: TempDir,
    secrets: Arc<FileSecretStore>,
    bus: EventBus,
    environment: Arc<EnvironmentController>,
    browser: Arc<FakeBrowser>,
    listener: RedirectListener,
    lifecycle: CredentialLifecycle,
}

impl Harness {
    async fn start(provider: Provider, host: RepoHostType, timeout: Duration) -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let secrets = Arc::new(FileSecretStore::with_path(dir.path().join("secrets.toml")));
        Self::start_with_store(dir, secrets, provider, host, timeout).await
    }

    async fn start_with_store(
        dir: TempDir,
        secrets: Arc<FileSecretStore>,
        provider: Provider,
        host: RepoHostType,
        timeout: Duration,
    ) -> Self {
        let bus = EventBus::new();
        let environment = Arc::new(EnvironmentController::new(
            EnvironmentSnapshot {
                env: Environment::Prod,
                contributor_class: ContributorClass::Internal,
                repo_host_type: host,
            },
            bus.clone(),
        ));

        let hub = UriHandler::new();
        let listener = RedirectListener::bind(0, hub.clone())
            .await
            .expect("bind listener");
        let browser = FakeBrowser::new(provider);
        let channel = BrowserRedirectChannel::new(
            hub,
            browser.clone(),
            Endpoints::default(),
            listener.callback_base(),
        );

        let lifecycle = CredentialLifecycle::spawn(
            LifecycleDeps {
                store: Arc::new(KeyChain::new(secrets.clone(), environment.clone())),
                context: environment.clone(),
                channel: Arc::new(channel),
                bus: bus.clone(),
            },
            LifecycleOptions {
                sign_in_timeout: timeout,
            },
        );

        Self {
            _dir: dir,
            secrets,
            bus,
            environment,
            browser,
            listener,
            lifecycle,
        }
    }
}

fn types(events: &mut Subscription) -> Vec<EventType> {
    events.drain().iter().map(Event::event_type).collect()
}

const GENEROUS: Duration = Duration::from_secs(10);
const SHORT: Duration = Duration::from_millis(200);

// =============================================================================
// Sign-in over the loopback listener
// =============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn github_sign_in_round_trips_through_listener_and_store() {
    let h = Harness::start(Provider::Approve, RepoHostType::GitHub, GENEROUS).await;
    let mut events = h.bus.subscribe();

    h.lifecycle.sign_in("e2e-github").await;

    let credential = h.lifecycle.credential();
    assert!(credential.is_signed_in());
    let user = credential.user_info().expect("user");
    assert_eq!(user.sign_type, SignType::GitHub);
    assert_eq!(user.user_name, "octocat");
    assert_eq!(user.user_token, "bearer-1001");

    assert_eq!(
        types(&mut events),
        vec![
            EventType::CredentialReset,
            EventType::UserSignInTriggered,
            EventType::UserSignInProgress,
            EventType::UserSignInSucceeded,
        ]
    );

    let opened = h.browser.opened();
    assert_eq!(opened.len(), 1);
    assert!(opened[0].starts_with("https://op-build-prod.azurewebsites.net/v2/users/github-login?"));
    assert!(redirect_url(&opened[0]).starts_with(&h.listener.callback_base()));

    let stored = h
        .secrets
        .get(&StoredUser::secret_key(Environment::Prod, SignType::GitHub))
        .expect("read store")
        .expect("credential cached");
    let record = StoredUser::parse(&stored).expect("valid record");
    assert_eq!(record.environment, Environment::Prod);
    assert_eq!(record.user.user_id, "1001");
}

#[tokio::test(flavor = "multi_thread")]
async fn browser_is_answered_after_delivery() {
    let h = Harness::start(Provider::Approve, RepoHostType::GitHub, GENEROUS).await;
    h.lifecycle.sign_in("answered").await;

    // The fake browser's request completes on its own thread.
    let deadline = tokio::time::Instant::now() + GENEROUS;
    loop {
        if let Some(status) = h.browser.responses.lock().unwrap().first().cloned() {
            assert!(status.contains("200"), "unexpected status: {}", status);
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "browser never answered");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn azure_devops_sign_in_uses_its_own_route_and_key() {
    let h = Harness::start(Provider::Approve, RepoHostType::AzureDevOps, GENEROUS).await;

    h.lifecycle.sign_in("e2e-ado").await;

    let user = h.lifecycle.credential().user_info().cloned().expect("signed in");
    assert_eq!(user.sign_type, SignType::AzureDevOps);

    let opened = h.browser.opened();
    assert!(opened[0].contains("/v2/users/azure-devops-login?"));
    assert!(redirect_url(&opened[0]).ends_with("/azure-devops-authenticate"));

    let key = StoredUser::secret_key(Environment::Prod, SignType::AzureDevOps);
    assert!(h.secrets.exists(&key).expect("read store"));
    assert!(!h
        .secrets
        .exists(&StoredUser::secret_key(Environment::Prod, SignType::GitHub))
        .expect("read store"));
}

#[tokio::test(flavor = "multi_thread")]
async fn cached_credential_survives_a_restart() {
    let dir = TempDir::new().expect("create temp dir");
    let path = dir.path().join("secrets.toml");

    let first = Harness::start_with_store(
        TempDir::new().expect("scratch dir"),
        Arc::new(FileSecretStore::with_path(&path)),
        Provider::Approve,
        RepoHostType::GitHub,
        GENEROUS,
    )
    .await;
    first.lifecycle.sign_in("first-run").await;
    assert!(first.lifecycle.credential().is_signed_in());
    drop(first);

    let second = Harness::start_with_store(
        dir,
        Arc::new(FileSecretStore::with_path(&path)),
        Provider::Silent,
        RepoHostType::GitHub,
        GENEROUS,
    )
    .await;
    let mut events = second.bus.subscribe();
    second.lifecycle.initialize("second-run").await;

    assert!(second.lifecycle.credential().is_signed_in());
    match events.drain().as_slice() {
        [Event::UserSignInSucceeded {
            from_cache,
            correlation_id,
            ..
        }] => {
            assert!(*from_cache);
            assert_eq!(correlation_id, "second-run");
        }
        other => panic!("unexpected events: {:?}", other),
    }
    assert!(second.browser.opened().is_empty());
}

// =============================================================================
// Failure paths
// =============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn timeout_signs_out_and_late_redirect_finds_nobody_waiting() {
    let h = Harness::start(Provider::Silent, RepoHostType::GitHub, SHORT).await;
    let mut events = h.bus.subscribe();

    h.lifecycle.sign_in("too-slow").await;
    assert!(!h.lifecycle.credential().is_signed_in());

    let failure = events
        .drain()
        .into_iter()
        .find_map(|event| match event {
            Event::UserSignInFailed { error, .. } => Some(error),
            _ => None,
        })
        .expect("sign-in failed event");
    assert_eq!(failure.kind(), ErrorKind::SignInTimedOut);
    assert_eq!(failure.to_string(), "Signing in with GitHub failed: Timed out");

    let callback = redirect_url(&h.browser.opened()[0]);
    let late = tokio::task::spawn_blocking(move || http_get(&callback_with_claims(&callback, "late")))
        .await
        .expect("late redirect");
    assert!(late.contains("404"), "unexpected status: {}", late);
    assert!(!h.lifecycle.credential().is_signed_in());
}

#[tokio::test(flavor = "multi_thread")]
async fn declined_browser_fails_without_waiting() {
    let h = Harness::start(Provider::Decline, RepoHostType::GitHub, GENEROUS).await;
    let mut events = h.bus.subscribe();

    let started = std::time::Instant::now();
    h.lifecycle.sign_in("declined").await;
    assert!(started.elapsed() < GENEROUS);

    let seen = events.drain();
    let failure = seen
        .iter()
        .find_map(|event| match event {
            Event::UserSignInFailed { error, .. } => Some(error.clone()),
            _ => None,
        })
        .expect("sign-in failed event");
    assert_eq!(failure.kind(), ErrorKind::ExternalUrlDeclined);
    assert!(failure.offers_retry());
    assert!(!h.lifecycle.credential().is_signed_in());
}

// =============================================================================
// Sign-out and environment changes
// =============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn sign_out_removes_the_stored_credential() {
    let h = Harness::start(Provider::Approve, RepoHostType::GitHub, GENEROUS).await;
    h.lifecycle.sign_in("before-sign-out").await;
    let key = StoredUser::secret_key(Environment::Prod, SignType::GitHub);
    assert!(h.secrets.exists(&key).expect("read store"));

    let mut events = h.bus.subscribe();
    h.lifecycle.sign_out("sign-out").await;

    assert!(!h.lifecycle.credential().is_signed_in());
    assert!(!h.secrets.exists(&key).expect("read store"));
    assert_eq!(
        types(&mut events),
        vec![
            EventType::UserSignOutTriggered,
            EventType::CredentialReset,
            EventType::UserSignOutSucceeded,
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn environment_switch_reloads_the_matching_credential() {
    let h = Harness::start(Provider::Approve, RepoHostType::GitHub, GENEROUS).await;
    let _forwarder = h.lifecycle.attach(&h.bus);
    h.lifecycle.sign_in("prod").await;
    assert!(h.lifecycle.credential().is_signed_in());

    let mut watch = h.lifecycle.watch_credential();

    assert!(h.environment.set_env(Environment::Ppe));
    tokio::time::timeout(GENEROUS, watch.wait_for(|c| !c.is_signed_in()))
        .await
        .expect("PPE has no cached credential")
        .expect("lifecycle running");

    assert!(h.environment.set_env(Environment::Prod));
    let credential = tokio::time::timeout(GENEROUS, watch.wait_for(|c| c.is_signed_in()))
        .await
        .expect("PROD credential reloaded")
        .expect("lifecycle running")
        .clone();
    assert_eq!(
        credential.user_info().map(|u| u.user_name.as_str()),
        Some("octocat")
    );
}
