//! redirect::hub
//!
//! Routes incoming redirect URIs to waiting subscriptions.
//!
//! Every live subscription on a route receives the next redirect for that
//! route, once. A redirect nobody is waiting for is dropped. Subscriptions
//! unregister themselves on drop, which is what keeps a timed-out sign-in
//! from swallowing a later redirect.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use reqwest::Url;
use tokio::sync::oneshot;

use super::{RedirectError, RedirectPayload, RedirectSubscription};

/// Base used to resolve bare request targets such as `/github-authenticate?id=1`.
const LOCAL_BASE: &str = "http://localhost";

struct Pending {
    route: String,
    tx: oneshot::Sender<RedirectPayload>,
}

#[derive(Default)]
struct Inner {
    next_id: AtomicU64,
    pending: Mutex<HashMap<u64, Pending>>,
}

/// Redirect hub. Cheap to clone; clones share state.
#[derive(Clone, Default)]
pub struct UriHandler {
    inner: Arc<Inner>,
}

impl UriHandler {
    pub fn new() -> Self {
        Self::default()
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<u64, Pending>> {
        self.inner
            .pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Wait for the next redirect on `route` (e.g. `/github-authenticate`).
    pub fn subscribe(&self, route: &str) -> RedirectSubscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending().insert(
            id,
            Pending {
                route: normalize_route(route),
                tx,
            },
        );
        tracing::debug!(id, route, "redirect subscription registered");
        RedirectSubscription::registered(rx, self.clone(), id)
    }

    pub(crate) fn unsubscribe(&self, id: u64) {
        if self.pending().remove(&id).is_some() {
            tracing::debug!(id, "redirect subscription detached");
        }
    }

    /// Number of subscriptions still waiting.
    pub fn pending_count(&self) -> usize {
        self.pending().len()
    }

    /// Deliver a redirect URI.
    ///
    /// Accepts absolute URIs and bare request targets. Returns how many
    /// subscriptions received it.
    pub fn handle_uri(&self, uri: &str) -> Result<usize, RedirectError> {
        let url = parse_uri(uri)?;
        let route = normalize_route(url.path());
        let params: HashMap<String, String> = url.query_pairs().into_owned().collect();
        let payload = RedirectPayload::new(route.clone(), params);

        let waiting: Vec<Pending> = {
            let mut pending = self.pending();
            let ids: Vec<u64> = pending
                .iter()
                .filter(|(_, p)| p.route == route)
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter()
                .filter_map(|id| pending.remove(&id))
                .collect()
        };

        let delivered = waiting
            .into_iter()
            .map(|p| p.tx.send(payload.clone()).is_ok())
            .filter(|sent| *sent)
            .count();

        if delivered == 0 {
            tracing::warn!(route = %route, "redirect dropped: no sign-in is waiting");
        } else {
            tracing::debug!(route = %route, delivered, "redirect delivered");
        }
        Ok(delivered)
    }
}

impl std::fmt::Debug for UriHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UriHandler")
            .field("pending", &self.pending_count())
            .finish()
    }
}

fn parse_uri(uri: &str) -> Result<Url, RedirectError> {
    let parsed = if uri.starts_with('/') {
        Url::parse(LOCAL_BASE).and_then(|base| base.join(uri))
    } else {
        Url::parse(uri)
    };
    parsed.map_err(|e| RedirectError::InvalidUri(format!("{}: {}", uri, e)))
}

fn normalize_route(route: &str) -> String {
    let trimmed = route.trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GITHUB_CALLBACK: &str = "/github-authenticate?id=faked-github-id&name=Fake-User-GitHub&email=fake-github%40example.com&X-OP-BuildUserToken=fake-github-token";

    #[tokio::test]
    async fn delivers_decoded_query_to_subscriber() {
        let hub = UriHandler::new();
        let mut sub = hub.subscribe("/github-authenticate");

        assert_eq!(hub.handle_uri(GITHUB_CALLBACK).expect("valid uri"), 1);

        let payload = sub.recv().await.expect("payload");
        assert_eq!(payload.route(), "/github-authenticate");
        assert_eq!(payload.get("id"), Some("faked-github-id"));
        assert_eq!(payload.get("email"), Some("fake-github@example.com"));
        assert_eq!(hub.pending_count(), 0);
    }

    #[test]
    fn other_routes_are_not_delivered() {
        let hub = UriHandler::new();
        let _sub = hub.subscribe("/azure-devops-authenticate");

        assert_eq!(hub.handle_uri(GITHUB_CALLBACK).expect("valid uri"), 0);
        assert_eq!(hub.pending_count(), 1);
    }

    #[test]
    fn dropping_subscription_unregisters() {
        let hub = UriHandler::new();
        let sub = hub.subscribe("/github-authenticate");
        assert_eq!(hub.pending_count(), 1);

        drop(sub);
        assert_eq!(hub.pending_count(), 0);
        assert_eq!(hub.handle_uri(GITHUB_CALLBACK).expect("valid uri"), 0);
    }

    #[tokio::test]
    async fn every_waiting_subscription_receives_once() {
        let hub = UriHandler::new();
        let mut first = hub.subscribe("/github-authenticate");
        let mut second = hub.subscribe("github-authenticate/");

        assert_eq!(hub.handle_uri(GITHUB_CALLBACK).expect("valid uri"), 2);
        assert!(first.recv().await.is_ok());
        assert!(second.recv().await.is_ok());

        // One-shot: a second redirect finds nobody waiting.
        assert_eq!(hub.handle_uri(GITHUB_CALLBACK).expect("valid uri"), 0);
    }

    #[test]
    fn absolute_uris_are_accepted() {
        let hub = UriHandler::new();
        let _sub = hub.subscribe("/azure-devops-authenticate");
        let delivered = hub
            .handle_uri("http://127.0.0.1:4000/azure-devops-authenticate?id=1")
            .expect("valid uri");
        assert_eq!(delivered, 1);
    }

    #[test]
    fn garbage_is_rejected() {
        let hub = UriHandler::new();
        assert!(matches!(
            hub.handle_uri("not a uri"),
            Err(RedirectError::InvalidUri(_))
        ));
    }
}
