//! events
//!
//! Typed publish/subscribe bus for lifecycle events.
//!
//! # Design
//!
//! The bus is a thin wrapper over a tokio broadcast channel. Publishing is
//! fire-and-forget: an event reaches every subscription alive at the moment
//! of publishing and nobody else. There is no replay, so a caller that needs
//! to observe an operation must [`subscribe`](EventBus::subscribe) before
//! starting it. Dropping a [`Subscription`] unsubscribes.
//!
//! A subscriber that falls more than the channel capacity behind skips the
//! events it missed; [`Subscription::recv`] logs how many were lost and
//! carries on with the oldest retained event.
//!
//! # Example
//!
//! ```
//! use docsauth::events::{Event, EventBus, EventType};
//!
//! let bus = EventBus::new();
//! let mut sub = bus.subscribe();
//!
//! bus.publish(Event::CredentialExpired { during_live_session: false });
//!
//! let seen: Vec<EventType> = sub.drain().iter().map(Event::event_type).collect();
//! assert_eq!(seen, vec![EventType::CredentialExpired]);
//! ```

mod types;

pub use types::{BuildResult, Event, EventType, ValidationError, ValidationErrorCode};

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

/// Default number of events buffered per subscriber.
pub const DEFAULT_CAPACITY: usize = 256;

/// Multi-subscriber broadcast of [`Event`]s. Cheap to clone.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish to every current subscriber.
    ///
    /// Returns the number of subscribers that will see the event; zero is
    /// not an error.
    pub fn publish(&self, event: Event) -> usize {
        tracing::trace!(event = ?event.event_type(), "publish");
        self.tx.send(event).unwrap_or(0)
    }

    /// Start receiving events published from now on.
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// A live subscription to an [`EventBus`].
#[derive(Debug)]
pub struct Subscription {
    rx: broadcast::Receiver<Event>,
}

impl Subscription {
    /// Wait for the next event. Returns `None` once every bus handle is gone.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event subscriber lagged");
                    continue;
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Take the next already-published event without waiting.
    pub fn try_recv(&mut self) -> Option<Event> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event subscriber lagged");
                    continue;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    /// Take every already-published event.
    pub fn drain(&mut self) -> Vec<Event> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    /// Stop receiving. Equivalent to dropping the subscription.
    pub fn unsubscribe(self) {}
}
