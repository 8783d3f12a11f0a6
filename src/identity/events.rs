//! Session-change notification stream.
//!
//! Publish-subscribe over a tokio broadcast channel with an explicit
//! subscription handle: delivery to a subscriber stops the moment its
//! handle is unsubscribed or dropped, so a torn-down guard can never be
//! called back.

use tokio::sync::broadcast;
use tracing::debug;

use super::Identity;

const EVENT_CAPACITY: usize = 16;

/// A session transition observed at the identity service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn(Identity),
    SignedOut,
}

/// Fan-out point for session transitions.
#[derive(Clone, Debug)]
pub struct SessionEvents {
    tx: broadcast::Sender<SessionEvent>,
}

impl SessionEvents {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
        }
    }

    /// Publish an event to all live subscribers. A send with no subscribers
    /// is fine; sign-out must not depend on anyone listening.
    pub fn publish(&self, event: SessionEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new()
    }
}

/// Live subscription to session transitions.
pub struct Subscription {
    rx: broadcast::Receiver<SessionEvent>,
}

impl Subscription {
    /// Wait for the next event. Returns `None` once the publisher side is
    /// gone. A lagged receiver skips ahead rather than erroring; dropped
    /// events only ever make the observed state less fresh, and the guard
    /// treats staleness as grounds for denial anyway.
    pub async fn next(&mut self) -> Option<SessionEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("Session event subscriber lagged, skipped {skipped} events");
                }
            }
        }
    }

    /// Tear down the subscription. Dropping the handle is equivalent; this
    /// exists so call sites can make the cessation point explicit.
    pub fn unsubscribe(self) {
        drop(self);
    }
}
