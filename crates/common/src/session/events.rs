use std::collections::BTreeMap;
use std::sync::Weak;

use parking_lot::Mutex;

use crate::crypto::PublicKey;

/// Auth-state events emitted by [`KeySession`](super::KeySession)
///
/// Delivered synchronously, in order, to every live subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A member unlocked their identity; the session now holds the key
    /// handle for them.
    SessionEstablished(PublicKey),
    /// The session dropped the key handle (explicit lock or sign-out).
    SessionEnded,
}

pub(super) type SubscriberFn = Box<dyn Fn(&SessionEvent) + Send + Sync>;
pub(super) type SubscriberMap = Mutex<BTreeMap<u64, SubscriberFn>>;

/// Cancellation handle for a session-event subscription
///
/// Returned by [`KeySession::subscribe`](super::KeySession::subscribe).
/// Dropping the handle does *not* cancel the subscription; call
/// [`cancel`](SessionSubscription::cancel) to stop receiving events.
#[derive(Debug)]
pub struct SessionSubscription {
    id: u64,
    subscribers: Weak<SubscriberMap>,
}

impl SessionSubscription {
    pub(super) fn new(id: u64, subscribers: Weak<SubscriberMap>) -> Self {
        Self { id, subscribers }
    }

    /// Stop receiving events. Safe to call after the session is gone.
    pub fn cancel(self) {
        if let Some(subscribers) = self.subscribers.upgrade() {
            subscribers.lock().remove(&self.id);
        }
    }
}
