use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::events::{SessionEvent, SessionSubscription, SubscriberMap};
use crate::crypto::{PublicKey, SecretKey};
use crate::keystore::{Keystore, KeystoreError};

/// Errors that can occur during session operations
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No identity key is loaded; the caller must unlock first.
    #[error("session is locked: no identity key is loaded")]
    Locked,
    /// Another unlock is mid-flight on this session.
    #[error("an unlock is already in progress")]
    UnlockInProgress,
    #[error("keystore error: {0}")]
    Keystore(#[from] KeystoreError),
}

/// Observable lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// No key handle in memory.
    NotLoaded,
    /// A passphrase has been supplied and the keystore is being opened.
    Unlocking,
    /// The key handle is resident and lendable.
    Loaded,
}

enum SessionState {
    NotLoaded,
    Unlocking,
    Loaded(SecretKey),
}

/// The key session manager: in-memory lifecycle of the unlocked private key
///
/// Lifecycle: `NotLoaded -> Unlocking -> Loaded -> NotLoaded` (on
/// [`lock`](KeySession::lock) or sign-out). The session is the single
/// owner of the decrypted key handle:
///
/// - callers borrow the key for exactly one operation via
///   [`with_key`](KeySession::with_key) — it is never cloned out
/// - the handle is never serialized; re-sealing goes through
///   [`Keystore::rotate`](crate::keystore::Keystore::rotate), which works
///   on the stored blob
/// - [`lock`](KeySession::lock) drops the handle, which zeroizes the key
///   material
///
/// Clones of a `KeySession` share the same state, so one clone unlocking
/// makes the key available to all of them.
#[derive(Clone)]
pub struct KeySession {
    keystore: Keystore,
    state: Arc<RwLock<SessionState>>,
    subscribers: Arc<SubscriberMap>,
    next_subscriber: Arc<AtomicU64>,
}

impl KeySession {
    pub fn new(keystore: Keystore) -> Self {
        Self {
            keystore,
            state: Arc::new(RwLock::new(SessionState::NotLoaded)),
            subscribers: Arc::new(SubscriberMap::default()),
            next_subscriber: Arc::new(AtomicU64::new(0)),
        }
    }

    /// The keystore this session unlocks from.
    pub fn keystore(&self) -> &Keystore {
        &self.keystore
    }

    /// Current lifecycle state.
    pub fn status(&self) -> SessionStatus {
        match *self.state.read() {
            SessionState::NotLoaded => SessionStatus::NotLoaded,
            SessionState::Unlocking => SessionStatus::Unlocking,
            SessionState::Loaded(_) => SessionStatus::Loaded,
        }
    }

    /// Whether a key handle is currently resident.
    pub fn is_unlocked(&self) -> bool {
        self.status() == SessionStatus::Loaded
    }

    /// Unlock the session: load the wrapped key from the keystore and open
    /// it with the passphrase.
    ///
    /// Unlocking an already-loaded session is a no-op returning the loaded
    /// identity.
    ///
    /// # Errors
    ///
    /// - [`SessionError::UnlockInProgress`] if another unlock is mid-flight
    /// - [`KeystoreError::NotInitialized`] if no identity exists
    /// - [`PassphraseError::Authentication`](crate::crypto::PassphraseError)
    ///   on a wrong passphrase; the session returns to `NotLoaded` and the
    ///   member may retry
    pub async fn unlock(&self, passphrase: &str) -> Result<PublicKey, SessionError> {
        {
            let mut state = self.state.write();
            match *state {
                SessionState::Loaded(ref key) => return Ok(key.public()),
                SessionState::Unlocking => return Err(SessionError::UnlockInProgress),
                SessionState::NotLoaded => *state = SessionState::Unlocking,
            }
        }

        let opened = self.keystore.open(passphrase).await;

        let mut state = self.state.write();
        match opened {
            Ok(key) => {
                let identity = key.public();
                *state = SessionState::Loaded(key);
                drop(state);

                tracing::debug!(identity = %identity.to_hex(), "session established");
                self.emit(&SessionEvent::SessionEstablished(identity));
                Ok(identity)
            }
            Err(e) => {
                *state = SessionState::NotLoaded;
                drop(state);
                Err(e.into())
            }
        }
    }

    /// Drop the key handle. Any operation needing the key afterwards must
    /// re-unlock. No-op on an already-locked session.
    pub fn lock(&self) {
        let was_loaded = {
            let mut state = self.state.write();
            matches!(
                std::mem::replace(&mut *state, SessionState::NotLoaded),
                SessionState::Loaded(_)
            )
        };

        if was_loaded {
            tracing::debug!("session ended");
            self.emit(&SessionEvent::SessionEnded);
        }
    }

    /// The identity of the unlocked member.
    pub fn identity(&self) -> Result<PublicKey, SessionError> {
        match *self.state.read() {
            SessionState::Loaded(ref key) => Ok(key.public()),
            _ => Err(SessionError::Locked),
        }
    }

    /// Lend the key handle to a closure for the duration of one operation.
    ///
    /// This is the only way to reach the unlocked key. The borrow is
    /// synchronous and must not be smuggled out of the closure; callers
    /// needing the key across an await point re-borrow for each step.
    pub fn with_key<R>(&self, f: impl FnOnce(&SecretKey) -> R) -> Result<R, SessionError> {
        match *self.state.read() {
            SessionState::Loaded(ref key) => Ok(f(key)),
            _ => Err(SessionError::Locked),
        }
    }

    /// Register an observer for session events.
    ///
    /// The callback runs synchronously on the thread that triggered the
    /// event, so it must be quick and must not call back into this
    /// session's subscribe/cancel surface.
    pub fn subscribe(
        &self,
        f: impl Fn(&SessionEvent) + Send + Sync + 'static,
    ) -> SessionSubscription {
        let id = self.next_subscriber.fetch_add(1, Ordering::Relaxed);
        self.subscribers.lock().insert(id, Box::new(f));
        SessionSubscription::new(id, Arc::downgrade(&self.subscribers))
    }

    fn emit(&self, event: &SessionEvent) {
        let subscribers = self.subscribers.lock();
        for subscriber in subscribers.values() {
            subscriber(event);
        }
    }
}
