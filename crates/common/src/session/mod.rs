//! In-memory lifecycle of the unlocked identity key
//!
//! A [`KeySession`] is the single owner of the decrypted private key for
//! the duration of a sign-in. It is an explicit object passed by reference
//! to the operations that need it — there is no ambient global key state —
//! and it exposes an observer interface for auth-state changes instead of
//! fire-and-forget callbacks.

mod events;
mod manager;

pub use events::{SessionEvent, SessionSubscription};
pub use manager::{KeySession, SessionError, SessionStatus};
