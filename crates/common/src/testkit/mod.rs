//! Test fixtures shared by unit and integration tests
//!
//! Not compiled out of the crate because the integration tests under
//! `tests/` need it; nothing here is meant for production use, and
//! panicking on setup failure is deliberate.

use std::sync::Arc;

use crate::crypto::PublicKey;
use crate::keystore::{Keystore, MemoryKeystore};
use crate::session::KeySession;
use crate::store::MemoryVaultStore;
use crate::vault::Vault;

/// A member with a fresh identity and an unlocked session
pub struct TestUser {
    pub name: String,
    keystore: Keystore,
    session: KeySession,
}

impl TestUser {
    /// Create a member backed by an in-memory keystore, with the identity
    /// initialized and the session already unlocked.
    pub async fn new(name: &str) -> Self {
        let keystore = Keystore::new(Arc::new(MemoryKeystore::new()));
        keystore
            .initialize(&Self::passphrase_for(name))
            .await
            .expect("initialize test identity");

        let session = KeySession::new(keystore.clone());
        session
            .unlock(&Self::passphrase_for(name))
            .await
            .expect("unlock test session");

        Self {
            name: name.to_string(),
            keystore,
            session,
        }
    }

    /// The deterministic passphrase this user was initialized with.
    pub fn passphrase(&self) -> String {
        Self::passphrase_for(&self.name)
    }

    fn passphrase_for(name: &str) -> String {
        format!("{}-passphrase", name)
    }

    pub fn keystore(&self) -> &Keystore {
        &self.keystore
    }

    pub fn session(&self) -> &KeySession {
        &self.session
    }

    pub fn public_key(&self) -> PublicKey {
        self.session.identity().expect("test session is unlocked")
    }
}

/// A vault over a fresh in-memory store, plus the store handle for
/// row-level assertions.
pub fn memory_vault() -> (Vault, MemoryVaultStore) {
    let store = MemoryVaultStore::new();
    (Vault::new(Arc::new(store.clone())), store)
}
