use std::sync::Arc;

use super::provider::KeystoreProvider;
use crate::crypto::{KeyError, PassphraseError, SecretKey, WrappedSecretKey};

/// Errors that can occur during keystore operations
#[derive(Debug, thiserror::Error)]
pub enum KeystoreError {
    #[error("keystore error: {0}")]
    Default(#[from] anyhow::Error),
    /// The slot is empty: no identity has been created on this device.
    #[error("no identity has been initialized in this keystore")]
    NotInitialized,
    /// Refusing to overwrite an existing identity. Key regeneration would
    /// orphan every wrapped entry addressed to the old key.
    #[error("an identity already exists in this keystore")]
    AlreadyInitialized,
    #[error("key error: {0}")]
    Key(#[from] KeyError),
    #[error("passphrase error: {0}")]
    Passphrase(#[from] PassphraseError),
}

/// The identity key store: key pair lifecycle over a [`KeystoreProvider`]
/// slot
///
/// Owns the create / open / rotate flow for the member's identity key:
///
/// - [`initialize`](Keystore::initialize) generates a fresh key pair and
///   persists it sealed under the passphrase
/// - [`open`](Keystore::open) recovers the private key for a session
/// - [`rotate`](Keystore::rotate) changes the passphrase wrapping without
///   touching the key pair itself, so existing wrapped entries stay valid
///
/// Losing the passphrase makes the identity permanently unrecoverable;
/// there is deliberately no secondary unlock path.
#[derive(Debug, Clone)]
pub struct Keystore {
    provider: Arc<dyn KeystoreProvider>,
}

impl Keystore {
    pub fn new(provider: Arc<dyn KeystoreProvider>) -> Self {
        Self { provider }
    }

    /// Whether an identity exists in the slot.
    pub async fn is_initialized(&self) -> Result<bool, KeystoreError> {
        Ok(self.provider.load().await?.is_some())
    }

    /// Generate a fresh identity key pair and persist it sealed under the
    /// passphrase. Returns the unsealed key so the caller can establish a
    /// session without prompting again.
    ///
    /// # Errors
    ///
    /// - [`KeystoreError::AlreadyInitialized`] if the slot is occupied
    /// - [`KeyError::Generation`] if the system entropy source fails
    pub async fn initialize(&self, passphrase: &str) -> Result<SecretKey, KeystoreError> {
        if self.provider.load().await?.is_some() {
            return Err(KeystoreError::AlreadyInitialized);
        }

        let secret_key = SecretKey::generate()?;
        let wrapped = WrappedSecretKey::seal(&secret_key, passphrase)?;
        self.provider.store(&wrapped).await?;

        tracing::info!(
            identity = %secret_key.public().to_hex(),
            "initialized new identity key"
        );
        Ok(secret_key)
    }

    /// Open the stored identity with its passphrase.
    ///
    /// # Errors
    ///
    /// - [`KeystoreError::NotInitialized`] if the slot is empty
    /// - [`PassphraseError::Authentication`] on a wrong passphrase or
    ///   tampered blob; the caller should re-prompt, not retry
    pub async fn open(&self, passphrase: &str) -> Result<SecretKey, KeystoreError> {
        let wrapped = self
            .provider
            .load()
            .await?
            .ok_or(KeystoreError::NotInitialized)?;
        Ok(wrapped.open(passphrase)?)
    }

    /// Load the sealed blob without opening it.
    pub async fn load_wrapped(&self) -> Result<Option<WrappedSecretKey>, KeystoreError> {
        Ok(self.provider.load().await?)
    }

    /// Re-seal the identity under a new passphrase.
    ///
    /// Opens with the old passphrase, seals the same key pair with a fresh
    /// salt and nonce under the new one, and overwrites the slot. The key
    /// pair never changes, so no wrapped-DEK entries need re-wrapping.
    pub async fn rotate(
        &self,
        old_passphrase: &str,
        new_passphrase: &str,
    ) -> Result<WrappedSecretKey, KeystoreError> {
        let wrapped = self
            .provider
            .load()
            .await?
            .ok_or(KeystoreError::NotInitialized)?;

        let secret_key = wrapped.open(old_passphrase)?;
        let resealed = WrappedSecretKey::seal(&secret_key, new_passphrase)?;
        self.provider.store(&resealed).await?;

        tracing::info!(
            identity = %secret_key.public().to_hex(),
            "rotated identity passphrase"
        );
        Ok(resealed)
    }
}
