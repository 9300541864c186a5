use async_trait::async_trait;

use crate::crypto::WrappedSecretKey;

/// Trait for the client-side slot that holds the member's wrapped private
/// key.
///  There is exactly one slot per device: a member owns one identity, and
///  only that member's client ever writes it, so there is no multi-writer
///  contention to design for.
/// Only the sealed [`WrappedSecretKey`] blob passes through here — an
/// implementation never sees raw key material.
#[async_trait]
pub trait KeystoreProvider: Send + Sync + std::fmt::Debug {
    /// Write the wrapped key into the slot, replacing any previous blob
    /// (passphrase rotation re-seals and overwrites).
    async fn store(&self, wrapped: &WrappedSecretKey) -> Result<(), anyhow::Error>;

    /// Read the slot.
    ///
    /// # Returns
    /// - `Ok(Some(wrapped))` if an identity has been initialized
    /// - `Ok(None)` if the slot is empty
    async fn load(&self) -> Result<Option<WrappedSecretKey>, anyhow::Error>;
}
