use std::collections::BTreeSet;
use std::sync::Arc;

use uuid::Uuid;

use super::records::{GroupMembership, HintRecord, WrappedDekEntry};
use super::rekey::{self, OwnershipClaim, RekeyReport};
use crate::crypto::{Dek, DekError, EncryptedHint, EnvelopeError, PublicKey, WrappedDek};
use crate::session::{KeySession, SessionError};
use crate::store::VaultStore;

/// Errors that can occur during vault operations
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("default error: {0}")]
    Default(#[from] anyhow::Error),
    #[error("session error: {0}")]
    Session(#[from] SessionError),
    #[error("dek error: {0}")]
    Dek(#[from] DekError),
    #[error("envelope error: {0}")]
    Envelope(#[from] EnvelopeError),
    #[error("hint not found: {0}")]
    HintNotFound(Uuid),
    #[error("no wrapped key exists for this reader")]
    EntryNotFound,
    /// Unwrap or decrypt rejected the data. Deliberately does not say
    /// which: tampering and key mismatch look identical to the member.
    #[error("cannot decrypt")]
    CannotDecrypt,
    #[error("hint is not valid utf-8")]
    NotText(#[from] std::string::FromUtf8Error),
}

/// The vault: envelope-encryption operations over a storage collaborator
///
/// This is the surface the request-handling boundary consumes. Every
/// operation takes the [`KeySession`] by reference when it needs the
/// member's key; nothing here caches key material between calls, and
/// nothing here ever hands the store plaintext.
#[derive(Debug, Clone)]
pub struct Vault {
    store: Arc<dyn VaultStore>,
}

impl Vault {
    pub fn new(store: Arc<dyn VaultStore>) -> Self {
        Self { store }
    }

    /// The storage collaborator this vault writes through.
    pub fn store(&self) -> &Arc<dyn VaultStore> {
        &self.store
    }

    /// Create a hint and its initial reader set in one operation.
    ///
    /// Generates a fresh DEK, encrypts the hint text, wraps the DEK for
    /// the owner (always) plus each additional recipient, then persists
    /// the record and every entry. All cryptography happens before the
    /// first store write, so a store fault can not leave a hint with a
    /// half-wrapped reader set; the DEK is discarded as soon as the
    /// entries are built.
    pub async fn create_hint(
        &self,
        session: &KeySession,
        group_id: Uuid,
        label: &str,
        plaintext: &str,
        recipients: &[PublicKey],
    ) -> Result<(HintRecord, Vec<WrappedDekEntry>), VaultError> {
        let owner = session.identity()?;
        let hint_id = Uuid::new_v4();

        let dek = Dek::generate()?;
        let body = dek.encrypt(plaintext.as_bytes())?;

        // Owner first, then the other recipients, each exactly once
        let mut readers = vec![owner];
        let mut seen: BTreeSet<String> = BTreeSet::from([owner.to_hex()]);
        for recipient in recipients {
            if seen.insert(recipient.to_hex()) {
                readers.push(*recipient);
            }
        }

        let mut entries = Vec::with_capacity(readers.len());
        for reader in &readers {
            let wrapped = WrappedDek::wrap(&dek, reader)?;
            entries.push(WrappedDekEntry::new(hint_id, *reader, wrapped));
        }
        // Every reader has a wrapped copy; the raw key is no longer needed
        drop(dek);

        let record = HintRecord::new(hint_id, label.to_string(), owner, group_id, body);
        self.store.put_hint(record.clone()).await?;
        for entry in &entries {
            self.store.upsert_wrapped_dek(entry.clone()).await?;
        }

        tracing::info!(
            hint = %hint_id,
            readers = entries.len(),
            "created hint"
        );
        Ok((record, entries))
    }

    /// Decrypt a hint with the wrapped entry addressed to the session's
    /// member.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::CannotDecrypt`] whether the entry was wrapped
    /// for a different key or the data was tampered with — the cause is
    /// logged, not surfaced.
    pub async fn read_hint(
        &self,
        body: &EncryptedHint,
        wrapped: &WrappedDek,
        session: &KeySession,
    ) -> Result<String, VaultError> {
        let plaintext = session.with_key(|key| {
            let dek = wrapped.unwrap_with(key).map_err(|e| {
                tracing::warn!(error = %e, "hint key unwrap rejected");
                VaultError::CannotDecrypt
            })?;
            dek.decrypt(body).map_err(|e| {
                tracing::warn!(error = %e, "hint decrypt rejected");
                VaultError::CannotDecrypt
            })
        })??;

        Ok(String::from_utf8(plaintext)?)
    }

    /// Fetch a hint and the session member's entry for it, then decrypt.
    pub async fn read_hint_by_id(
        &self,
        hint_id: Uuid,
        session: &KeySession,
    ) -> Result<String, VaultError> {
        let identity = session.identity()?;

        let record = self
            .store
            .get_hint(hint_id)
            .await?
            .ok_or(VaultError::HintNotFound(hint_id))?;

        let entry = self
            .store
            .get_wrapped_dek(hint_id, &identity)
            .await?
            .ok_or(VaultError::EntryNotFound)?;

        self.read_hint(record.body(), &entry.wrapped_dek, session)
            .await
    }

    /// Extend access to the claimed hints to one new member.
    ///
    /// Runs the re-keying protocol: per claimed hint, the owner's own
    /// entry is unwrapped and the DEK re-wrapped for `new_member`. The
    /// returned report is always a partial-success summary; failed hints
    /// can be retried alone and re-running is idempotent.
    pub async fn extend_recipients(
        &self,
        session: &KeySession,
        claims: Vec<OwnershipClaim>,
        new_member: &PublicKey,
    ) -> RekeyReport {
        rekey::run(&self.store, session, claims, new_member).await
    }

    /// Hints shared with a group that a member has no wrapped entry for
    /// yet. The boundary runs this after a membership change to decide
    /// what to claim for [`extend_recipients`](Vault::extend_recipients).
    pub async fn missing_entries(
        &self,
        group_id: Uuid,
        member: &PublicKey,
    ) -> Result<Vec<Uuid>, VaultError> {
        let mut missing = Vec::new();
        for hint_id in self.store.list_group_hints(group_id).await? {
            if self
                .store
                .get_wrapped_dek(hint_id, member)
                .await?
                .is_none()
            {
                missing.push(hint_id);
            }
        }
        Ok(missing)
    }

    /// Record a group membership row.
    pub async fn add_member(&self, membership: GroupMembership) -> Result<(), VaultError> {
        self.store.add_membership(membership).await?;
        Ok(())
    }

    /// List a group's members.
    pub async fn members(&self, group_id: Uuid) -> Result<Vec<PublicKey>, VaultError> {
        Ok(self.store.list_members(group_id).await?)
    }
}
