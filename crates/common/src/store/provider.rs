use async_trait::async_trait;
use uuid::Uuid;

use crate::crypto::PublicKey;
use crate::vault::{GroupMembership, HintRecord, WrappedDekEntry};

/// Trait for the storage collaborator that persists vault rows.
///  Note, this *does not* do any cryptography! Everything handed to an
///  implementation is already ciphertext or public metadata, and nothing
///  it returns is trusted beyond row-shape validity.
/// Think of this as a trait that lets us treat any data store as a backer
///  for the vault's rows, such as
///  - postgres behind an API
///  - sqlite
///  - a simple hash map
#[async_trait]
pub trait VaultStore: Send + Sync + std::fmt::Debug {
    /// Persist a new hint record, or replace an existing one with the
    /// same id (a hint edit is a full-body replacement).
    async fn put_hint(&self, record: HintRecord) -> Result<(), anyhow::Error>;

    /// Fetch a hint record by id.
    ///
    /// # Returns
    /// - `Ok(Some(record))` if the hint exists
    /// - `Ok(None)` if it does not
    async fn get_hint(&self, hint_id: Uuid) -> Result<Option<HintRecord>, anyhow::Error>;

    /// List the ids of every hint currently shared with a group.
    async fn list_group_hints(&self, group_id: Uuid) -> Result<Vec<Uuid>, anyhow::Error>;

    /// Insert or overwrite the wrapped-DEK entry for the entry's
    /// `(hint_id, recipient)` key.
    ///
    /// This write MUST be atomic per key for an implementation to be
    /// considered correct: two racing upserts for the same pair may land
    /// in either order, but must never interleave or duplicate the row.
    /// This is what makes re-key retries safe.
    async fn upsert_wrapped_dek(&self, entry: WrappedDekEntry) -> Result<(), anyhow::Error>;

    /// Fetch the wrapped-DEK entry for one (hint, recipient) pair.
    async fn get_wrapped_dek(
        &self,
        hint_id: Uuid,
        recipient: &PublicKey,
    ) -> Result<Option<WrappedDekEntry>, anyhow::Error>;

    /// List every wrapped-DEK entry for a hint, one per authorized reader.
    async fn list_wrapped_deks(&self, hint_id: Uuid) -> Result<Vec<WrappedDekEntry>, anyhow::Error>;

    /// Record a group membership row. Adding the same (group, member)
    /// pair twice is a no-op.
    async fn add_membership(&self, membership: GroupMembership) -> Result<(), anyhow::Error>;

    /// List the members of a group.
    async fn list_members(&self, group_id: Uuid) -> Result<Vec<PublicKey>, anyhow::Error>;
}
