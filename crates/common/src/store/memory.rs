use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use uuid::Uuid;

use super::provider::VaultStore;
use crate::crypto::PublicKey;
use crate::vault::{GroupMembership, HintRecord, WrappedDekEntry};

/// In-memory vault store backed by maps
///
/// The reference implementation of [`VaultStore`], used by the testkit and
/// integration tests. Wrapped entries live in a map keyed by
/// `(hint_id, recipient hex)`, so the atomic-upsert contract falls out of
/// holding the write lock for the duration of one insert.
#[derive(Debug, Clone, Default)]
pub struct MemoryVaultStore {
    inner: Arc<RwLock<MemoryVaultStoreInner>>,
}

#[derive(Debug, Default)]
struct MemoryVaultStoreInner {
    /// hint_id -> record
    hints: HashMap<Uuid, HintRecord>,
    /// (hint_id, recipient hex) -> entry
    wrapped: BTreeMap<(Uuid, String), WrappedDekEntry>,
    /// group_id -> member hex -> key
    members: HashMap<Uuid, BTreeMap<String, PublicKey>>,
}

impl MemoryVaultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of wrapped entries across all hints. Test helper for
    /// asserting re-key idempotence.
    pub fn wrapped_entry_count(&self) -> usize {
        self.inner
            .read()
            .map(|inner| inner.wrapped.len())
            .unwrap_or(0)
    }
}

fn poisoned(op: &str) -> anyhow::Error {
    anyhow::anyhow!("failed to acquire {} lock", op)
}

#[async_trait]
impl VaultStore for MemoryVaultStore {
    async fn put_hint(&self, record: HintRecord) -> Result<(), anyhow::Error> {
        let mut inner = self.inner.write().map_err(|_| poisoned("write"))?;
        inner.hints.insert(*record.id(), record);
        Ok(())
    }

    async fn get_hint(&self, hint_id: Uuid) -> Result<Option<HintRecord>, anyhow::Error> {
        let inner = self.inner.read().map_err(|_| poisoned("read"))?;
        Ok(inner.hints.get(&hint_id).cloned())
    }

    async fn list_group_hints(&self, group_id: Uuid) -> Result<Vec<Uuid>, anyhow::Error> {
        let inner = self.inner.read().map_err(|_| poisoned("read"))?;
        let mut ids: Vec<Uuid> = inner
            .hints
            .values()
            .filter(|record| *record.group_id() == group_id)
            .map(|record| *record.id())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn upsert_wrapped_dek(&self, entry: WrappedDekEntry) -> Result<(), anyhow::Error> {
        let mut inner = self.inner.write().map_err(|_| poisoned("write"))?;
        inner.wrapped.insert(entry.key(), entry);
        Ok(())
    }

    async fn get_wrapped_dek(
        &self,
        hint_id: Uuid,
        recipient: &PublicKey,
    ) -> Result<Option<WrappedDekEntry>, anyhow::Error> {
        let inner = self.inner.read().map_err(|_| poisoned("read"))?;
        Ok(inner.wrapped.get(&(hint_id, recipient.to_hex())).cloned())
    }

    async fn list_wrapped_deks(&self, hint_id: Uuid) -> Result<Vec<WrappedDekEntry>, anyhow::Error> {
        let inner = self.inner.read().map_err(|_| poisoned("read"))?;
        Ok(inner
            .wrapped
            .range((hint_id, String::new())..)
            .take_while(|((id, _), _)| *id == hint_id)
            .map(|(_, entry)| entry.clone())
            .collect())
    }

    async fn add_membership(&self, membership: GroupMembership) -> Result<(), anyhow::Error> {
        let mut inner = self.inner.write().map_err(|_| poisoned("write"))?;
        inner
            .members
            .entry(membership.group_id)
            .or_default()
            .insert(membership.member.to_hex(), membership.member);
        Ok(())
    }

    async fn list_members(&self, group_id: Uuid) -> Result<Vec<PublicKey>, anyhow::Error> {
        let inner = self.inner.read().map_err(|_| poisoned("read"))?;
        Ok(inner
            .members
            .get(&group_id)
            .map(|members| members.values().copied().collect())
            .unwrap_or_default())
    }
}
