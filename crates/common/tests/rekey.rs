//! Integration tests for the group re-keying protocol

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use ::common::crypto::PublicKey;
use ::common::store::{MemoryVaultStore, VaultStore};
use ::common::testkit::TestUser;
use ::common::vault::{
    GroupMembership, HintRecord, OwnershipClaim, RekeyItemError, RekeyPhase, Vault,
    WrappedDekEntry,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

/// Store wrapper that fails `upsert_wrapped_dek` for selected hints,
/// simulating a transient storage/network fault during a re-key run.
#[derive(Debug, Clone)]
struct FlakyStore {
    inner: MemoryVaultStore,
    failing: Arc<Mutex<HashSet<Uuid>>>,
}

impl FlakyStore {
    fn new(inner: MemoryVaultStore) -> Self {
        Self {
            inner,
            failing: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    fn fail_upserts_for(&self, hint_id: Uuid) {
        self.failing.lock().insert(hint_id);
    }

    fn heal(&self) {
        self.failing.lock().clear();
    }
}

#[async_trait]
impl VaultStore for FlakyStore {
    async fn put_hint(&self, record: HintRecord) -> Result<(), anyhow::Error> {
        self.inner.put_hint(record).await
    }

    async fn get_hint(&self, hint_id: Uuid) -> Result<Option<HintRecord>, anyhow::Error> {
        self.inner.get_hint(hint_id).await
    }

    async fn list_group_hints(&self, group_id: Uuid) -> Result<Vec<Uuid>, anyhow::Error> {
        self.inner.list_group_hints(group_id).await
    }

    async fn upsert_wrapped_dek(&self, entry: WrappedDekEntry) -> Result<(), anyhow::Error> {
        if self.failing.lock().contains(&entry.hint_id) {
            return Err(anyhow::anyhow!("injected upsert fault"));
        }
        self.inner.upsert_wrapped_dek(entry).await
    }

    async fn get_wrapped_dek(
        &self,
        hint_id: Uuid,
        recipient: &PublicKey,
    ) -> Result<Option<WrappedDekEntry>, anyhow::Error> {
        self.inner.get_wrapped_dek(hint_id, recipient).await
    }

    async fn list_wrapped_deks(
        &self,
        hint_id: Uuid,
    ) -> Result<Vec<WrappedDekEntry>, anyhow::Error> {
        self.inner.list_wrapped_deks(hint_id).await
    }

    async fn add_membership(&self, membership: GroupMembership) -> Result<(), anyhow::Error> {
        self.inner.add_membership(membership).await
    }

    async fn list_members(&self, group_id: Uuid) -> Result<Vec<PublicKey>, anyhow::Error> {
        self.inner.list_members(group_id).await
    }
}

async fn create_hints(
    vault: &Vault,
    owner: &TestUser,
    group: Uuid,
    texts: &[&str],
) -> Vec<Uuid> {
    let mut ids = Vec::new();
    for (i, text) in texts.iter().enumerate() {
        let (record, _) = vault
            .create_hint(owner.session(), group, &format!("hint-{}", i), text, &[])
            .await
            .unwrap();
        ids.push(*record.id());
    }
    ids
}

fn claims_for(ids: &[Uuid], owner: &TestUser) -> Vec<OwnershipClaim> {
    ids.iter()
        .map(|id| OwnershipClaim::new(*id, owner.public_key()))
        .collect()
}

#[tokio::test]
async fn test_extend_grants_access_without_touching_ciphertext() {
    let (vault, store, alice) = common::setup_test_env().await;
    let bob = TestUser::new("bob").await;
    let group = Uuid::new_v4();

    let ids = create_hints(&vault, &alice, group, &["one", "two"]).await;
    let body_before = store.get_hint(ids[0]).await.unwrap().unwrap();

    let report = vault
        .extend_recipients(
            alice.session(),
            claims_for(&ids, &alice),
            &bob.public_key(),
        )
        .await;

    assert_eq!(report.phase(), RekeyPhase::Committed);
    assert!(report.is_complete());
    assert_eq!(report.succeeded().len(), 2);

    // Ciphertext untouched: only wrapped entries were added
    let body_after = store.get_hint(ids[0]).await.unwrap().unwrap();
    assert_eq!(body_before.body(), body_after.body());

    assert_eq!(
        vault.read_hint_by_id(ids[0], bob.session()).await.unwrap(),
        "one"
    );
    assert_eq!(
        vault.read_hint_by_id(ids[1], bob.session()).await.unwrap(),
        "two"
    );
}

#[tokio::test]
async fn test_extend_is_idempotent() {
    let (vault, store, alice) = common::setup_test_env().await;
    let bob = TestUser::new("bob").await;
    let group = Uuid::new_v4();

    let ids = create_hints(&vault, &alice, group, &["only"]).await;

    for _ in 0..2 {
        let report = vault
            .extend_recipients(
                alice.session(),
                claims_for(&ids, &alice),
                &bob.public_key(),
            )
            .await;
        assert!(report.is_complete());
    }

    // Exactly one entry per (hint, reader): owner + bob, nothing doubled
    assert_eq!(store.wrapped_entry_count(), 2);
    assert_eq!(store.list_wrapped_deks(ids[0]).await.unwrap().len(), 2);
    assert_eq!(
        vault.read_hint_by_id(ids[0], bob.session()).await.unwrap(),
        "only"
    );
}

#[tokio::test]
async fn test_duplicate_claims_in_one_run() {
    let (vault, store, alice) = common::setup_test_env().await;
    let bob = TestUser::new("bob").await;

    let ids = create_hints(&vault, &alice, Uuid::new_v4(), &["dup"]).await;
    let mut claims = claims_for(&ids, &alice);
    claims.extend(claims_for(&ids, &alice));

    let report = vault
        .extend_recipients(alice.session(), claims, &bob.public_key())
        .await;

    assert_eq!(report.attempted(), 1);
    assert_eq!(store.list_wrapped_deks(ids[0]).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_partial_failure_is_isolated_and_retriable() {
    let flaky = FlakyStore::new(MemoryVaultStore::new());
    let vault = Vault::new(Arc::new(flaky.clone()));
    let alice = TestUser::new("alice").await;
    let bob = TestUser::new("bob").await;
    let group = Uuid::new_v4();

    let ids = create_hints(&vault, &alice, group, &["s1", "s2"]).await;
    flaky.fail_upserts_for(ids[1]);

    let report = vault
        .extend_recipients(
            alice.session(),
            claims_for(&ids, &alice),
            &bob.public_key(),
        )
        .await;

    // s1 committed, s2 failed, and the run still says Committed: partial
    // progress is progress
    assert_eq!(report.phase(), RekeyPhase::Committed);
    assert_eq!(report.succeeded(), &[ids[0]]);
    assert_eq!(report.failed().len(), 1);
    assert_eq!(report.failed()[0].0, ids[1]);
    assert!(matches!(report.failed()[0].1, RekeyItemError::Store(_)));
    assert_eq!(report.summary(), "1 of 2 hints updated for new member");

    // s1 is readable by bob right now
    assert_eq!(
        vault.read_hint_by_id(ids[0], bob.session()).await.unwrap(),
        "s1"
    );

    // Retry of s2 alone succeeds once the fault clears; s1 not re-run
    flaky.heal();
    let retry = vault
        .extend_recipients(
            alice.session(),
            claims_for(&ids[1..], &alice),
            &bob.public_key(),
        )
        .await;
    assert!(retry.is_complete());
    assert_eq!(
        vault.read_hint_by_id(ids[1], bob.session()).await.unwrap(),
        "s2"
    );
}

#[tokio::test]
async fn test_partial_failure_report_as_typed_error() {
    let flaky = FlakyStore::new(MemoryVaultStore::new());
    let vault = Vault::new(Arc::new(flaky.clone()));
    let alice = TestUser::new("alice").await;
    let bob = TestUser::new("bob").await;

    let ids = create_hints(&vault, &alice, Uuid::new_v4(), &["a", "b", "c"]).await;
    flaky.fail_upserts_for(ids[2]);

    let failure = vault
        .extend_recipients(
            alice.session(),
            claims_for(&ids, &alice),
            &bob.public_key(),
        )
        .await
        .into_result()
        .unwrap_err();

    assert_eq!(failure.succeeded.len(), 2);
    assert_eq!(failure.failed.len(), 1);
    assert_eq!(
        failure.to_string(),
        "2 of 3 hints updated for new member; 1 failed"
    );
}

#[tokio::test]
async fn test_claim_for_foreign_hint_refused() {
    let (vault, _, alice) = common::setup_test_env().await;
    let bob = TestUser::new("bob").await;
    let carol = TestUser::new("carol").await;
    let group = Uuid::new_v4();

    // bob owns this hint, not alice
    let (record, _) = vault
        .create_hint(bob.session(), group, "bobs", "bob's secret", &[])
        .await
        .unwrap();

    // alice cannot extend bob's hint, with either claim shape
    let report = vault
        .extend_recipients(
            alice.session(),
            vec![OwnershipClaim::new(*record.id(), alice.public_key())],
            &carol.public_key(),
        )
        .await;
    assert_eq!(report.failed().len(), 1);
    assert_eq!(report.failed()[0].1, RekeyItemError::NotOwner);

    let report = vault
        .extend_recipients(
            alice.session(),
            vec![OwnershipClaim::new(*record.id(), bob.public_key())],
            &carol.public_key(),
        )
        .await;
    assert_eq!(report.failed()[0].1, RekeyItemError::NotOwner);
}

#[tokio::test]
async fn test_missing_hint_reported_not_dropped() {
    let (vault, _, alice) = common::setup_test_env().await;
    let bob = TestUser::new("bob").await;

    let ghost = Uuid::new_v4();
    let report = vault
        .extend_recipients(
            alice.session(),
            vec![OwnershipClaim::new(ghost, alice.public_key())],
            &bob.public_key(),
        )
        .await;

    assert_eq!(report.failed(), &[(ghost, RekeyItemError::HintNotFound)]);
}

#[tokio::test]
async fn test_locked_session_fails_the_run() {
    let (vault, store, alice) = common::setup_test_env().await;
    let bob = TestUser::new("bob").await;

    let ids = create_hints(&vault, &alice, Uuid::new_v4(), &["locked-out"]).await;
    let claims = claims_for(&ids, &alice);
    alice.session().lock();

    let report = vault
        .extend_recipients(alice.session(), claims, &bob.public_key())
        .await;

    assert_eq!(report.phase(), RekeyPhase::Failed);
    assert!(report.succeeded().is_empty());
    assert_eq!(report.failed()[0].1, RekeyItemError::SessionLocked);
    // Nothing was written
    assert_eq!(store.list_wrapped_deks(ids[0]).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_missing_entries_drives_the_claim_list() {
    let (vault, _, alice) = common::setup_test_env().await;
    let bob = TestUser::new("bob").await;
    let group = Uuid::new_v4();

    let ids = create_hints(&vault, &alice, group, &["one", "two", "three"]).await;

    // Re-key only the first hint
    vault
        .extend_recipients(
            alice.session(),
            claims_for(&ids[..1], &alice),
            &bob.public_key(),
        )
        .await;

    let mut missing = vault.missing_entries(group, &bob.public_key()).await.unwrap();
    missing.sort();
    let mut expected = ids[1..].to_vec();
    expected.sort();
    assert_eq!(missing, expected);
}
