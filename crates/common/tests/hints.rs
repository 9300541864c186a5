//! Integration tests for hint creation and reading

mod common;

use ::common::crypto::EncryptedHint;
use ::common::store::VaultStore;
use ::common::testkit::TestUser;
use ::common::vault::VaultError;
use uuid::Uuid;

#[tokio::test]
async fn test_create_and_read_roundtrip() {
    let (vault, _, alice) = common::setup_test_env().await;
    let group = Uuid::new_v4();

    let (record, entries) = vault
        .create_hint(
            alice.session(),
            group,
            "bank-pin-hint",
            "first pet's name",
            &[],
        )
        .await
        .unwrap();

    assert_eq!(record.label(), "bank-pin-hint");
    assert_eq!(entries.len(), 1);

    let text = vault
        .read_hint_by_id(*record.id(), alice.session())
        .await
        .unwrap();
    assert_eq!(text, "first pet's name");
}

#[tokio::test]
async fn test_owner_entry_exists_at_creation() {
    let (vault, store, alice) = common::setup_test_env().await;
    let bob = TestUser::new("bob").await;

    let (record, entries) = vault
        .create_hint(
            alice.session(),
            Uuid::new_v4(),
            "wifi",
            "the usual one",
            &[bob.public_key()],
        )
        .await
        .unwrap();

    // One entry per reader, owner's always present
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].recipient, alice.public_key());
    assert!(store
        .get_wrapped_dek(*record.id(), &alice.public_key())
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_every_recipient_can_read() {
    let (vault, store, alice) = common::setup_test_env().await;
    let bob = TestUser::new("bob").await;
    let carol = TestUser::new("carol").await;

    let (record, _) = vault
        .create_hint(
            alice.session(),
            Uuid::new_v4(),
            "safe-code",
            "year we got the dog",
            &[bob.public_key(), carol.public_key()],
        )
        .await
        .unwrap();

    for reader in [&alice, &bob, &carol] {
        let entry = store
            .get_wrapped_dek(*record.id(), &reader.public_key())
            .await
            .unwrap()
            .unwrap();
        let text = vault
            .read_hint(record.body(), &entry.wrapped_dek, reader.session())
            .await
            .unwrap();
        assert_eq!(text, "year we got the dog");
    }
}

#[tokio::test]
async fn test_duplicate_recipients_collapse() {
    let (vault, _, alice) = common::setup_test_env().await;
    let bob = TestUser::new("bob").await;

    let (_, entries) = vault
        .create_hint(
            alice.session(),
            Uuid::new_v4(),
            "dup",
            "text",
            &[bob.public_key(), bob.public_key(), alice.public_key()],
        )
        .await
        .unwrap();

    assert_eq!(entries.len(), 2);
}

#[tokio::test]
async fn test_non_recipient_cannot_read() {
    let (vault, store, alice) = common::setup_test_env().await;
    let mallory = TestUser::new("mallory").await;

    let (record, _) = vault
        .create_hint(alice.session(), Uuid::new_v4(), "private", "secret", &[])
        .await
        .unwrap();

    // No entry addressed to mallory at all
    let result = vault.read_hint_by_id(*record.id(), mallory.session()).await;
    assert!(matches!(result, Err(VaultError::EntryNotFound)));

    // Even holding alice's entry, mallory's key cannot open it
    let alice_entry = store
        .get_wrapped_dek(*record.id(), &alice.public_key())
        .await
        .unwrap()
        .unwrap();
    let result = vault
        .read_hint(record.body(), &alice_entry.wrapped_dek, mallory.session())
        .await;
    assert!(matches!(result, Err(VaultError::CannotDecrypt)));
}

#[tokio::test]
async fn test_tampered_body_cannot_decrypt() {
    let (vault, store, alice) = common::setup_test_env().await;

    let (record, _) = vault
        .create_hint(alice.session(), Uuid::new_v4(), "t", "payload", &[])
        .await
        .unwrap();

    let mut bytes = record.body().to_bytes();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    let tampered = EncryptedHint::from_bytes(&bytes).unwrap();

    let entry = store
        .get_wrapped_dek(*record.id(), &alice.public_key())
        .await
        .unwrap()
        .unwrap();
    let result = vault
        .read_hint(&tampered, &entry.wrapped_dek, alice.session())
        .await;
    assert!(matches!(result, Err(VaultError::CannotDecrypt)));
}

#[tokio::test]
async fn test_locked_session_cannot_create() {
    let (vault, _, alice) = common::setup_test_env().await;
    alice.session().lock();

    let result = vault
        .create_hint(alice.session(), Uuid::new_v4(), "x", "y", &[])
        .await;
    assert!(matches!(result, Err(VaultError::Session(_))));
}
