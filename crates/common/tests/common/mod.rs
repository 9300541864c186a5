//! Shared setup for integration tests

use common::store::MemoryVaultStore;
use common::testkit::{memory_vault, TestUser};
use common::vault::Vault;

/// A vault over a fresh memory store plus an unlocked owner session.
pub async fn setup_test_env() -> (Vault, MemoryVaultStore, TestUser) {
    let (vault, store) = memory_vault();
    let owner = TestUser::new("alice").await;
    (vault, store, owner)
}
