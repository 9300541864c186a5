use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use super::provider::KeystoreProvider;
use crate::crypto::WrappedSecretKey;

/// In-memory keystore slot, for tests and ephemeral sessions
#[derive(Debug, Clone, Default)]
pub struct MemoryKeystore {
    slot: Arc<RwLock<Option<WrappedSecretKey>>>,
}

impl MemoryKeystore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeystoreProvider for MemoryKeystore {
    async fn store(&self, wrapped: &WrappedSecretKey) -> Result<(), anyhow::Error> {
        let mut slot = self
            .slot
            .write()
            .map_err(|_| anyhow::anyhow!("failed to acquire write lock"))?;
        *slot = Some(wrapped.clone());
        Ok(())
    }

    async fn load(&self) -> Result<Option<WrappedSecretKey>, anyhow::Error> {
        let slot = self
            .slot
            .read()
            .map_err(|_| anyhow::anyhow!("failed to acquire read lock"))?;
        Ok(slot.clone())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::SecretKey;

    #[tokio::test]
    async fn test_empty_slot_loads_none() {
        let keystore = MemoryKeystore::new();
        assert!(keystore.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_store_load_roundtrip() {
        let keystore = MemoryKeystore::new();
        let key = SecretKey::generate().unwrap();
        let wrapped = WrappedSecretKey::seal(&key, "pass").unwrap();

        keystore.store(&wrapped).await.unwrap();
        assert_eq!(keystore.load().await.unwrap(), Some(wrapped));
    }
}
