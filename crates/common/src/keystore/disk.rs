use std::path::PathBuf;

use async_trait::async_trait;

use super::provider::KeystoreProvider;
use crate::crypto::WrappedSecretKey;

/// Disk-backed keystore slot: one named file holding the
/// `salt || nonce || ciphertext` blob
///
/// The file content is exactly [`WrappedSecretKey::to_bytes`], so the blob
/// a browser build keeps in local storage and the blob on disk here are
/// interchangeable.
#[derive(Debug, Clone)]
pub struct DiskKeystore {
    path: PathBuf,
}

impl DiskKeystore {
    /// Create a keystore slot at the given file path (conventionally
    /// `identity.key` inside the app's config directory).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The file this slot reads and writes.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

#[async_trait]
impl KeystoreProvider for DiskKeystore {
    async fn store(&self, wrapped: &WrappedSecretKey) -> Result<(), anyhow::Error> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, wrapped.to_bytes()).await?;
        Ok(())
    }

    async fn load(&self) -> Result<Option<WrappedSecretKey>, anyhow::Error> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(WrappedSecretKey::from_bytes(&bytes)?))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::SecretKey;

    #[tokio::test]
    async fn test_missing_file_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let keystore = DiskKeystore::new(dir.path().join("identity.key"));
        assert!(keystore.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_store_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let keystore = DiskKeystore::new(dir.path().join("identity.key"));

        let key = SecretKey::generate().unwrap();
        let wrapped = WrappedSecretKey::seal(&key, "pass").unwrap();
        keystore.store(&wrapped).await.unwrap();

        let loaded = keystore.load().await.unwrap().unwrap();
        assert_eq!(wrapped, loaded);
        assert_eq!(
            loaded.open("pass").unwrap().to_bytes(),
            key.to_bytes()
        );
    }

    #[tokio::test]
    async fn test_store_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let keystore = DiskKeystore::new(dir.path().join("nested/config/identity.key"));

        let key = SecretKey::generate().unwrap();
        let wrapped = WrappedSecretKey::seal(&key, "pass").unwrap();
        keystore.store(&wrapped).await.unwrap();

        assert!(keystore.load().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_garbage_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identity.key");
        tokio::fs::write(&path, b"not a wrapped key").await.unwrap();

        let keystore = DiskKeystore::new(path);
        assert!(keystore.load().await.is_err());
    }
}
