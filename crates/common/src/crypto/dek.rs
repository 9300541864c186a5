//! Hint content encryption using ChaCha20-Poly1305
//!
//! Every hint is encrypted under its own data encryption key (DEK). The
//! DEK exists only transiently in memory: it is generated, used to encrypt
//! the hint text, wrapped for each authorized reader, and discarded. It is
//! never persisted in raw form, which is why [`Dek`] deliberately has no
//! serde implementations.

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of ChaCha20-Poly1305 nonce in bytes
pub const NONCE_SIZE: usize = 12;
/// Size of a DEK in bytes (256 bits)
pub const DEK_SIZE: usize = 32;

/// Errors that can occur during hint encryption/decryption
#[derive(Debug, thiserror::Error)]
pub enum DekError {
    #[error("dek error: {0}")]
    Default(#[from] anyhow::Error),
    /// Authentication tag rejected: the ciphertext was tampered with or
    /// this is not the key it was encrypted under.
    #[error("could not decrypt hint: ciphertext rejected")]
    Decryption,
}

/// A 256-bit data encryption key for a single hint
///
/// Zeroized on drop. Cloning is permitted for the duration of an encrypt
/// or wrap operation; holding a DEK beyond one operation defeats the
/// envelope model.
#[derive(Debug, Clone, PartialEq, Zeroize, ZeroizeOnDrop)]
pub struct Dek([u8; DEK_SIZE]);

impl Dek {
    /// Generate a fresh random DEK using a cryptographically secure RNG
    pub fn generate() -> Result<Self, DekError> {
        let mut buff = [0u8; DEK_SIZE];
        getrandom::getrandom(&mut buff)
            .map_err(|e| anyhow::anyhow!("failed to generate dek: {}", e))?;
        Ok(Self(buff))
    }

    /// Create a DEK from a byte slice
    ///
    /// # Errors
    ///
    /// Returns an error if the slice length is not exactly `DEK_SIZE` bytes.
    pub fn from_slice(data: &[u8]) -> Result<Self, DekError> {
        if data.len() != DEK_SIZE {
            return Err(anyhow::anyhow!(
                "invalid dek size, expected {}, got {}",
                DEK_SIZE,
                data.len()
            )
            .into());
        }
        let mut buff = [0u8; DEK_SIZE];
        buff.copy_from_slice(data);
        Ok(Self(buff))
    }

    /// Get a reference to the raw key bytes
    pub fn bytes(&self) -> &[u8] {
        self.0.as_ref()
    }

    /// Encrypt hint text using ChaCha20-Poly1305 AEAD
    ///
    /// A fresh random nonce is generated for every call. Nonce reuse under
    /// the same key breaks AEAD confidentiality, so there is no caching or
    /// counter-based generation anywhere in this module.
    ///
    /// # Errors
    ///
    /// Returns an error if the system RNG fails or encryption fails.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedHint, DekError> {
        let key = Key::from_slice(self.bytes());
        let cipher = ChaCha20Poly1305::new(key);

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        getrandom::getrandom(&mut nonce_bytes)
            .map_err(|e| anyhow::anyhow!("failed to generate nonce: {}", e))?;
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| anyhow::anyhow!("encrypt error"))?;

        Ok(EncryptedHint {
            nonce: nonce_bytes,
            ciphertext,
        })
    }

    /// Decrypt hint text using ChaCha20-Poly1305 AEAD
    ///
    /// # Errors
    ///
    /// Returns [`DekError::Decryption`] if the authentication tag check
    /// fails (tampered ciphertext or wrong key). No partial plaintext is
    /// released.
    pub fn decrypt(&self, hint: &EncryptedHint) -> Result<Vec<u8>, DekError> {
        let key = Key::from_slice(self.bytes());
        let cipher = ChaCha20Poly1305::new(key);
        let nonce = Nonce::from_slice(&hint.nonce);

        cipher
            .decrypt(nonce, hint.ciphertext.as_ref())
            .map_err(|_| DekError::Decryption)
    }
}

/// AEAD-encrypted hint text
///
/// Immutable once created; editing a hint replaces the whole body (the
/// same DEK is reused across edits unless explicitly rotated).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedHint {
    nonce: [u8; NONCE_SIZE],
    ciphertext: Vec<u8>,
}

impl EncryptedHint {
    /// Get the nonce used to encrypt this hint
    pub fn nonce(&self) -> &[u8; NONCE_SIZE] {
        &self.nonce
    }

    /// Get the ciphertext (including the trailing Poly1305 tag)
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// Serialize to the `nonce || ciphertext` blob layout
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(NONCE_SIZE + self.ciphertext.len());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Parse from the `nonce || ciphertext` blob layout
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DekError> {
        if bytes.len() < NONCE_SIZE {
            return Err(anyhow::anyhow!("data too short for nonce").into());
        }
        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&bytes[..NONCE_SIZE]);
        Ok(Self {
            nonce,
            ciphertext: bytes[NONCE_SIZE..].to_vec(),
        })
    }
}
