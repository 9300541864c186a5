//! Passphrase protection for the identity private key
//!
//! Before the private key ever touches persistent storage it is sealed
//! under a key derived from the member's passphrase:
//!
//! 1. **Derive**: PBKDF2-SHA256 over the passphrase with a fresh random
//!    salt produces a 256-bit wrapping key
//! 2. **Seal**: AES-256-GCM encrypts the raw private key bytes under the
//!    wrapping key with a fresh random nonce
//! 3. **Package**: `salt || nonce || ciphertext` in fixed-width fields so
//!    opening is unambiguous
//!
//! # Security Properties
//!
//! - The private key's confidentiality at rest reduces to passphrase
//!   strength plus KDF cost; there is no recovery path without the
//!   passphrase
//! - GCM authentication means a wrong passphrase and a corrupted blob are
//!   indistinguishable ([`PassphraseError::Authentication`]), so the error
//!   channel is not a passphrase oracle
//! - No partial plaintext is ever released on failure

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use pbkdf2::pbkdf2_hmac;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroize;

use super::keys::{SecretKey, PRIVATE_KEY_SIZE};

/// Size of the KDF salt in bytes
pub const SALT_SIZE: usize = 16;
/// Size of the AES-GCM nonce in bytes
pub const WRAP_NONCE_SIZE: usize = 12;
/// PBKDF2-SHA256 iteration count, fixed for every sealed key
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Size of the derived wrapping key in bytes (256 bits)
const KEK_SIZE: usize = 32;

/// Errors that can occur while sealing or opening a wrapped private key
#[derive(Debug, thiserror::Error)]
pub enum PassphraseError {
    #[error("passphrase error: {0}")]
    Default(#[from] anyhow::Error),
    /// Wrong passphrase or tampered blob. The two cases are deliberately
    /// not distinguished.
    #[error("could not open wrapped key: wrong passphrase or corrupted data")]
    Authentication,
    /// The blob is structurally too short to contain salt, nonce, and
    /// ciphertext.
    #[error("wrapped key blob is malformed")]
    Malformed,
}

/// A private key sealed under a passphrase, safe to persist
///
/// This is the only representation of the private key that may cross a
/// storage or network boundary.
///
/// # Wire Format
///
/// ```text
/// [ salt: 16 bytes ][ nonce: 12 bytes ][ ciphertext + GCM tag ]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrappedSecretKey {
    salt: [u8; SALT_SIZE],
    nonce: [u8; WRAP_NONCE_SIZE],
    ciphertext: Vec<u8>,
}

/// Derive the AES wrapping key from a passphrase and salt.
///
/// Deterministic for a given (passphrase, salt) pair; the iteration count
/// is fixed so blobs sealed by older builds keep opening.
fn derive_kek(passphrase: &str, salt: &[u8]) -> [u8; KEK_SIZE] {
    let mut kek = [0u8; KEK_SIZE];
    pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, PBKDF2_ITERATIONS, &mut kek);
    kek
}

impl WrappedSecretKey {
    /// Seal a private key under a passphrase.
    ///
    /// A fresh random salt and nonce are generated on every call, so
    /// sealing the same key twice yields unrelated blobs.
    ///
    /// # Errors
    ///
    /// Returns an error if the system RNG fails or encryption fails.
    pub fn seal(secret_key: &SecretKey, passphrase: &str) -> Result<Self, PassphraseError> {
        let mut salt = [0u8; SALT_SIZE];
        getrandom::getrandom(&mut salt)
            .map_err(|e| anyhow::anyhow!("failed to generate salt: {}", e))?;
        let mut nonce_bytes = [0u8; WRAP_NONCE_SIZE];
        getrandom::getrandom(&mut nonce_bytes)
            .map_err(|e| anyhow::anyhow!("failed to generate nonce: {}", e))?;

        let mut kek = derive_kek(passphrase, &salt);
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&kek));

        let mut key_bytes = secret_key.to_bytes();
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), key_bytes.as_ref())
            .map_err(|_| anyhow::anyhow!("seal error"));

        key_bytes.zeroize();
        kek.zeroize();

        Ok(Self {
            salt,
            nonce: nonce_bytes,
            ciphertext: ciphertext?,
        })
    }

    /// Open a wrapped key with the passphrase it was sealed under.
    ///
    /// # Errors
    ///
    /// Returns [`PassphraseError::Authentication`] if the passphrase is
    /// wrong or the blob was tampered with. Callers should prompt for the
    /// passphrase again rather than retry automatically.
    pub fn open(&self, passphrase: &str) -> Result<SecretKey, PassphraseError> {
        let mut kek = derive_kek(passphrase, &self.salt);
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&kek));

        let decrypted = cipher.decrypt(Nonce::from_slice(&self.nonce), self.ciphertext.as_ref());
        kek.zeroize();

        let mut key_bytes = decrypted.map_err(|_| PassphraseError::Authentication)?;
        if key_bytes.len() != PRIVATE_KEY_SIZE {
            key_bytes.zeroize();
            return Err(PassphraseError::Malformed);
        }

        let mut buff = [0u8; PRIVATE_KEY_SIZE];
        buff.copy_from_slice(&key_bytes);
        key_bytes.zeroize();

        let secret_key = SecretKey::from(buff);
        buff.zeroize();
        Ok(secret_key)
    }

    /// Serialize to the `salt || nonce || ciphertext` blob layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(SALT_SIZE + WRAP_NONCE_SIZE + self.ciphertext.len());
        out.extend_from_slice(&self.salt);
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Parse a wrapped key from the `salt || nonce || ciphertext` layout.
    ///
    /// # Errors
    ///
    /// Returns [`PassphraseError::Malformed`] if the blob is too short to
    /// contain the fixed-width fields and a GCM tag.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PassphraseError> {
        // 16 bytes is the GCM tag: an empty ciphertext is never valid
        if bytes.len() <= SALT_SIZE + WRAP_NONCE_SIZE + 16 {
            return Err(PassphraseError::Malformed);
        }

        let mut salt = [0u8; SALT_SIZE];
        salt.copy_from_slice(&bytes[..SALT_SIZE]);
        let mut nonce = [0u8; WRAP_NONCE_SIZE];
        nonce.copy_from_slice(&bytes[SALT_SIZE..SALT_SIZE + WRAP_NONCE_SIZE]);
        let ciphertext = bytes[SALT_SIZE + WRAP_NONCE_SIZE..].to_vec();

        Ok(Self {
            salt,
            nonce,
            ciphertext,
        })
    }

    /// Get the KDF salt embedded in this blob.
    pub fn salt(&self) -> &[u8; SALT_SIZE] {
        &self.salt
    }
}
