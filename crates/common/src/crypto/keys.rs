use std::ops::Deref;

use curve25519_dalek::edwards::CompressedEdwardsY;
use ed25519_dalek::{SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};

/// Size of an Ed25519 private key in bytes
pub const PRIVATE_KEY_SIZE: usize = 32;
/// Size of an Ed25519 public key in bytes
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Errors that can occur during key operations
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("key error: {0}")]
    Default(#[from] anyhow::Error),
    /// The system entropy source failed while generating a key pair.
    /// Fatal: there is no sensible retry with the same inputs.
    #[error("key generation failed: system entropy unavailable")]
    Generation,
}

/// Public half of a member's identity key pair
///
/// Identifies a family member and is handed to anyone who needs to wrap a
/// hint key for that member. The key serves two purposes:
/// - **Identity**: members are addressed by their public key (hex-encoded
///   in stored rows)
/// - **Key wrapping**: converted to X25519 for the ECDH step of the
///   envelope protocol
///
/// Public keys are not secret and may be stored or transmitted freely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey(VerifyingKey);

impl Deref for PublicKey {
    type Target = VerifyingKey;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::hash::Hash for PublicKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.as_bytes().hash(state);
    }
}

impl From<VerifyingKey> for PublicKey {
    fn from(key: VerifyingKey) -> Self {
        PublicKey(key)
    }
}

impl TryFrom<&[u8]> for PublicKey {
    type Error = KeyError;
    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let buff: [u8; PUBLIC_KEY_SIZE] = bytes.try_into().map_err(|_| {
            anyhow::anyhow!(
                "public key must be {} bytes, got {}",
                PUBLIC_KEY_SIZE,
                bytes.len()
            )
        })?;
        Self::from_bytes(&buff)
    }
}

impl PublicKey {
    /// Construct a public key from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes do not encode a valid Ed25519 point.
    pub fn from_bytes(bytes: &[u8; PUBLIC_KEY_SIZE]) -> Result<Self, KeyError> {
        let key = VerifyingKey::from_bytes(bytes)
            .map_err(|_| anyhow::anyhow!("invalid public key bytes"))?;
        Ok(PublicKey(key))
    }

    /// Parse a public key from a hexadecimal string
    ///
    /// A leading "0x" prefix is tolerated.
    pub fn from_hex(hex: &str) -> Result<Self, KeyError> {
        let hex = hex.strip_prefix("0x").unwrap_or(hex);
        let bytes =
            hex::decode(hex).map_err(|_| anyhow::anyhow!("public key is not valid hex"))?;
        Self::try_from(bytes.as_slice())
    }

    /// Convert public key to raw bytes
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        *self.0.as_bytes()
    }

    /// Convert public key to hexadecimal string
    ///
    /// This is the interchange format used to key stored rows.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Convert Ed25519 public key to X25519 (Montgomery curve) for ECDH
    ///
    /// The envelope protocol performs Elliptic Curve Diffie-Hellman (ECDH)
    /// to establish a shared wrapping key. Ed25519 lives on the Edwards
    /// curve, while ECDH requires the Montgomery curve (X25519).
    ///
    /// # Errors
    ///
    /// Returns an error if the Ed25519 point cannot be converted (invalid point).
    #[allow(clippy::wrong_self_convention)]
    pub(crate) fn to_x25519(&self) -> Result<X25519PublicKey, KeyError> {
        let edwards = CompressedEdwardsY::from_slice(self.0.as_bytes())
            .map_err(|_| anyhow::anyhow!("public key is not a valid edwards encoding"))?
            .decompress()
            .ok_or_else(|| anyhow::anyhow!("public key edwards point does not decompress"))?;

        Ok(X25519PublicKey::from(edwards.to_montgomery().to_bytes()))
    }
}

/// Private half of a member's identity key pair
///
/// Decrypts hint keys that were wrapped for this member. The raw key must
/// never leave the owning member's device: it crosses a storage boundary
/// only inside a [`WrappedSecretKey`](super::WrappedSecretKey), sealed
/// under the member's passphrase.
///
/// # Examples
///
/// ```ignore
/// // Generate a new identity
/// let secret_key = SecretKey::generate()?;
/// let public_key = secret_key.public();
///
/// // Seal under a passphrase before anything touches disk
/// let wrapped = WrappedSecretKey::seal(&secret_key, "correct horse")?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretKey(SigningKey);

impl From<[u8; PRIVATE_KEY_SIZE]> for SecretKey {
    fn from(secret: [u8; PRIVATE_KEY_SIZE]) -> Self {
        Self(SigningKey::from_bytes(&secret))
    }
}

impl Deref for SecretKey {
    type Target = SigningKey;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl SecretKey {
    /// Generate a new random secret key using a cryptographically secure RNG
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Generation`] if the system entropy source fails.
    pub fn generate() -> Result<Self, KeyError> {
        let mut bytes = [0u8; PRIVATE_KEY_SIZE];
        getrandom::getrandom(&mut bytes).map_err(|_| KeyError::Generation)?;
        Ok(Self::from(bytes))
    }

    /// Parse a secret key from a hexadecimal string
    ///
    /// A leading "0x" prefix is tolerated.
    pub fn from_hex(hex: &str) -> Result<Self, KeyError> {
        let hex = hex.strip_prefix("0x").unwrap_or(hex);
        let bytes =
            hex::decode(hex).map_err(|_| anyhow::anyhow!("private key is not valid hex"))?;
        let buff: [u8; PRIVATE_KEY_SIZE] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| anyhow::anyhow!("private key must be {} bytes", PRIVATE_KEY_SIZE))?;
        Ok(Self::from(buff))
    }

    /// Derive the public key from this secret key
    pub fn public(&self) -> PublicKey {
        PublicKey(self.0.verifying_key())
    }

    /// Convert secret key to raw bytes
    pub fn to_bytes(&self) -> [u8; PRIVATE_KEY_SIZE] {
        self.0.to_bytes()
    }

    /// Convert secret key to hexadecimal string
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Encode secret key in PEM format
    ///
    /// Returns a PEM-encoded string with tag "PRIVATE KEY". Intended for
    /// in-process interchange only; persistence goes through
    /// [`WrappedSecretKey`](super::WrappedSecretKey).
    pub fn to_pem(&self) -> String {
        let pem = pem::Pem::new("PRIVATE KEY", self.to_bytes());
        pem::encode(&pem)
    }

    /// Parse a secret key from PEM format
    ///
    /// # Errors
    ///
    /// Returns an error if the PEM is malformed, carries a tag other than
    /// "PRIVATE KEY", or holds the wrong number of bytes.
    pub fn from_pem(pem_str: &str) -> Result<Self, KeyError> {
        let pem = pem::parse(pem_str).map_err(|e| anyhow::anyhow!("PEM parse error: {}", e))?;

        if pem.tag() != "PRIVATE KEY" {
            return Err(anyhow::anyhow!("unexpected PEM tag {:?}", pem.tag()).into());
        }

        let buff: [u8; PRIVATE_KEY_SIZE] = pem.contents().try_into().map_err(|_| {
            anyhow::anyhow!(
                "private key PEM holds {} bytes, want {}",
                pem.contents().len(),
                PRIVATE_KEY_SIZE
            )
        })?;
        Ok(Self::from(buff))
    }

    /// Convert Ed25519 secret key to X25519 (Montgomery curve) for ECDH
    ///
    /// The clamped scalar of the Ed25519 key doubles as the X25519 private
    /// key for the envelope protocol.
    pub(crate) fn to_x25519(&self) -> StaticSecret {
        StaticSecret::from(self.0.to_scalar_bytes())
    }
}
