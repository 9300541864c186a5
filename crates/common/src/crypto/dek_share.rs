//! DEK wrapping using ECDH + AES Key Wrap
//!
//! This module implements the envelope step: encrypting a hint's DEK for
//! one specific reader, using their identity public key. It combines
//! Elliptic Curve Diffie-Hellman (ECDH) for key agreement with AES Key
//! Wrap (RFC 3394) for key encryption.
//!
//! # Protocol Overview
//!
//! To wrap a DEK for a reader:
//! 1. **Generate ephemeral keypair**: Create a temporary Ed25519 keypair
//! 2. **Perform ECDH**: Convert keys to X25519 and compute a shared secret
//! 3. **Wrap key**: Use AES-KW to encrypt the DEK with the shared secret
//! 4. **Package**: `[ephemeral_pubkey || wrapped_dek]` in one fixed-size blob
//!
//! The reader recovers the DEK by:
//! 1. **Extract ephemeral key**: Read the ephemeral public key from the blob
//! 2. **Perform ECDH**: Use their private key to compute the same shared secret
//! 3. **Unwrap key**: Use AES-KW to decrypt the DEK
//!
//! # Security Properties
//!
//! - **One-way**: a server holding every wrapped copy cannot derive the DEK
//!   without a matching private key
//! - **Integrity**: AES-KW authenticates the wrapped key, so unwrapping with
//!   the wrong private key fails deterministically instead of silently
//!   yielding wrong bytes
//! - **Independence**: each reader gets an independently wrapped copy under
//!   a fresh ephemeral key

use std::convert::TryFrom;

use aes_kw::KekAes256 as Kek;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use super::dek::{Dek, DekError, DEK_SIZE};
use super::keys::{KeyError, PublicKey, SecretKey, PUBLIC_KEY_SIZE};

/// Overhead AES Key Wrap adds to the wrapped key in bytes
pub const KW_OVERHEAD_SIZE: usize = 8;
/// Total size of a wrapped DEK blob in bytes
///
/// Layout: ephemeral_pubkey (32) || wrapped_dek (40) = 72 bytes
pub const WRAPPED_DEK_SIZE: usize = PUBLIC_KEY_SIZE + DEK_SIZE + KW_OVERHEAD_SIZE;

/// Errors that can occur while wrapping or unwrapping a DEK
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("envelope error: {0}")]
    Default(#[from] anyhow::Error),
    #[error("key error: {0}")]
    Key(#[from] KeyError),
    #[error("dek error: {0}")]
    Dek(#[from] DekError),
    /// Wrapping under the recipient's public key failed.
    #[error("could not wrap hint key for recipient")]
    Wrap,
    /// The private key does not match the key this blob was wrapped for,
    /// or the blob was corrupted. Deterministic: never wrong bytes.
    #[error("could not unwrap hint key: wrapped key rejected")]
    Unwrap,
}

/// A DEK wrapped for exactly one reader
///
/// Only the reader whose public key was used during wrapping can recover
/// the DEK. A hint shared with N readers has N of these, one per reader.
///
/// # Wire Format
///
/// ```text
/// [ ephemeral_pubkey: 32 bytes ][ wrapped_dek: 40 bytes ]
/// ```
///
/// # Examples
///
/// ```ignore
/// // Wrap a hint's DEK for one family member
/// let dek = Dek::generate()?;
/// let wrapped = WrappedDek::wrap(&dek, &member_public_key)?;
///
/// // The member recovers it with their private key
/// let recovered = wrapped.unwrap_with(&member_secret_key)?;
/// assert_eq!(dek, recovered);
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct WrappedDek(pub(crate) [u8; WRAPPED_DEK_SIZE]);

impl Serialize for WrappedDek {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for WrappedDek {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::{Error, Visitor};
        use std::fmt;

        struct WrappedDekVisitor;

        impl<'de> Visitor<'de> for WrappedDekVisitor {
            type Value = WrappedDek;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a byte array or sequence of WRAPPED_DEK_SIZE")
            }

            fn visit_bytes<E>(self, v: &[u8]) -> Result<Self::Value, E>
            where
                E: Error,
            {
                if v.len() != WRAPPED_DEK_SIZE {
                    return Err(E::invalid_length(
                        v.len(),
                        &format!("expected {} bytes", WRAPPED_DEK_SIZE).as_str(),
                    ));
                }
                let mut array = [0u8; WRAPPED_DEK_SIZE];
                array.copy_from_slice(v);
                Ok(WrappedDek(array))
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: serde::de::SeqAccess<'de>,
            {
                let mut bytes = Vec::new();
                while let Some(byte) = seq.next_element::<u8>()? {
                    bytes.push(byte);
                }
                if bytes.len() != WRAPPED_DEK_SIZE {
                    return Err(A::Error::invalid_length(
                        bytes.len(),
                        &format!("expected {} bytes", WRAPPED_DEK_SIZE).as_str(),
                    ));
                }
                let mut array = [0u8; WRAPPED_DEK_SIZE];
                array.copy_from_slice(&bytes);
                Ok(WrappedDek(array))
            }
        }

        // Try bytes first (for bincode), fall back to seq (for JSON)
        deserializer.deserialize_byte_buf(WrappedDekVisitor)
    }
}

impl Default for WrappedDek {
    fn default() -> Self {
        WrappedDek([0; WRAPPED_DEK_SIZE])
    }
}

impl From<[u8; WRAPPED_DEK_SIZE]> for WrappedDek {
    fn from(bytes: [u8; WRAPPED_DEK_SIZE]) -> Self {
        WrappedDek(bytes)
    }
}

impl From<WrappedDek> for [u8; WRAPPED_DEK_SIZE] {
    fn from(wrapped: WrappedDek) -> Self {
        wrapped.0
    }
}

impl TryFrom<&[u8]> for WrappedDek {
    type Error = EnvelopeError;
    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let buff: [u8; WRAPPED_DEK_SIZE] = bytes.try_into().map_err(|_| {
            anyhow::anyhow!(
                "wrapped dek must be {} bytes, got {}",
                WRAPPED_DEK_SIZE,
                bytes.len()
            )
        })?;
        Ok(WrappedDek(buff))
    }
}

impl WrappedDek {
    /// Parse a wrapped DEK from a hexadecimal string
    ///
    /// A leading "0x" prefix is tolerated.
    pub fn from_hex(hex: &str) -> Result<Self, EnvelopeError> {
        let hex = hex.strip_prefix("0x").unwrap_or(hex);
        let bytes =
            hex::decode(hex).map_err(|_| anyhow::anyhow!("wrapped dek is not valid hex"))?;
        Self::try_from(bytes.as_slice())
    }

    /// Convert wrapped DEK to hexadecimal string
    #[allow(clippy::wrong_self_convention)]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Wrap a DEK for a specific recipient
    ///
    /// 1. Generates an ephemeral Ed25519 keypair
    /// 2. Converts both keys to X25519 for ECDH
    /// 3. Performs ECDH to derive a shared secret
    /// 4. Uses AES-KW to wrap the DEK under the shared secret
    ///
    /// # Errors
    ///
    /// Returns an error if ephemeral key generation, key conversion, or
    /// wrapping fails.
    pub fn wrap(dek: &Dek, recipient: &PublicKey) -> Result<Self, EnvelopeError> {
        let ephemeral_private = SecretKey::generate()?;
        let ephemeral_public = ephemeral_private.public();

        let ephemeral_x25519_private = ephemeral_private.to_x25519();
        let recipient_x25519_public = recipient.to_x25519()?;

        let shared_secret = ephemeral_x25519_private.diffie_hellman(&recipient_x25519_public);

        // Use the shared secret as KEK for AES-KW
        let mut shared_secret_bytes = [0; DEK_SIZE];
        shared_secret_bytes.copy_from_slice(shared_secret.as_bytes());
        let kek = Kek::from(shared_secret_bytes);
        shared_secret_bytes.zeroize();

        let wrapped_bytes = kek.wrap_vec(dek.bytes()).map_err(|_| EnvelopeError::Wrap)?;

        // Build the blob: ephemeral_public_key || wrapped_dek
        let mut wrapped = WrappedDek::default();
        let ephemeral_bytes = ephemeral_public.to_bytes();

        // sanity check we produce exactly `WRAPPED_DEK_SIZE` bytes
        if ephemeral_bytes.len() + wrapped_bytes.len() != WRAPPED_DEK_SIZE {
            return Err(anyhow::anyhow!("wrapped dek size is incorrect").into());
        }

        wrapped.0[..PUBLIC_KEY_SIZE].copy_from_slice(&ephemeral_bytes);
        wrapped.0[PUBLIC_KEY_SIZE..PUBLIC_KEY_SIZE + wrapped_bytes.len()]
            .copy_from_slice(&wrapped_bytes);

        Ok(wrapped)
    }

    /// Recover the DEK using the recipient's private key
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Unwrap`] if this blob was wrapped for a
    /// different key, or the data was corrupted or tampered with. The
    /// failure is deterministic; wrong bytes are never returned.
    pub fn unwrap_with(&self, recipient_secret: &SecretKey) -> Result<Dek, EnvelopeError> {
        let ephemeral_public = PublicKey::try_from(&self.0[..PUBLIC_KEY_SIZE])?;

        let recipient_x25519_private = recipient_secret.to_x25519();
        let ephemeral_x25519_public = ephemeral_public.to_x25519()?;

        let shared_secret = recipient_x25519_private.diffie_hellman(&ephemeral_x25519_public);

        let mut shared_secret_bytes = *shared_secret.as_bytes();
        let kek = Kek::from(shared_secret_bytes);
        shared_secret_bytes.zeroize();

        let mut unwrapped = kek
            .unwrap_vec(&self.0[PUBLIC_KEY_SIZE..])
            .map_err(|_| EnvelopeError::Unwrap)?;

        if unwrapped.len() != DEK_SIZE {
            unwrapped.zeroize();
            return Err(EnvelopeError::Unwrap);
        }

        let dek = Dek::from_slice(&unwrapped)?;
        unwrapped.zeroize();
        Ok(dek)
    }

    /// Get a reference to the raw blob bytes
    pub fn bytes(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_wrap_unwrap_roundtrip() {
        let dek = Dek::generate().unwrap();
        let private_key = SecretKey::generate().unwrap();

        let wrapped = WrappedDek::wrap(&dek, &private_key.public()).unwrap();
        let recovered = wrapped.unwrap_with(&private_key).unwrap();

        assert_eq!(dek, recovered);
    }

    #[test]
    fn test_unwrap_with_wrong_key_fails() {
        let dek = Dek::generate().unwrap();
        let alice = SecretKey::generate().unwrap();
        let bob = SecretKey::generate().unwrap();

        let wrapped = WrappedDek::wrap(&dek, &alice.public()).unwrap();

        // Alice can recover the DEK
        assert_eq!(wrapped.unwrap_with(&alice).unwrap(), dek);

        // Bob gets a deterministic failure, never wrong bytes
        let result = wrapped.unwrap_with(&bob);
        assert!(matches!(result, Err(EnvelopeError::Unwrap)));
    }

    #[test]
    fn test_corrupted_blob_fails() {
        let dek = Dek::generate().unwrap();
        let private_key = SecretKey::generate().unwrap();

        let mut wrapped = WrappedDek::wrap(&dek, &private_key.public()).unwrap();
        wrapped.0[PUBLIC_KEY_SIZE + 3] ^= 0xFF;

        let result = wrapped.unwrap_with(&private_key);
        assert!(matches!(result, Err(EnvelopeError::Unwrap)));
    }

    #[test]
    fn test_each_wrap_is_independent() {
        // Same DEK, same recipient: fresh ephemeral keys mean unrelated blobs,
        // both of which still unwrap correctly.
        let dek = Dek::generate().unwrap();
        let private_key = SecretKey::generate().unwrap();

        let a = WrappedDek::wrap(&dek, &private_key.public()).unwrap();
        let b = WrappedDek::wrap(&dek, &private_key.public()).unwrap();

        assert_ne!(a, b);
        assert_eq!(a.unwrap_with(&private_key).unwrap(), dek);
        assert_eq!(b.unwrap_with(&private_key).unwrap(), dek);
    }

    #[test]
    fn test_hex_roundtrip() {
        let dek = Dek::generate().unwrap();
        let private_key = SecretKey::generate().unwrap();

        let wrapped = WrappedDek::wrap(&dek, &private_key.public()).unwrap();
        let hex = wrapped.to_hex();
        let parsed = WrappedDek::from_hex(&hex).unwrap();

        assert_eq!(wrapped, parsed);
        assert_eq!(parsed.unwrap_with(&private_key).unwrap(), dek);
    }

    #[test]
    fn test_serde_json_roundtrip() {
        let dek = Dek::generate().unwrap();
        let private_key = SecretKey::generate().unwrap();
        let wrapped = WrappedDek::wrap(&dek, &private_key.public()).unwrap();

        let json = serde_json::to_string(&wrapped).unwrap();
        let parsed: WrappedDek = serde_json::from_str(&json).unwrap();

        assert_eq!(wrapped, parsed);
        assert_eq!(parsed.unwrap_with(&private_key).unwrap(), dek);
    }

    #[test]
    fn test_serde_bincode_roundtrip() {
        let dek = Dek::generate().unwrap();
        let private_key = SecretKey::generate().unwrap();
        let wrapped = WrappedDek::wrap(&dek, &private_key.public()).unwrap();

        let binary = bincode::serialize(&wrapped).unwrap();
        let parsed: WrappedDek = bincode::deserialize(&binary).unwrap();

        assert_eq!(wrapped, parsed);
        assert_eq!(parsed.unwrap_with(&private_key).unwrap(), dek);
    }

    #[test]
    fn test_deserialize_invalid_length() {
        let short = vec![0u8; WRAPPED_DEK_SIZE - 1];
        let result: Result<WrappedDek, _> =
            bincode::deserialize(&bincode::serialize(&short).unwrap());
        assert!(result.is_err());

        let long = vec![0u8; WRAPPED_DEK_SIZE + 1];
        let result: Result<WrappedDek, _> =
            bincode::deserialize(&bincode::serialize(&long).unwrap());
        assert!(result.is_err());
    }
}
