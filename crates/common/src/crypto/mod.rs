//! Cryptographic primitives for Kinvault
//!
//! This module provides the cryptographic foundation for Kinvault's
//! security model:
//!
//! - **Identity**: Ed25519 keypairs for member identity
//! - **Key protection**: PBKDF2 + AES-256-GCM passphrase sealing of the
//!   private key at rest
//! - **Content encryption**: ChaCha20-Poly1305 with a per-hint DEK
//! - **Key distribution**: ECDH-based DEK wrapping using X25519 curve
//!   conversion
//!
//! # Security Model
//!
//! ## Member Identity
//! Each family member has an Ed25519 keypair (`SecretKey`/`PublicKey`)
//! that serves as their identity. The same keypair is used for DEK
//! wrapping. Only the passphrase-sealed form ([`WrappedSecretKey`]) ever
//! crosses a storage boundary.
//!
//! ## Envelope Encryption
//! Every hint is encrypted under its own [`Dek`]. The DEK is wrapped
//! independently for each authorized reader as a [`WrappedDek`], so the
//! storage backend only ever holds ciphertext and wrapped keys it cannot
//! open. Extending access means adding wrapped copies; the hint ciphertext
//! is never re-encrypted.

mod dek;
mod dek_share;
mod keys;
mod passphrase;

pub use dek::{Dek, DekError, EncryptedHint, DEK_SIZE, NONCE_SIZE};
pub use dek_share::{EnvelopeError, WrappedDek, WRAPPED_DEK_SIZE};
pub use keys::{KeyError, PublicKey, SecretKey, PRIVATE_KEY_SIZE, PUBLIC_KEY_SIZE};
pub use passphrase::{PassphraseError, WrappedSecretKey, PBKDF2_ITERATIONS, SALT_SIZE};
