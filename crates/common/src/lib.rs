/**
 * Cryptographic types and operations.
 *  - Identity key pair + passphrase sealing
 *  - Per-hint DEK cipher
 *  - Key-to-key DEK wrapping
 */
pub mod crypto;
/**
 * Client-side persistence for the sealed
 *  identity key: one named slot per device,
 *  with memory and single-file backends.
 */
pub mod keystore;
/**
 * In-memory lifecycle of the unlocked key:
 *  explicit session object with lock/unlock
 *  and an auth-state observer interface.
 */
pub mod session;
/**
 * Storage collaborator interface.
 *  The vault's rows (ciphertext, wrapped keys,
 *  membership) behind an async trait; the core
 *  never reads or writes plaintext through it.
 */
pub mod store;
/**
 * Shared fixtures for unit and integration
 *  tests.
 */
pub mod testkit;
/**
 * Vault records and operations: create/read
 *  hints, and the group re-keying protocol
 *  that extends access to new members.
 */
pub mod vault;

pub mod prelude {
    pub use crate::crypto::{PublicKey, SecretKey, WrappedSecretKey};
    pub use crate::keystore::{DiskKeystore, Keystore, KeystoreError};
    pub use crate::session::{KeySession, SessionEvent};
    pub use crate::store::{MemoryVaultStore, VaultStore};
    pub use crate::vault::{OwnershipClaim, RekeyReport, Vault, VaultError};
}
