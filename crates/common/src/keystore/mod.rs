//! Client-side persistence for the identity key
//!
//! One named slot per device holds the member's passphrase-sealed private
//! key. [`Keystore`] drives the create / open / rotate lifecycle;
//! [`KeystoreProvider`] abstracts where the sealed blob actually lives
//! ([`DiskKeystore`] for a single file on disk, [`MemoryKeystore`] for
//! tests).

mod disk;
#[allow(clippy::module_inception)]
mod keystore;
mod memory;
mod provider;

pub use disk::DiskKeystore;
pub use keystore::{Keystore, KeystoreError};
pub use memory::MemoryKeystore;
pub use provider::KeystoreProvider;
