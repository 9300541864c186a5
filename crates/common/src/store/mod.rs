//! Storage collaborator interface
//!
//! The core never talks to a database directly; it goes through
//! [`VaultStore`], which persists opaque rows (ciphertext, wrapped keys,
//! membership) and nothing else. [`MemoryVaultStore`] is the in-process
//! reference implementation.

mod memory;
mod provider;

pub use memory::MemoryVaultStore;
pub use provider::VaultStore;
