//! Vault data structures and operations
//!
//! This module defines the row shapes the storage collaborator persists
//! and the operations the request-handling boundary consumes:
//!
//! - **[`HintRecord`]**: one encrypted hint plus routing metadata
//! - **[`WrappedDekEntry`]**: one reader's wrapped copy of a hint's DEK
//! - **[`GroupMembership`]**: who is eligible to receive entries
//! - **[`Vault`]**: create / read / extend operations
//! - **re-keying**: the protocol that fans wrapped entries out to a newly
//!   joined member ([`OwnershipClaim`], [`RekeyReport`],
//!   [`PartialRekeyFailure`])
//!
//! # Architecture
//!
//! ## Envelope model
//!
//! ```text
//! HintRecord (ciphertext) <--- DEK ---> WrappedDekEntry (per reader)
//!                                |
//!              wrapped under each reader's public key
//! ```
//!
//! The hint body is encrypted once under its DEK; access is granted by
//! adding wrapped copies of the DEK, never by re-encrypting the body. The
//! storage collaborator holds only ciphertext, wrapped keys, and
//! membership rows.

mod records;
mod rekey;
#[allow(clippy::module_inception)]
mod vault;

pub use records::{GroupMembership, HintRecord, WrappedDekEntry};
pub use rekey::{
    OwnershipClaim, PartialRekeyFailure, RekeyItemError, RekeyPhase, RekeyReport,
};
pub use vault::{Vault, VaultError};
