//! # Records
//!
//! The persisted row shapes the storage collaborator holds on behalf of
//! the core. None of them contain plaintext:
//!
//! - [`HintRecord`]: one secret hint — opaque ciphertext plus routing
//!   metadata (owner, family group, display label)
//! - [`WrappedDekEntry`]: one (hint, reader) pair — the hint's DEK wrapped
//!   for that reader
//! - [`GroupMembership`]: one (group, member) pair — who is eligible to
//!   receive wrapped entries for the group's hints
//!
//! ## Trust Model
//!
//! Members are identified by their public key; stored maps key rows by the
//! hex encoding of that key. Row-level authorization is the storage
//! collaborator's responsibility — these types only make the rows
//! unambiguous.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::{EncryptedHint, PublicKey, WrappedDek};

/// A stored secret hint
///
/// The body is AEAD ciphertext under the hint's DEK; the label is the one
/// piece of plaintext metadata ("bank-pin-hint") members see in lists
/// before unlocking anything.
///
/// # Invariant
///
/// A hint with N authorized readers has exactly N [`WrappedDekEntry`] rows,
/// and the owner's entry exists from the moment the hint is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HintRecord {
    id: Uuid,
    label: String,
    owner: PublicKey,
    group_id: Uuid,
    body: EncryptedHint,
}

impl HintRecord {
    /// Create a new hint record.
    pub fn new(
        id: Uuid,
        label: String,
        owner: PublicKey,
        group_id: Uuid,
        body: EncryptedHint,
    ) -> Self {
        Self {
            id,
            label,
            owner,
            group_id,
            body,
        }
    }

    /// Get the hint's unique identifier.
    pub fn id(&self) -> &Uuid {
        &self.id
    }

    /// Get the plaintext display label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Get the owner's public key.
    pub fn owner(&self) -> &PublicKey {
        &self.owner
    }

    /// Get the family group this hint is shared with.
    pub fn group_id(&self) -> &Uuid {
        &self.group_id
    }

    /// Get the encrypted hint body.
    pub fn body(&self) -> &EncryptedHint {
        &self.body
    }

    /// Replace the encrypted body (a hint edit is a full replacement
    /// under the same DEK).
    pub fn set_body(&mut self, body: EncryptedHint) {
        self.body = body;
    }
}

/// One reader's wrapped copy of a hint's DEK
///
/// Keyed by `(hint_id, recipient)`; the storage collaborator must treat
/// writes to that key as a single atomic upsert so racing re-key attempts
/// for the same pair cannot interleave.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrappedDekEntry {
    /// The hint this entry grants access to.
    pub hint_id: Uuid,
    /// The reader this copy was wrapped for.
    pub recipient: PublicKey,
    /// The DEK, wrapped under the recipient's public key.
    pub wrapped_dek: WrappedDek,
}

impl WrappedDekEntry {
    /// Create a new entry.
    pub fn new(hint_id: Uuid, recipient: PublicKey, wrapped_dek: WrappedDek) -> Self {
        Self {
            hint_id,
            recipient,
            wrapped_dek,
        }
    }

    /// The storage key this row is upserted under.
    pub fn key(&self) -> (Uuid, String) {
        (self.hint_id, self.recipient.to_hex())
    }
}

/// Membership of one member in one family group
///
/// Defines who is *eligible* to receive [`WrappedDekEntry`] rows for the
/// group's hints. Membership alone grants nothing; access arrives when the
/// re-keying protocol adds the wrapped entries. Rows are never removed
/// automatically when membership shrinks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMembership {
    /// The family group.
    pub group_id: Uuid,
    /// The member's identity.
    pub member: PublicKey,
}

impl GroupMembership {
    /// Create a new membership row.
    pub fn new(group_id: Uuid, member: PublicKey) -> Self {
        Self { group_id, member }
    }
}
