//! # Group re-keying
//!
//! When a new member joins a family group, every hint already shared with
//! that group needs one more [`WrappedDekEntry`] — the hint's DEK wrapped
//! for the new member. This module orchestrates that fan-out:
//!
//! ```text
//! Pending -> Authorizing -> Rewrapping -> Committed | Failed
//! ```
//!
//! Per hint: unwrap the owner's own entry with the session key, wrap the
//! recovered DEK for the new member, upsert the result keyed by
//! `(hint_id, recipient)`. Hint ciphertext is never touched, which is what
//! makes group growth cheap — O(shared hints) asymmetric operations, zero
//! re-encryption.
//!
//! ## Failure model
//!
//! Hints are re-keyed independently and concurrently. One hint failing
//! (missing row, store fault) never rolls back the others; the run always
//! produces a [`RekeyReport`] listing exactly which hints succeeded and
//! which failed, and failed hints can be retried alone — the upsert makes
//! retries idempotent. `Failed` is reserved for runs that could not start
//! at all (locked session).

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::future::join_all;
use uuid::Uuid;

use super::records::WrappedDekEntry;
use crate::crypto::{PublicKey, WrappedDek};
use crate::session::KeySession;
use crate::store::VaultStore;

/// Authorization to extend access to one hint
///
/// Issued by the boundary after it has checked that the calling user owns
/// the hint; the protocol refuses to touch any hint it has no claim for,
/// and re-checks the claim against the stored row and the session
/// identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnershipClaim {
    hint_id: Uuid,
    owner: PublicKey,
}

impl OwnershipClaim {
    pub fn new(hint_id: Uuid, owner: PublicKey) -> Self {
        Self { hint_id, owner }
    }

    pub fn hint_id(&self) -> &Uuid {
        &self.hint_id
    }

    pub fn owner(&self) -> &PublicKey {
        &self.owner
    }
}

/// Lifecycle of one re-key run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RekeyPhase {
    /// Run constructed, nothing checked yet.
    Pending,
    /// Verifying the session identity against the claims.
    Authorizing,
    /// Per-hint rewraps in flight.
    Rewrapping,
    /// Run finished; the report says how much of it succeeded.
    Committed,
    /// The run could not start; no rewrap was attempted.
    Failed,
}

/// Why one hint's rewrap step failed
///
/// Carried per hint in the [`RekeyReport`]; message strings are kept so
/// the report stays `Clone` without dragging source errors along.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RekeyItemError {
    /// The claim (or the stored row) does not name the session identity
    /// as owner.
    #[error("claim does not match the hint's owner")]
    NotOwner,
    #[error("hint not found")]
    HintNotFound,
    /// The owner has no wrapped entry to recover the DEK from. Should be
    /// impossible for a hint created through this crate.
    #[error("owner has no wrapped key for this hint")]
    OwnerEntryMissing,
    #[error("session is locked")]
    SessionLocked,
    #[error("could not recover the hint key: {0}")]
    Unwrap(String),
    #[error("could not wrap the hint key for the new member: {0}")]
    Wrap(String),
    #[error("store error: {0}")]
    Store(String),
}

/// Outcome of a re-key run
///
/// Always a partial-success summary, never all-or-nothing: the hint set
/// can be large and membership changes must make forward progress.
#[derive(Debug, Clone)]
pub struct RekeyReport {
    phase: RekeyPhase,
    succeeded: Vec<Uuid>,
    failed: Vec<(Uuid, RekeyItemError)>,
}

impl RekeyReport {
    /// Terminal phase of the run (`Committed` or `Failed`).
    pub fn phase(&self) -> RekeyPhase {
        self.phase
    }

    /// Hints whose new wrapped entry was written.
    pub fn succeeded(&self) -> &[Uuid] {
        &self.succeeded
    }

    /// Hints that failed, with the reason; retriable individually.
    pub fn failed(&self) -> &[(Uuid, RekeyItemError)] {
        &self.failed
    }

    /// Number of hints the run was asked to re-key.
    pub fn attempted(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Member-facing summary line: "N of M hints updated for new member".
    pub fn summary(&self) -> String {
        format!(
            "{} of {} hints updated for new member",
            self.succeeded.len(),
            self.attempted()
        )
    }

    /// Convert into a result, so callers that want an error channel get
    /// the typed [`PartialRekeyFailure`] instead of a silently dropped
    /// list.
    pub fn into_result(self) -> Result<Vec<Uuid>, PartialRekeyFailure> {
        if self.failed.is_empty() {
            Ok(self.succeeded)
        } else {
            Err(PartialRekeyFailure {
                succeeded: self.succeeded,
                failed: self.failed,
            })
        }
    }
}

/// One or more per-hint rewrap steps failed during group extension
///
/// The failed list is never dropped; retry those ids alone once the cause
/// is fixed — successful hints do not need re-running.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{} of {} hints updated for new member; {} failed",
    succeeded.len(), succeeded.len() + failed.len(), failed.len())]
pub struct PartialRekeyFailure {
    pub succeeded: Vec<Uuid>,
    pub failed: Vec<(Uuid, RekeyItemError)>,
}

/// Phase tracker for one run. Transitions are traced so a stuck or failed
/// run can be located in logs.
struct RekeyRun {
    phase: RekeyPhase,
}

impl RekeyRun {
    fn new() -> Self {
        Self {
            phase: RekeyPhase::Pending,
        }
    }

    fn advance(&mut self, next: RekeyPhase) {
        tracing::trace!(from = ?self.phase, to = ?next, "re-key phase");
        self.phase = next;
    }
}

/// Execute one re-key run: wrap the DEK of every claimed hint for
/// `new_member` and upsert the entries.
pub(super) async fn run(
    store: &Arc<dyn VaultStore>,
    session: &KeySession,
    claims: Vec<OwnershipClaim>,
    new_member: &PublicKey,
) -> RekeyReport {
    let mut rekey = RekeyRun::new();

    rekey.advance(RekeyPhase::Authorizing);
    let identity = match session.identity() {
        Ok(identity) => identity,
        Err(_) => {
            // Nothing was attempted; every claim is reported so the caller
            // can retry the whole batch after unlocking.
            rekey.advance(RekeyPhase::Failed);
            return RekeyReport {
                phase: rekey.phase,
                succeeded: Vec::new(),
                failed: claims
                    .into_iter()
                    .map(|claim| (claim.hint_id, RekeyItemError::SessionLocked))
                    .collect(),
            };
        }
    };

    // A retry list sometimes repeats ids; one attempt per hint is enough
    // since the upsert overwrites anyway.
    let mut seen = BTreeSet::new();
    let claims: Vec<_> = claims
        .into_iter()
        .filter(|claim| seen.insert(claim.hint_id))
        .collect();

    tracing::debug!(
        hints = claims.len(),
        member = %new_member.to_hex(),
        "starting re-key run"
    );

    rekey.advance(RekeyPhase::Rewrapping);
    let results = join_all(claims.into_iter().map(|claim| {
        let store = store.clone();
        async move {
            let hint_id = claim.hint_id;
            rewrap_one(&store, session, &identity, claim, new_member)
                .await
                .map(|_| hint_id)
                .map_err(|e| (hint_id, e))
        }
    }))
    .await;

    let mut succeeded = Vec::new();
    let mut failed = Vec::new();
    for result in results {
        match result {
            Ok(hint_id) => succeeded.push(hint_id),
            Err(item) => failed.push(item),
        }
    }

    rekey.advance(RekeyPhase::Committed);
    if failed.is_empty() {
        tracing::info!(
            hints = succeeded.len(),
            member = %new_member.to_hex(),
            "re-key run complete"
        );
    } else {
        tracing::warn!(
            succeeded = succeeded.len(),
            failed = failed.len(),
            member = %new_member.to_hex(),
            "re-key run partially failed"
        );
    }

    RekeyReport {
        phase: rekey.phase,
        succeeded,
        failed,
    }
}

/// Re-key a single hint. Independent of every other hint in the run.
async fn rewrap_one(
    store: &Arc<dyn VaultStore>,
    session: &KeySession,
    identity: &PublicKey,
    claim: OwnershipClaim,
    new_member: &PublicKey,
) -> Result<(), RekeyItemError> {
    if claim.owner != *identity {
        return Err(RekeyItemError::NotOwner);
    }

    let hint = store
        .get_hint(claim.hint_id)
        .await
        .map_err(|e| RekeyItemError::Store(e.to_string()))?
        .ok_or(RekeyItemError::HintNotFound)?;

    if hint.owner() != identity {
        return Err(RekeyItemError::NotOwner);
    }

    let own_entry = store
        .get_wrapped_dek(claim.hint_id, identity)
        .await
        .map_err(|e| RekeyItemError::Store(e.to_string()))?
        .ok_or(RekeyItemError::OwnerEntryMissing)?;

    // Borrow the session key once, synchronously: unwrap our own entry and
    // immediately wrap the DEK for the new member. The DEK drops (and
    // zeroizes) before anything is awaited.
    let wrapped = session
        .with_key(|key| {
            let dek = own_entry
                .wrapped_dek
                .unwrap_with(key)
                .map_err(|e| RekeyItemError::Unwrap(e.to_string()))?;
            WrappedDek::wrap(&dek, new_member).map_err(|e| RekeyItemError::Wrap(e.to_string()))
        })
        .map_err(|_| RekeyItemError::SessionLocked)??;

    store
        .upsert_wrapped_dek(WrappedDekEntry::new(claim.hint_id, *new_member, wrapped))
        .await
        .map_err(|e| RekeyItemError::Store(e.to_string()))?;

    tracing::debug!(hint = %claim.hint_id, member = %new_member.to_hex(), "hint re-keyed");
    Ok(())
}
