//! Credential status state machines.
//!
//! Storage status: Pending, Active, Revoked. Revoked is terminal.
//! Claim status:   Claimable, Claimed, NotApplicable. Claimed is terminal.
//!
//! Valid storage transitions:
//!   Pending -> Active  (claim confirmed, or direct delivery)
//!   Pending -> Revoked (issuer revokes before claim)
//!   Active  -> Revoked
//!
//! Claim expiry is a derived predicate, never a stored state; see the claim
//! module.

use crate::error::{EngineError, EngineResult};
use crate::types::{ClaimStatus, CredentialStatus};

/// Check whether a storage-status transition is valid.
pub fn is_valid_transition(from: CredentialStatus, to: CredentialStatus) -> bool {
    matches!(
        (from, to),
        (CredentialStatus::Pending, CredentialStatus::Active)
            | (CredentialStatus::Pending, CredentialStatus::Revoked)
            | (CredentialStatus::Active, CredentialStatus::Revoked)
    )
}

/// Attempt a storage-status transition, returning the new status or an error.
pub fn transition(
    from: CredentialStatus,
    to: CredentialStatus,
) -> EngineResult<CredentialStatus> {
    if is_valid_transition(from, to) {
        Ok(to)
    } else {
        Err(EngineError::StatusTransitionDenied(format!(
            "{} -> {}",
            from, to
        )))
    }
}

/// Check whether a claim-status transition is valid.
pub fn is_valid_claim_transition(from: ClaimStatus, to: ClaimStatus) -> bool {
    matches!((from, to), (ClaimStatus::Claimable, ClaimStatus::Claimed))
}

/// Check if a credential in this status can still be revoked.
pub fn can_revoke(status: CredentialStatus) -> bool {
    matches!(
        status,
        CredentialStatus::Pending | CredentialStatus::Active
    )
}
