//! Claim/escrow lifecycle for a single credential.
//!
//! A minted credential sits in escrow (`pending` / `claimable`) until the
//! recipient claims it: check, opt-in, transfer, finalize. Every ledger call
//! is a suspension point that may fail or time out; any failure leaves the
//! stored credential untouched, so a retry restarts from the checking step.
//!
//! Claim expiry is derived at query time from the issuance timestamp and the
//! configured claim window; it is never persisted. An expired claimable
//! credential simply stops appearing in the recipient's claimable list.

use credence_core::{Address, CredentialId, LedgerClient, Timestamp, TxnIntent};

use crate::error::{EngineError, EngineResult};
use crate::store::EntityStore;
use crate::types::{ClaimStatus, Credential, CredentialStatus};

/// UI-facing claim progress states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimStep {
    Checking,
    OptIn,
    Claiming,
    Confirmed,
    Failed,
}

/// True iff the credential is still unclaimed and its claim window has
/// elapsed. A derived, point-in-time predicate, not a stored state.
pub fn is_claim_expired(credential: &Credential, claim_window_secs: u64, now: Timestamp) -> bool {
    credential.claim_status == ClaimStatus::Claimable
        && now.seconds() > credential.issued_at.seconds() + claim_window_secs
}

/// The recipient's claimable credentials, excluding expired ones.
pub fn claimable_credentials(
    store: &EntityStore,
    recipient: &Address,
    claim_window_secs: u64,
) -> EngineResult<Vec<Credential>> {
    let now = Timestamp::now();
    Ok(store
        .credentials_by_recipient(recipient)?
        .into_iter()
        .filter(|c| {
            c.claim_status == ClaimStatus::Claimable
                && c.status != CredentialStatus::Revoked
                && !is_claim_expired(c, claim_window_secs, now)
        })
        .collect())
}

/// Drives a credential from escrow to recipient-owned.
pub struct ClaimFlow<'a> {
    store: &'a EntityStore,
    ledger: &'a dyn LedgerClient,
    claim_window_secs: u64,
}

impl<'a> ClaimFlow<'a> {
    pub fn new(store: &'a EntityStore, ledger: &'a dyn LedgerClient, claim_window_secs: u64) -> Self {
        Self {
            store,
            ledger,
            claim_window_secs,
        }
    }

    /// Claim a credential for `recipient`.
    pub fn claim(&self, id: &CredentialId, recipient: &Address) -> EngineResult<Credential> {
        self.claim_with_progress(id, recipient, |_| {})
    }

    /// Claim with a step callback for live UI updates. The callback observes
    /// Checking -> OptIn -> Claiming -> Confirmed, or Failed as the final
    /// step on any error.
    pub fn claim_with_progress(
        &self,
        id: &CredentialId,
        recipient: &Address,
        mut on_step: impl FnMut(ClaimStep),
    ) -> EngineResult<Credential> {
        match self.run_claim(id, recipient, &mut on_step) {
            Ok(credential) => {
                on_step(ClaimStep::Confirmed);
                Ok(credential)
            }
            Err(err) => {
                tracing::warn!(id = %id, error = %err, "claim failed");
                on_step(ClaimStep::Failed);
                Err(err)
            }
        }
    }

    fn run_claim(
        &self,
        id: &CredentialId,
        recipient: &Address,
        on_step: &mut impl FnMut(ClaimStep),
    ) -> EngineResult<Credential> {
        on_step(ClaimStep::Checking);
        let credential = self
            .store
            .credential(id)?
            .ok_or(EngineError::CredentialNotFound)?;
        if &credential.recipient_address != recipient {
            return Err(EngineError::Unauthorized);
        }
        if credential.status == CredentialStatus::Revoked {
            // Revocation invalidates the credential even while it still
            // carries a claimable claim status.
            return Err(EngineError::NotClaimable);
        }
        if credential.claim_status != ClaimStatus::Claimable {
            return Err(EngineError::NotClaimable);
        }
        if is_claim_expired(&credential, self.claim_window_secs, Timestamp::now()) {
            return Err(EngineError::ClaimExpired);
        }

        // Reserve the id before any ledger traffic; a concurrent claim for
        // the same credential conflicts here instead of double-submitting
        // the transfer.
        self.store.begin_claim(id)?;
        match self.transfer(&credential, recipient, on_step) {
            Ok(()) => self.store.finalize_claim(id),
            Err(err) => {
                if let Err(release_err) = self.store.abort_claim(id) {
                    tracing::warn!(id = %id, error = %release_err, "failed to release claim reservation");
                }
                Err(err)
            }
        }
    }

    fn transfer(
        &self,
        credential: &Credential,
        recipient: &Address,
        on_step: &mut impl FnMut(ClaimStep),
    ) -> EngineResult<()> {
        on_step(ClaimStep::OptIn);
        if !self.ledger.is_opted_in(recipient, credential.asa_id)? {
            tracing::debug!(id = %credential.id, asset = %credential.asa_id, "submitting opt-in");
            self.ledger.sign_and_submit(&TxnIntent::AssetOptIn {
                address: recipient.clone(),
                asset: credential.asa_id,
            })?;
        }

        on_step(ClaimStep::Claiming);
        self.ledger.sign_and_submit(&TxnIntent::AssetTransfer {
            asset: credential.asa_id,
            recipient: recipient.clone(),
        })?;
        Ok(())
    }
}
