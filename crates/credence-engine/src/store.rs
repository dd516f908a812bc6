//! Canonical entity collections.
//!
//! The EntityStore is the single mutation boundary for the whole engine:
//! every component reads through it and mutates only via its operations.
//! It is constructed explicitly and passed by reference (no module-level
//! singleton), so each process or test owns its own lifecycle.
//!
//! Collections preserve insertion order. The store performs no uniqueness
//! validation on append; callers generate collision-resistant ids.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use credence_core::{Address, ApplicationId, CredentialId, CredentialTypeId, Timestamp};

use crate::error::{EngineError, EngineResult};
use crate::status;
use crate::types::{
    ApplicationStatus, ClaimStatus, CompositionRule, Credential, CredentialStatus, CredentialType,
    GovernanceAction, GovernanceApplication, Issuer, IssuerStatus, RuleStatus, TypeStatus,
};

#[derive(Default)]
struct StoreInner {
    issuers: Vec<Issuer>,
    credential_types: Vec<CredentialType>,
    credentials: Vec<Credential>,
    rules: Vec<CompositionRule>,
    applications: Vec<GovernanceApplication>,
    actions: Vec<GovernanceAction>,
    /// Credential ids with a claim currently between reservation and
    /// finalize/abort. Guards against a second transfer being submitted
    /// while the first is still talking to the ledger.
    claims_in_flight: HashSet<CredentialId>,
}

pub struct EntityStore {
    inner: Mutex<StoreInner>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StoreInner::default()),
        }
    }

    fn lock(&self) -> EngineResult<MutexGuard<'_, StoreInner>> {
        self.inner
            .lock()
            .map_err(|e| EngineError::Internal(format!("store lock poisoned: {}", e)))
    }

    // -----------------------------------------------------------------------
    // Appends
    // -----------------------------------------------------------------------

    pub fn add_issuer(&self, issuer: Issuer) -> EngineResult<()> {
        tracing::debug!(address = %issuer.address, name = %issuer.name, "adding issuer");
        self.lock()?.issuers.push(issuer);
        Ok(())
    }

    pub fn add_credential_type(&self, ctype: CredentialType) -> EngineResult<()> {
        tracing::debug!(id = %ctype.id, issuer = %ctype.issuer_address, "adding credential type");
        self.lock()?.credential_types.push(ctype);
        Ok(())
    }

    /// Append a credential and bump the issuer's issued counter.
    pub fn add_credential(&self, credential: Credential) -> EngineResult<()> {
        tracing::debug!(
            id = %credential.id,
            recipient = %credential.recipient_address,
            "adding credential"
        );
        let mut inner = self.lock()?;
        if let Some(issuer) = inner
            .issuers
            .iter_mut()
            .find(|i| i.address == credential.issuer_address)
        {
            issuer.total_issued += 1;
        }
        inner.credentials.push(credential);
        Ok(())
    }

    /// Append a composition rule after validating its shape: at least two
    /// required types, and the composite type must not be one of them.
    pub fn add_composition_rule(&self, rule: CompositionRule) -> EngineResult<()> {
        if rule.required_credential_type_ids.len() < 2 {
            return Err(EngineError::InvalidRule(
                "a composition rule requires at least two credential types".into(),
            ));
        }
        if rule
            .required_credential_type_ids
            .contains(&rule.composite_credential_type_id)
        {
            return Err(EngineError::InvalidRule(
                "composite credential type must not appear in the required set".into(),
            ));
        }
        tracing::debug!(id = %rule.id, name = %rule.name, "adding composition rule");
        self.lock()?.rules.push(rule);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Queries (all return clones; the store owns the canonical records)
    // -----------------------------------------------------------------------

    pub fn credential(&self, id: &CredentialId) -> EngineResult<Option<Credential>> {
        Ok(self
            .lock()?
            .credentials
            .iter()
            .find(|c| &c.id == id)
            .cloned())
    }

    pub fn credentials_by_recipient(&self, address: &Address) -> EngineResult<Vec<Credential>> {
        Ok(self
            .lock()?
            .credentials
            .iter()
            .filter(|c| &c.recipient_address == address)
            .cloned()
            .collect())
    }

    pub fn credentials_by_issuer(&self, address: &Address) -> EngineResult<Vec<Credential>> {
        Ok(self
            .lock()?
            .credentials
            .iter()
            .filter(|c| &c.issuer_address == address)
            .cloned()
            .collect())
    }

    pub fn credential_type(
        &self,
        id: &CredentialTypeId,
    ) -> EngineResult<Option<CredentialType>> {
        Ok(self
            .lock()?
            .credential_types
            .iter()
            .find(|t| &t.id == id)
            .cloned())
    }

    pub fn credential_types_by_issuer(
        &self,
        address: &Address,
    ) -> EngineResult<Vec<CredentialType>> {
        Ok(self
            .lock()?
            .credential_types
            .iter()
            .filter(|t| &t.issuer_address == address)
            .cloned()
            .collect())
    }

    /// Active credential types owned by an issuer — the set a batch upload is
    /// allowed to reference.
    pub fn active_types_for_issuer(
        &self,
        address: &Address,
    ) -> EngineResult<Vec<CredentialType>> {
        Ok(self
            .lock()?
            .credential_types
            .iter()
            .filter(|t| &t.issuer_address == address && t.status == TypeStatus::Active)
            .cloned()
            .collect())
    }

    pub fn active_rules(&self) -> EngineResult<Vec<CompositionRule>> {
        Ok(self
            .lock()?
            .rules
            .iter()
            .filter(|r| r.status == RuleStatus::Active)
            .cloned()
            .collect())
    }

    pub fn issuer_by_address(&self, address: &Address) -> EngineResult<Option<Issuer>> {
        Ok(self
            .lock()?
            .issuers
            .iter()
            .find(|i| &i.address == address)
            .cloned())
    }

    /// True iff an issuer record exists with this address AND is active.
    /// Suspended and revoked issuers are not authorized; their previously
    /// issued credentials remain in the store unaffected.
    pub fn is_authorized_issuer(&self, address: &Address) -> EngineResult<bool> {
        Ok(self
            .lock()?
            .issuers
            .iter()
            .any(|i| &i.address == address && i.status == IssuerStatus::Active))
    }

    pub fn credential_count(&self) -> EngineResult<usize> {
        Ok(self.lock()?.credentials.len())
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Mark a credential revoked. Re-revoking an already-revoked credential
    /// is a no-op that preserves the original timestamp and reason.
    pub fn revoke_credential(
        &self,
        id: &CredentialId,
        reason: impl Into<String>,
    ) -> EngineResult<Credential> {
        let mut inner = self.lock()?;
        let position = inner
            .credentials
            .iter()
            .position(|c| &c.id == id)
            .ok_or(EngineError::CredentialNotFound)?;

        if !status::can_revoke(inner.credentials[position].status) {
            tracing::debug!(id = %id, "credential already revoked, no-op");
            return Ok(inner.credentials[position].clone());
        }

        let new_status =
            status::transition(inner.credentials[position].status, CredentialStatus::Revoked)?;
        let issuer_address = inner.credentials[position].issuer_address.clone();

        let credential = &mut inner.credentials[position];
        credential.status = new_status;
        credential.revoked_at = Some(Timestamp::now());
        credential.revocation_reason = Some(reason.into());
        let updated = credential.clone();

        if let Some(issuer) = inner
            .issuers
            .iter_mut()
            .find(|i| i.address == issuer_address)
        {
            issuer.total_revoked += 1;
        }
        tracing::debug!(id = %id, "credential revoked");
        Ok(updated)
    }

    pub fn set_issuer_status(
        &self,
        address: &Address,
        new_status: IssuerStatus,
    ) -> EngineResult<Issuer> {
        let mut inner = self.lock()?;
        let issuer = inner
            .issuers
            .iter_mut()
            .find(|i| &i.address == address)
            .ok_or(EngineError::IssuerNotFound)?;
        issuer.status = new_status;
        Ok(issuer.clone())
    }

    /// Reserve a credential for an in-flight claim, before any ledger
    /// traffic. The revocation and claimable checks and the reservation are
    /// one atomic step; a second reservation for the same id fails with
    /// ClaimConflict until the first claim is finalized or aborted. Returns
    /// a snapshot of the reserved credential.
    pub fn begin_claim(&self, id: &CredentialId) -> EngineResult<Credential> {
        let mut inner = self.lock()?;
        let credential = inner
            .credentials
            .iter()
            .find(|c| &c.id == id)
            .cloned()
            .ok_or(EngineError::CredentialNotFound)?;

        if credential.status == CredentialStatus::Revoked {
            return Err(EngineError::NotClaimable);
        }
        if !status::is_valid_claim_transition(credential.claim_status, ClaimStatus::Claimed) {
            return Err(EngineError::NotClaimable);
        }
        if !inner.claims_in_flight.insert(id.clone()) {
            return Err(EngineError::ClaimConflict);
        }
        tracing::debug!(id = %id, "claim reserved");
        Ok(credential)
    }

    /// Release a claim reservation after a failed attempt. The stored
    /// credential is untouched, so a retry restarts from checking.
    pub fn abort_claim(&self, id: &CredentialId) -> EngineResult<()> {
        self.lock()?.claims_in_flight.remove(id);
        Ok(())
    }

    /// Atomically finalize a claim: the revocation and claimable checks and
    /// the flip to claimed happen under one lock acquisition, so two racing
    /// claims cannot both finalize. Clears the id's reservation.
    pub fn finalize_claim(&self, id: &CredentialId) -> EngineResult<Credential> {
        let mut inner = self.lock()?;
        inner.claims_in_flight.remove(id);
        let credential = inner
            .credentials
            .iter_mut()
            .find(|c| &c.id == id)
            .ok_or(EngineError::CredentialNotFound)?;

        if credential.status == CredentialStatus::Revoked {
            return Err(EngineError::NotClaimable);
        }
        if !status::is_valid_claim_transition(credential.claim_status, ClaimStatus::Claimed) {
            return Err(EngineError::ClaimConflict);
        }
        credential.claim_status = ClaimStatus::Claimed;
        if credential.status == CredentialStatus::Pending {
            credential.status = CredentialStatus::Active;
        }
        tracing::debug!(id = %id, "claim finalized");
        Ok(credential.clone())
    }

    // -----------------------------------------------------------------------
    // Governance applications
    // -----------------------------------------------------------------------

    pub fn add_application(&self, application: GovernanceApplication) -> EngineResult<()> {
        tracing::debug!(id = %application.id, "adding governance application");
        self.lock()?.applications.push(application);
        Ok(())
    }

    pub fn application(
        &self,
        id: &ApplicationId,
    ) -> EngineResult<Option<GovernanceApplication>> {
        Ok(self
            .lock()?
            .applications
            .iter()
            .find(|a| &a.id == id)
            .cloned())
    }

    /// The applicant's application still awaiting a decision, if any. One
    /// active application per address is enforced through this query.
    pub fn active_application_for(
        &self,
        address: &Address,
    ) -> EngineResult<Option<GovernanceApplication>> {
        Ok(self
            .lock()?
            .applications
            .iter()
            .find(|a| {
                &a.applicant_address == address
                    && matches!(
                        a.status,
                        ApplicationStatus::Pending | ApplicationStatus::UnderReview
                    )
            })
            .cloned())
    }

    /// Record a review decision. Fails with a state-conflict error unless the
    /// application is still awaiting review; the check and the write happen
    /// under one lock acquisition.
    pub fn review_application(
        &self,
        id: &ApplicationId,
        decision: ApplicationStatus,
        reviewer: &Address,
        note: Option<String>,
    ) -> EngineResult<GovernanceApplication> {
        let mut inner = self.lock()?;
        let application = inner
            .applications
            .iter_mut()
            .find(|a| &a.id == id)
            .ok_or(EngineError::ApplicationNotFound)?;

        if !matches!(
            application.status,
            ApplicationStatus::Pending | ApplicationStatus::UnderReview
        ) {
            return Err(EngineError::ApplicationNotPending);
        }
        application.status = decision;
        application.reviewed_at = Some(Timestamp::now());
        application.reviewed_by = Some(reviewer.clone());
        application.review_note = note;
        Ok(application.clone())
    }

    // -----------------------------------------------------------------------
    // Audit log (append-only; entries are never rewritten)
    // -----------------------------------------------------------------------

    pub fn append_action(&self, action: GovernanceAction) -> EngineResult<()> {
        tracing::debug!(id = %action.id, kind = ?action.kind, "appending governance action");
        self.lock()?.actions.push(action);
        Ok(())
    }

    pub fn actions(&self) -> EngineResult<Vec<GovernanceAction>> {
        Ok(self.lock()?.actions.clone())
    }
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}
