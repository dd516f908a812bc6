//! Governance operations: issuer onboarding, suspension, and revocation.
//!
//! Every mutating operation checks authorization first and records a
//! `GovernanceAction` in the audit log only after the mutation succeeds.
//! A rejected attempt leaves no trace in either the entities or the log.

use credence_core::{random_hex_id, ActionId, Address, ApplicationId, CredentialId, Timestamp};

use crate::error::{EngineError, EngineResult};
use crate::store::EntityStore;
use crate::types::{
    ActionKind, ApplicationStatus, Credential, CredentialStatus, GovernanceAction,
    GovernanceApplication, Issuer, IssuerKind, IssuerStatus,
};

/// Credibility assigned to a freshly approved issuer.
const INITIAL_CREDIBILITY: u8 = 50;

/// Everything an applicant submits when requesting issuer status.
#[derive(Debug, Clone)]
pub struct ApplicationRequest {
    pub applicant_address: Address,
    pub institution_name: String,
    pub institution_kind: IssuerKind,
    pub email: String,
    pub website: Option<String>,
    pub description: String,
    pub document_hash: Option<String>,
    pub document_uri: Option<String>,
}

pub struct GovernanceService<'a> {
    store: &'a EntityStore,
    admins: Vec<Address>,
}

impl<'a> GovernanceService<'a> {
    pub fn new(store: &'a EntityStore, admins: Vec<Address>) -> Self {
        Self { store, admins }
    }

    pub fn is_admin(&self, address: &Address) -> bool {
        self.admins.contains(address)
    }

    fn require_admin(&self, actor: &Address) -> EngineResult<()> {
        if self.is_admin(actor) {
            Ok(())
        } else {
            Err(EngineError::Unauthorized)
        }
    }

    fn log(
        &self,
        kind: ActionKind,
        target_address: &Address,
        target_name: &str,
        performed_by: &Address,
        reason: &str,
        application_id: Option<ApplicationId>,
    ) -> EngineResult<()> {
        self.store.append_action(GovernanceAction {
            id: ActionId::new(random_hex_id()),
            kind,
            target_address: target_address.clone(),
            target_name: target_name.to_string(),
            performed_by: performed_by.clone(),
            reason: reason.to_string(),
            timestamp: Timestamp::now(),
            tx_id: None,
            application_id,
        })
    }

    // -----------------------------------------------------------------------
    // Issuer status
    // -----------------------------------------------------------------------

    /// Suspend an active issuer. Admin only.
    pub fn suspend_issuer(
        &self,
        admin: &Address,
        target: &Address,
        reason: &str,
    ) -> EngineResult<Issuer> {
        self.require_admin(admin)?;
        let issuer = self
            .store
            .issuer_by_address(target)?
            .ok_or(EngineError::IssuerNotFound)?;
        if issuer.status != IssuerStatus::Active {
            return Err(EngineError::StatusTransitionDenied(format!(
                "{} -> suspended",
                issuer.status
            )));
        }
        let updated = self
            .store
            .set_issuer_status(target, IssuerStatus::Suspended)?;
        self.log(
            ActionKind::IssuerSuspended,
            target,
            &updated.name,
            admin,
            reason,
            None,
        )?;
        tracing::debug!(target = %target, "issuer suspended");
        Ok(updated)
    }

    /// Lift a suspension. Admin only.
    pub fn reinstate_issuer(
        &self,
        admin: &Address,
        target: &Address,
        reason: &str,
    ) -> EngineResult<Issuer> {
        self.require_admin(admin)?;
        let issuer = self
            .store
            .issuer_by_address(target)?
            .ok_or(EngineError::IssuerNotFound)?;
        if issuer.status != IssuerStatus::Suspended {
            return Err(EngineError::StatusTransitionDenied(format!(
                "{} -> active",
                issuer.status
            )));
        }
        let updated = self.store.set_issuer_status(target, IssuerStatus::Active)?;
        self.log(
            ActionKind::IssuerReinstated,
            target,
            &updated.name,
            admin,
            reason,
            None,
        )?;
        tracing::debug!(target = %target, "issuer reinstated");
        Ok(updated)
    }

    // -----------------------------------------------------------------------
    // Revocation
    // -----------------------------------------------------------------------

    /// Revoke a credential. Allowed for the credential's own issuer and for
    /// admins. Revoking an already-revoked credential is a no-op and leaves
    /// the audit log untouched.
    pub fn revoke_credential(
        &self,
        actor: &Address,
        id: &CredentialId,
        reason: &str,
    ) -> EngineResult<Credential> {
        let credential = self
            .store
            .credential(id)?
            .ok_or(EngineError::CredentialNotFound)?;
        if &credential.issuer_address != actor && !self.is_admin(actor) {
            return Err(EngineError::Unauthorized);
        }

        let already_revoked = credential.status == CredentialStatus::Revoked;
        let updated = self.store.revoke_credential(id, reason)?;
        if !already_revoked {
            self.log(
                ActionKind::CredentialRevoked,
                &updated.recipient_address,
                updated.credential_type_id.as_str(),
                actor,
                reason,
                None,
            )?;
        }
        Ok(updated)
    }

    // -----------------------------------------------------------------------
    // Applications
    // -----------------------------------------------------------------------

    /// Submit an issuer application. One application per address may be
    /// awaiting review at a time; a rejected applicant may reapply.
    pub fn submit_application(
        &self,
        request: ApplicationRequest,
    ) -> EngineResult<GovernanceApplication> {
        if self
            .store
            .active_application_for(&request.applicant_address)?
            .is_some()
        {
            return Err(EngineError::DuplicateApplication);
        }
        let application = GovernanceApplication {
            id: ApplicationId::new(random_hex_id()),
            applicant_address: request.applicant_address,
            institution_name: request.institution_name,
            institution_kind: request.institution_kind,
            email: request.email,
            website: request.website,
            description: request.description,
            document_hash: request.document_hash,
            document_uri: request.document_uri,
            status: ApplicationStatus::Pending,
            submitted_at: Timestamp::now(),
            reviewed_at: None,
            reviewed_by: None,
            review_note: None,
        };
        self.store.add_application(application.clone())?;
        tracing::debug!(id = %application.id, "issuer application submitted");
        Ok(application)
    }

    /// Approve an application: the applicant becomes an active issuer.
    /// Admin only.
    pub fn approve_application(
        &self,
        admin: &Address,
        id: &ApplicationId,
        note: Option<String>,
    ) -> EngineResult<Issuer> {
        self.require_admin(admin)?;
        let application =
            self.store
                .review_application(id, ApplicationStatus::Approved, admin, note)?;

        let issuer = Issuer {
            address: application.applicant_address.clone(),
            name: application.institution_name.clone(),
            kind: application.institution_kind,
            status: IssuerStatus::Active,
            credibility_score: INITIAL_CREDIBILITY,
            total_issued: 0,
            total_revoked: 0,
            registered_at: Timestamp::now(),
        };
        self.store.add_issuer(issuer.clone())?;
        self.log(
            ActionKind::IssuerApproved,
            &issuer.address,
            &issuer.name,
            admin,
            "application approved",
            Some(application.id),
        )?;
        tracing::debug!(address = %issuer.address, "issuer approved");
        Ok(issuer)
    }

    /// Reject an application. Admin only.
    pub fn reject_application(
        &self,
        admin: &Address,
        id: &ApplicationId,
        reason: &str,
    ) -> EngineResult<GovernanceApplication> {
        self.require_admin(admin)?;
        let application = self.store.review_application(
            id,
            ApplicationStatus::Rejected,
            admin,
            Some(reason.to_string()),
        )?;
        self.log(
            ActionKind::ApplicationRejected,
            &application.applicant_address,
            &application.institution_name,
            admin,
            reason,
            Some(application.id.clone()),
        )?;
        Ok(application)
    }
}
