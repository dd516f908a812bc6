use serde::{Deserialize, Serialize};
use std::fmt;

use credence_core::{
    ActionId, Address, ApplicationId, AsaId, CredentialId, CredentialTypeId, RuleId, Timestamp,
    TxId,
};

// ---------------------------------------------------------------------------
// Issuer — a registered credential-issuing institution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssuerKind {
    University,
    Bootcamp,
    Company,
    Nonprofit,
    Government,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssuerStatus {
    Active,
    Suspended,
    Revoked,
    Pending,
}

impl fmt::Display for IssuerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssuerStatus::Active => write!(f, "active"),
            IssuerStatus::Suspended => write!(f, "suspended"),
            IssuerStatus::Revoked => write!(f, "revoked"),
            IssuerStatus::Pending => write!(f, "pending"),
        }
    }
}

/// Created on governance approval. Suspension is reversible; revocation is
/// not. Never hard-deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issuer {
    pub address: Address,
    pub name: String,
    pub kind: IssuerKind,
    pub status: IssuerStatus,
    /// 0-100.
    pub credibility_score: u8,
    pub total_issued: u64,
    pub total_revoked: u64,
    pub registered_at: Timestamp,
}

// ---------------------------------------------------------------------------
// CredentialType — an issuer-owned template for credentials
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Technical,
    Business,
    Creative,
    Language,
    Science,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialTier {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeStatus {
    Active,
    Inactive,
}

/// Immutable once credentials reference it; there is no update operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialType {
    pub id: CredentialTypeId,
    pub name: String,
    pub description: String,
    pub category: Category,
    pub tier: CredentialTier,
    pub issuer_address: Address,
    pub evidence_required: bool,
    pub status: TypeStatus,
}

// ---------------------------------------------------------------------------
// Credential — one issued credential instance
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialStatus {
    Pending,
    Active,
    Revoked,
}

impl fmt::Display for CredentialStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialStatus::Pending => write!(f, "pending"),
            CredentialStatus::Active => write!(f, "active"),
            CredentialStatus::Revoked => write!(f, "revoked"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    Claimable,
    Claimed,
    NotApplicable,
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClaimStatus::Claimable => write!(f, "claimable"),
            ClaimStatus::Claimed => write!(f, "claimed"),
            ClaimStatus::NotApplicable => write!(f, "not_applicable"),
        }
    }
}

/// Invariants: `id` unique; `asa_id` assigned once and immutable; status
/// transitions monotonic (revoked terminal); `claimed` terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub id: CredentialId,
    pub asa_id: AsaId,
    pub credential_type_id: CredentialTypeId,
    pub issuer_address: Address,
    pub recipient_address: Address,
    pub evidence_hash: Option<String>,
    pub issued_at: Timestamp,
    pub status: CredentialStatus,
    pub claim_status: ClaimStatus,
    pub expires_at: Option<Timestamp>,
    pub revoked_at: Option<Timestamp>,
    pub revocation_reason: Option<String>,
    pub tx_id: TxId,
}

// ---------------------------------------------------------------------------
// CompositionRule — which micro-credentials compose into a mastery credential
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositionType {
    /// AND semantics: every required type must be held active.
    AllRequired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionRule {
    pub id: RuleId,
    pub name: String,
    pub description: String,
    pub defined_by: Address,
    /// Ordered; at least two entries, enforced at creation.
    pub required_credential_type_ids: Vec<CredentialTypeId>,
    pub composition_type: CompositionType,
    /// Must not appear in `required_credential_type_ids`.
    pub composite_credential_type_id: CredentialTypeId,
    pub auto_issue: bool,
    pub status: RuleStatus,
}

// ---------------------------------------------------------------------------
// GovernanceApplication — an institution applying to become an issuer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    UnderReview,
    Approved,
    Rejected,
    Suspended,
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplicationStatus::Pending => write!(f, "pending"),
            ApplicationStatus::UnderReview => write!(f, "under_review"),
            ApplicationStatus::Approved => write!(f, "approved"),
            ApplicationStatus::Rejected => write!(f, "rejected"),
            ApplicationStatus::Suspended => write!(f, "suspended"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovernanceApplication {
    pub id: ApplicationId,
    pub applicant_address: Address,
    pub institution_name: String,
    pub institution_kind: IssuerKind,
    pub email: String,
    pub website: Option<String>,
    pub description: String,
    pub document_hash: Option<String>,
    pub document_uri: Option<String>,
    pub status: ApplicationStatus,
    pub submitted_at: Timestamp,
    pub reviewed_at: Option<Timestamp>,
    pub reviewed_by: Option<Address>,
    pub review_note: Option<String>,
}

// ---------------------------------------------------------------------------
// GovernanceAction — append-only audit log entry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    IssuerApproved,
    IssuerSuspended,
    IssuerReinstated,
    CredentialRevoked,
    ApplicationRejected,
}

/// Never mutated or deleted once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovernanceAction {
    pub id: ActionId,
    pub kind: ActionKind,
    pub target_address: Address,
    pub target_name: String,
    pub performed_by: Address,
    pub reason: String,
    pub timestamp: Timestamp,
    pub tx_id: Option<TxId>,
    pub application_id: Option<ApplicationId>,
}
