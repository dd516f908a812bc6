//! Credence Engine
//!
//! Credential lifecycle engine for the credence registry: issuer and
//! credential-type records, single and batch issuance into escrow, the claim
//! flow that moves escrowed credentials to their recipients, composition
//! rules that mint composite credentials from earned sets, and governance
//! over issuers with an append-only audit log.
//!
//! All ledger and content-store traffic goes through the ports defined in
//! `credence-core`; this crate holds no keys and builds no transactions.

pub mod batch;
pub mod claim;
pub mod composition;
pub mod config;
pub mod error;
pub mod governance;
pub mod issue;
pub mod status;
pub mod store;
pub mod types;

pub use batch::{
    create_batch_job, parse_batch_csv, process_batch_job, BatchJob, BatchProgress, BatchRow,
    JobStatus, ParseReport, RowError, RowStatus,
};
pub use claim::{claimable_credentials, is_claim_expired, ClaimFlow, ClaimStep};
pub use composition::{composition_progress, evaluate_auto_issuance, RuleProgress};
pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use governance::{ApplicationRequest, GovernanceService};
pub use issue::issue_credential;
pub use store::EntityStore;
pub use types::{
    ActionKind, ApplicationStatus, Category, ClaimStatus, CompositionRule, CompositionType,
    Credential, CredentialStatus, CredentialTier, CredentialType, GovernanceAction,
    GovernanceApplication, Issuer, IssuerKind, IssuerStatus, RuleStatus, TypeStatus,
};
