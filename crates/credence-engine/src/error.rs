use thiserror::Error;

use credence_core::CoreError;

/// Engine error taxonomy.
///
/// Validation and state-conflict failures carry a specific human-readable
/// reason; external-call failures are retryable; authorization failures are
/// rejected before any mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("credential not found")]
    CredentialNotFound,

    #[error("credential type not found")]
    CredentialTypeNotFound,

    #[error("issuer not found")]
    IssuerNotFound,

    #[error("application not found")]
    ApplicationNotFound,

    #[error("credential is not claimable")]
    NotClaimable,

    #[error("claim window has expired")]
    ClaimExpired,

    #[error("claim already finalized by a concurrent operation")]
    ClaimConflict,

    #[error("unauthorized")]
    Unauthorized,

    #[error("status transition denied: {0}")]
    StatusTransitionDenied(String),

    #[error("application is not pending review")]
    ApplicationNotPending,

    #[error("duplicate application: an active application already exists for this address")]
    DuplicateApplication,

    #[error("invalid composition rule: {0}")]
    InvalidRule(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("batch rejected: {0}")]
    BatchRejected(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("ledger error: {0}")]
    Ledger(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<CoreError> for EngineError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidAddress(msg) => EngineError::InvalidAddress(msg),
            CoreError::Ledger(msg) => EngineError::Ledger(msg),
            CoreError::Timeout => EngineError::Ledger("operation timed out".into()),
            CoreError::Storage(msg) => EngineError::Ledger(msg),
            CoreError::Serialization(msg) | CoreError::Internal(msg) => {
                EngineError::Internal(msg)
            }
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
