//! Credence Core
//!
//! Shared foundation for the credence credential registry: typed identifiers,
//! the validated on-chain address newtype, canonical timestamps, and the
//! capability traits (ledger signing, content-addressable storage) that the
//! engine calls through. The engine never constructs transactions or touches
//! key material; those concerns live behind the `LedgerClient` port.

pub mod error;
pub mod traits;
pub mod types;

pub use error::{CoreError, CoreResult};
pub use traits::{ContentStore, LedgerClient, StoredContent, SubmitReceipt, TxnIntent};
pub use types::{
    random_hex_id, ActionId, Address, ApplicationId, AsaId, CredentialId, CredentialTypeId, JobId,
    RuleId, Timestamp, TxId, ADDRESS_LEN,
};
