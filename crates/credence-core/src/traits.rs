use serde::{Deserialize, Serialize};

use crate::error::CoreResult;
use crate::types::{Address, AsaId, TxId};

// ---------------------------------------------------------------------------
// LedgerClient — the wallet/ledger signing capability
//
// The engine never inspects raw transaction bytes. It submits an intent and
// gets back success (with an opaque transaction id) or failure. A timeout is
// reported as CoreError::Timeout and treated by callers identically to an
// explicit rejection.
// ---------------------------------------------------------------------------

/// A transaction the engine asks the ledger capability to sign and submit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxnIntent {
    /// Create the on-chain asset backing a freshly minted credential.
    AssetCreate {
        asset_name: String,
        unit_name: String,
        metadata_uri: String,
    },
    /// Recipient-side registration required before an asset can be received.
    AssetOptIn { address: Address, asset: AsaId },
    /// Transfer of a held asset from escrow to the recipient.
    AssetTransfer { asset: AsaId, recipient: Address },
}

/// Result of a successful submission. `asset_id` is populated only for
/// AssetCreate intents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    pub tx_id: TxId,
    pub asset_id: Option<AsaId>,
}

pub trait LedgerClient: Send + Sync {
    fn sign_and_submit(&self, intent: &TxnIntent) -> CoreResult<SubmitReceipt>;

    /// Whether `address` has already opted into `asset`.
    fn is_opted_in(&self, address: &Address, asset: AsaId) -> CoreResult<bool>;
}

// ---------------------------------------------------------------------------
// ContentStore — content-addressable storage for evidence and metadata
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredContent {
    pub content_id: String,
    pub uri: String,
}

pub trait ContentStore: Send + Sync {
    fn upload(&self, bytes: &[u8]) -> CoreResult<StoredContent>;
}
