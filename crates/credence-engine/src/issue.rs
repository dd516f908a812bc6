//! Single-credential issuance.
//!
//! The one mint path shared by the issuance form and the batch pipeline:
//! authorization gate, metadata anchoring, on-chain asset creation, store
//! commit, then composition re-evaluation for the recipient. Composition
//! evaluation runs strictly after the new credential is committed, so it
//! always sees the credential that triggered it.
//!
//! Metadata upload failure degrades to a locally derived placeholder
//! identifier rather than blocking issuance.

use sha2::{Digest, Sha256};

use credence_core::{
    Address, ContentStore, CredentialId, CredentialTypeId, LedgerClient, Timestamp, TxnIntent,
};

use crate::composition;
use crate::error::{EngineError, EngineResult};
use crate::store::EntityStore;
use crate::types::{ClaimStatus, Credential, CredentialStatus, CredentialType, TypeStatus};

/// Unit name stamped on every credential asset.
const ASSET_UNIT_NAME: &str = "CRED";

/// Derive the local placeholder identifier used when the content store is
/// unavailable.
pub fn placeholder_uri(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    format!("local://{}", hex::encode(&digest[..16]))
}

fn metadata_uri_for(
    content: &dyn ContentStore,
    ctype: &CredentialType,
    recipient: &Address,
    evidence_hash: Option<&str>,
    issued_at: Timestamp,
) -> EngineResult<String> {
    let document = serde_json::json!({
        "name": ctype.name,
        "credential_type_id": ctype.id.as_str(),
        "issuer": ctype.issuer_address.as_str(),
        "recipient": recipient.as_str(),
        "evidence_hash": evidence_hash,
        "issued_at": issued_at.seconds(),
    });
    let bytes = serde_json::to_vec(&document)
        .map_err(|e| EngineError::Internal(format!("metadata encoding failed: {}", e)))?;

    match content.upload(&bytes) {
        Ok(stored) => Ok(stored.uri),
        Err(err) => {
            // Degrade gracefully: anchor to a locally derived identifier
            // instead of failing the issuance.
            let uri = placeholder_uri(&bytes);
            tracing::warn!(error = %err, uri = %uri, "metadata upload failed, using placeholder");
            Ok(uri)
        }
    }
}

/// Issue one credential of `type_id` from `issuer` to `recipient`.
///
/// The credential enters escrow: `status = pending`,
/// `claim_status = claimable`. Fails before any mutation if the issuer is
/// not authorized, the type is not the issuer's own active type, or required
/// evidence is missing.
pub fn issue_credential(
    store: &EntityStore,
    ledger: &dyn LedgerClient,
    content: &dyn ContentStore,
    issuer: &Address,
    type_id: &CredentialTypeId,
    recipient: &Address,
    evidence_hash: Option<String>,
) -> EngineResult<Credential> {
    if !store.is_authorized_issuer(issuer)? {
        return Err(EngineError::Unauthorized);
    }
    let ctype = store
        .credential_type(type_id)?
        .filter(|t| t.status == TypeStatus::Active)
        .ok_or(EngineError::CredentialTypeNotFound)?;
    if &ctype.issuer_address != issuer {
        // An issuer cannot issue another issuer's credential type.
        return Err(EngineError::Unauthorized);
    }
    if ctype.evidence_required && evidence_hash.is_none() {
        return Err(EngineError::Validation(format!(
            "credential type {} requires an evidence hash",
            ctype.id
        )));
    }

    let issued_at = Timestamp::now();
    let metadata_uri =
        metadata_uri_for(content, &ctype, recipient, evidence_hash.as_deref(), issued_at)?;

    let receipt = ledger.sign_and_submit(&TxnIntent::AssetCreate {
        asset_name: ctype.name.clone(),
        unit_name: ASSET_UNIT_NAME.into(),
        metadata_uri,
    })?;
    let asa_id = receipt
        .asset_id
        .ok_or_else(|| EngineError::Ledger("asset create returned no asset id".into()))?;

    let credential = Credential {
        id: CredentialId::generate(),
        asa_id,
        credential_type_id: ctype.id.clone(),
        issuer_address: issuer.clone(),
        recipient_address: recipient.clone(),
        evidence_hash,
        issued_at,
        status: CredentialStatus::Pending,
        claim_status: ClaimStatus::Claimable,
        expires_at: None,
        revoked_at: None,
        revocation_reason: None,
        tx_id: receipt.tx_id,
    };
    store.add_credential(credential.clone())?;
    tracing::debug!(id = %credential.id, recipient = %recipient, "credential issued");

    // Composite eligibility may have changed; the credential is already
    // committed, so an auto-issuance failure does not undo the issuance.
    if let Err(err) = composition::evaluate_auto_issuance(store, ledger, recipient, issuer) {
        tracing::warn!(error = %err, recipient = %recipient, "auto-issuance evaluation failed");
    }

    Ok(credential)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        Category, CompositionRule, CompositionType, CredentialTier, Issuer, IssuerKind,
        IssuerStatus, RuleStatus,
    };
    use credence_core::{AsaId, CoreError, CoreResult, RuleId, StoredContent, SubmitReceipt, TxId};
    use std::sync::Mutex;

    struct StubLedger {
        next_asa: Mutex<u64>,
        created: Mutex<Vec<TxnIntent>>,
    }

    impl StubLedger {
        fn new() -> Self {
            Self {
                next_asa: Mutex::new(2000),
                created: Mutex::new(Vec::new()),
            }
        }
    }

    impl LedgerClient for StubLedger {
        fn sign_and_submit(&self, intent: &TxnIntent) -> CoreResult<SubmitReceipt> {
            self.created.lock().unwrap().push(intent.clone());
            let mut next = self.next_asa.lock().unwrap();
            *next += 1;
            Ok(SubmitReceipt {
                tx_id: TxId::new(format!("TX{}", *next)),
                asset_id: matches!(intent, TxnIntent::AssetCreate { .. }).then(|| AsaId(*next)),
            })
        }

        fn is_opted_in(&self, _address: &Address, _asset: AsaId) -> CoreResult<bool> {
            Ok(true)
        }
    }

    struct StubContent {
        fail: bool,
    }

    impl ContentStore for StubContent {
        fn upload(&self, bytes: &[u8]) -> CoreResult<StoredContent> {
            if self.fail {
                return Err(CoreError::Storage("gateway unreachable".into()));
            }
            let digest = Sha256::digest(bytes);
            let content_id = hex::encode(&digest[..8]);
            Ok(StoredContent {
                uri: format!("ipfs://{}", content_id),
                content_id,
            })
        }
    }

    fn addr(fill: char) -> Address {
        Address::parse(fill.to_string().repeat(58)).unwrap()
    }

    fn setup(issuer_addr: &Address) -> EntityStore {
        let store = EntityStore::new();
        store
            .add_issuer(Issuer {
                address: issuer_addr.clone(),
                name: "Test University".into(),
                kind: IssuerKind::University,
                status: IssuerStatus::Active,
                credibility_score: 80,
                total_issued: 0,
                total_revoked: 0,
                registered_at: Timestamp::now(),
            })
            .unwrap();
        store
            .add_credential_type(CredentialType {
                id: CredentialTypeId::new("CT-001"),
                name: "Rust Fundamentals".into(),
                description: "Intro course".into(),
                category: Category::Technical,
                tier: CredentialTier::Beginner,
                issuer_address: issuer_addr.clone(),
                evidence_required: false,
                status: TypeStatus::Active,
            })
            .unwrap();
        store
    }

    #[test]
    fn test_issue_enters_escrow() {
        let issuer = addr('A');
        let alice = addr('B');
        let store = setup(&issuer);
        let ledger = StubLedger::new();
        let content = StubContent { fail: false };

        let credential = issue_credential(
            &store,
            &ledger,
            &content,
            &issuer,
            &CredentialTypeId::new("CT-001"),
            &alice,
            None,
        )
        .unwrap();

        assert_eq!(credential.status, CredentialStatus::Pending);
        assert_eq!(credential.claim_status, ClaimStatus::Claimable);
        assert_eq!(store.credential_count().unwrap(), 1);
        assert_eq!(
            store.issuer_by_address(&issuer).unwrap().unwrap().total_issued,
            1
        );
    }

    #[test]
    fn test_unauthorized_issuer_rejected_before_mutation() {
        let issuer = addr('A');
        let alice = addr('B');
        let store = setup(&issuer);
        store
            .set_issuer_status(&issuer, IssuerStatus::Suspended)
            .unwrap();
        let ledger = StubLedger::new();
        let content = StubContent { fail: false };

        let err = issue_credential(
            &store,
            &ledger,
            &content,
            &issuer,
            &CredentialTypeId::new("CT-001"),
            &alice,
            None,
        )
        .unwrap_err();
        assert_eq!(err, EngineError::Unauthorized);
        assert_eq!(store.credential_count().unwrap(), 0);
        assert!(ledger.created.lock().unwrap().is_empty());
    }

    #[test]
    fn test_foreign_type_rejected() {
        let issuer = addr('A');
        let other = addr('C');
        let alice = addr('B');
        let store = setup(&issuer);
        // `other` is also a registered active issuer, but CT-001 is not theirs
        store
            .add_issuer(Issuer {
                address: other.clone(),
                name: "Other School".into(),
                kind: IssuerKind::Bootcamp,
                status: IssuerStatus::Active,
                credibility_score: 50,
                total_issued: 0,
                total_revoked: 0,
                registered_at: Timestamp::now(),
            })
            .unwrap();
        let ledger = StubLedger::new();
        let content = StubContent { fail: false };

        let err = issue_credential(
            &store,
            &ledger,
            &content,
            &other,
            &CredentialTypeId::new("CT-001"),
            &alice,
            None,
        )
        .unwrap_err();
        assert_eq!(err, EngineError::Unauthorized);
    }

    #[test]
    fn test_unknown_type_rejected() {
        let issuer = addr('A');
        let alice = addr('B');
        let store = setup(&issuer);
        let ledger = StubLedger::new();
        let content = StubContent { fail: false };

        let err = issue_credential(
            &store,
            &ledger,
            &content,
            &issuer,
            &CredentialTypeId::new("CT-404"),
            &alice,
            None,
        )
        .unwrap_err();
        assert_eq!(err, EngineError::CredentialTypeNotFound);
    }

    #[test]
    fn test_evidence_required_enforced() {
        let issuer = addr('A');
        let alice = addr('B');
        let store = setup(&issuer);
        store
            .add_credential_type(CredentialType {
                id: CredentialTypeId::new("CT-EV"),
                name: "Capstone Project".into(),
                description: String::new(),
                category: Category::Technical,
                tier: CredentialTier::Advanced,
                issuer_address: issuer.clone(),
                evidence_required: true,
                status: TypeStatus::Active,
            })
            .unwrap();
        let ledger = StubLedger::new();
        let content = StubContent { fail: false };

        let err = issue_credential(
            &store,
            &ledger,
            &content,
            &issuer,
            &CredentialTypeId::new("CT-EV"),
            &alice,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        // With evidence it goes through
        let credential = issue_credential(
            &store,
            &ledger,
            &content,
            &issuer,
            &CredentialTypeId::new("CT-EV"),
            &alice,
            Some("bafyevidence123".into()),
        )
        .unwrap();
        assert_eq!(credential.evidence_hash.as_deref(), Some("bafyevidence123"));
    }

    #[test]
    fn test_upload_failure_falls_back_to_placeholder() {
        let issuer = addr('A');
        let alice = addr('B');
        let store = setup(&issuer);
        let ledger = StubLedger::new();
        let content = StubContent { fail: true };

        issue_credential(
            &store,
            &ledger,
            &content,
            &issuer,
            &CredentialTypeId::new("CT-001"),
            &alice,
            None,
        )
        .unwrap();

        let intents = ledger.created.lock().unwrap();
        match &intents[0] {
            TxnIntent::AssetCreate { metadata_uri, .. } => {
                assert!(metadata_uri.starts_with("local://"));
            }
            other => panic!("expected AssetCreate, got {:?}", other),
        }
    }

    #[test]
    fn test_issuance_triggers_auto_composition() {
        let issuer = addr('A');
        let alice = addr('B');
        let store = setup(&issuer);
        store
            .add_credential_type(CredentialType {
                id: CredentialTypeId::new("CT-002"),
                name: "Rust Advanced".into(),
                description: String::new(),
                category: Category::Technical,
                tier: CredentialTier::Advanced,
                issuer_address: issuer.clone(),
                evidence_required: false,
                status: TypeStatus::Active,
            })
            .unwrap();
        store
            .add_credential_type(CredentialType {
                id: CredentialTypeId::new("CT-MASTER"),
                name: "Rust Mastery".into(),
                description: String::new(),
                category: Category::Technical,
                tier: CredentialTier::Expert,
                issuer_address: issuer.clone(),
                evidence_required: false,
                status: TypeStatus::Active,
            })
            .unwrap();
        store
            .add_composition_rule(CompositionRule {
                id: RuleId::new("RULE-1"),
                name: "Rust Mastery Path".into(),
                description: String::new(),
                defined_by: issuer.clone(),
                required_credential_type_ids: vec![
                    CredentialTypeId::new("CT-001"),
                    CredentialTypeId::new("CT-002"),
                ],
                composition_type: CompositionType::AllRequired,
                composite_credential_type_id: CredentialTypeId::new("CT-MASTER"),
                auto_issue: true,
                status: RuleStatus::Active,
            })
            .unwrap();
        let ledger = StubLedger::new();
        let content = StubContent { fail: false };

        let first = issue_credential(
            &store,
            &ledger,
            &content,
            &issuer,
            &CredentialTypeId::new("CT-001"),
            &alice,
            None,
        )
        .unwrap();
        let second = issue_credential(
            &store,
            &ledger,
            &content,
            &issuer,
            &CredentialTypeId::new("CT-002"),
            &alice,
            None,
        )
        .unwrap();

        // Both components still sit in escrow, so no composite yet: the
        // composition engine only counts active credentials.
        assert_eq!(store.credential_count().unwrap(), 2);

        // Claims activate the components; the next evaluation mints the
        // composite exactly once.
        store.finalize_claim(&first.id).unwrap();
        store.finalize_claim(&second.id).unwrap();
        let minted =
            composition::evaluate_auto_issuance(&store, &ledger, &alice, &issuer).unwrap();
        assert_eq!(minted.len(), 1);
        assert_eq!(minted[0].credential_type_id.as_str(), "CT-MASTER");
        assert_eq!(store.credential_count().unwrap(), 3);
    }

    #[test]
    fn test_placeholder_uri_is_deterministic() {
        let a = placeholder_uri(b"same bytes");
        let b = placeholder_uri(b"same bytes");
        let c = placeholder_uri(b"other bytes");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("local://"));
    }
}
