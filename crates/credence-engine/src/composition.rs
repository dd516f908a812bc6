//! Composition engine: per-rule progress and composite auto-issuance.
//!
//! Progress is computed from the recipient's *active* credentials only;
//! pending and revoked credentials never satisfy a rule. Auto-issuance is
//! idempotent per rule: once a composite credential exists for the recipient,
//! re-evaluation mints nothing.
//!
//! A later revocation of a component does NOT revoke an already-minted
//! composite; composite revocation is a governance decision. Consumers can
//! detect the situation from the progress records (missing set non-empty
//! while a composite credential exists).

use std::collections::HashSet;

use credence_core::{Address, CredentialId, CredentialTypeId, LedgerClient, Timestamp, TxnIntent};

use crate::error::{EngineError, EngineResult};
use crate::store::EntityStore;
use crate::types::{ClaimStatus, CompositionRule, Credential, CredentialStatus};

/// Progress of one recipient against one composition rule.
#[derive(Debug, Clone)]
pub struct RuleProgress {
    pub rule: CompositionRule,
    /// Required types the recipient holds, in rule-definition order.
    pub earned_type_ids: Vec<CredentialTypeId>,
    /// Required types the recipient is missing, in rule-definition order.
    pub missing_type_ids: Vec<CredentialTypeId>,
    pub total_required: usize,
    pub total_earned: usize,
    pub is_eligible: bool,
    /// The recipient's active composite credential for this rule, if minted.
    pub composite_credential: Option<Credential>,
}

/// Compute progress against every active composition rule.
pub fn composition_progress(
    store: &EntityStore,
    recipient: &Address,
) -> EngineResult<Vec<RuleProgress>> {
    let active: Vec<Credential> = store
        .credentials_by_recipient(recipient)?
        .into_iter()
        .filter(|c| c.status == CredentialStatus::Active)
        .collect();

    let held: HashSet<&str> = active
        .iter()
        .map(|c| c.credential_type_id.as_str())
        .collect();

    let mut progress = Vec::new();
    for rule in store.active_rules()? {
        let earned_type_ids: Vec<_> = rule
            .required_credential_type_ids
            .iter()
            .filter(|t| held.contains(t.as_str()))
            .cloned()
            .collect();
        let missing_type_ids: Vec<_> = rule
            .required_credential_type_ids
            .iter()
            .filter(|t| !held.contains(t.as_str()))
            .cloned()
            .collect();
        let composite_credential = active
            .iter()
            .find(|c| c.credential_type_id == rule.composite_credential_type_id)
            .cloned();

        let total_required = rule.required_credential_type_ids.len();
        let total_earned = earned_type_ids.len();
        let is_eligible = missing_type_ids.is_empty();

        progress.push(RuleProgress {
            rule,
            earned_type_ids,
            missing_type_ids,
            total_required,
            total_earned,
            is_eligible,
            composite_credential,
        });
    }
    Ok(progress)
}

/// Mint composite credentials for every rule the recipient has just become
/// eligible for. Invoked after any new credential is committed for the
/// recipient; attributed to the issuer whose issuance triggered eligibility.
///
/// Returns the composites minted by this invocation (possibly empty).
pub fn evaluate_auto_issuance(
    store: &EntityStore,
    ledger: &dyn LedgerClient,
    recipient: &Address,
    triggering_issuer: &Address,
) -> EngineResult<Vec<Credential>> {
    let mut minted = Vec::new();

    for progress in composition_progress(store, recipient)? {
        if !progress.rule.auto_issue
            || !progress.is_eligible
            || progress.composite_credential.is_some()
        {
            continue;
        }

        let composite_type_id = &progress.rule.composite_credential_type_id;
        let composite_type = match store.credential_type(composite_type_id)? {
            Some(t) => t,
            None => {
                tracing::warn!(
                    rule = %progress.rule.id,
                    composite_type = %composite_type_id,
                    "composite credential type missing, skipping auto-issuance"
                );
                continue;
            }
        };

        let receipt = ledger.sign_and_submit(&TxnIntent::AssetCreate {
            asset_name: composite_type.name.clone(),
            unit_name: "CRED".into(),
            metadata_uri: format!("credence://composite/{}", composite_type_id),
        })?;
        let asa_id = receipt
            .asset_id
            .ok_or_else(|| EngineError::Ledger("asset create returned no asset id".into()))?;

        // Composites are delivered directly; they do not pass through escrow.
        let credential = Credential {
            id: CredentialId::generate(),
            asa_id,
            credential_type_id: composite_type_id.clone(),
            issuer_address: triggering_issuer.clone(),
            recipient_address: recipient.clone(),
            evidence_hash: None,
            issued_at: Timestamp::now(),
            status: CredentialStatus::Active,
            claim_status: ClaimStatus::NotApplicable,
            expires_at: None,
            revoked_at: None,
            revocation_reason: None,
            tx_id: receipt.tx_id,
        };
        tracing::debug!(
            rule = %progress.rule.id,
            credential = %credential.id,
            recipient = %recipient,
            "auto-issuing composite credential"
        );
        store.add_credential(credential.clone())?;
        minted.push(credential);
    }
    Ok(minted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        Category, CompositionType, CredentialTier, CredentialType, Issuer, IssuerKind,
        IssuerStatus, RuleStatus, TypeStatus,
    };
    use credence_core::{AsaId, CoreResult, CredentialTypeId, RuleId, SubmitReceipt, TxId};
    use std::sync::Mutex;

    struct StubLedger {
        next_asa: Mutex<u64>,
    }

    impl StubLedger {
        fn new() -> Self {
            Self {
                next_asa: Mutex::new(1000),
            }
        }
    }

    impl LedgerClient for StubLedger {
        fn sign_and_submit(&self, intent: &TxnIntent) -> CoreResult<SubmitReceipt> {
            let mut next = self.next_asa.lock().unwrap();
            *next += 1;
            let asset_id = match intent {
                TxnIntent::AssetCreate { .. } => Some(AsaId(*next)),
                _ => None,
            };
            Ok(SubmitReceipt {
                tx_id: TxId::new(format!("TX{}", *next)),
                asset_id,
            })
        }

        fn is_opted_in(&self, _address: &Address, _asset: AsaId) -> CoreResult<bool> {
            Ok(true)
        }
    }

    fn addr(fill: char) -> Address {
        Address::parse(fill.to_string().repeat(58)).unwrap()
    }

    fn setup_store(issuer_addr: &Address) -> EntityStore {
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
        for id in ["CT-A", "CT-B", "CT-C", "CT-MASTER"] {
            store
                .add_credential_type(CredentialType {
                    id: CredentialTypeId::new(id),
                    name: format!("Type {}", id),
                    description: String::new(),
                    category: Category::Technical,
                    tier: CredentialTier::Beginner,
                    issuer_address: issuer_addr.clone(),
                    evidence_required: false,
                    status: TypeStatus::Active,
                })
                .unwrap();
        }
        store
    }

    fn rule(required: &[&str], composite: &str, auto_issue: bool) -> CompositionRule {
        CompositionRule {
            id: RuleId::new("RULE-1"),
            name: "Mastery".into(),
            description: String::new(),
            defined_by: addr('D'),
            required_credential_type_ids: required
                .iter()
                .map(|s| CredentialTypeId::new(*s))
                .collect(),
            composition_type: CompositionType::AllRequired,
            composite_credential_type_id: CredentialTypeId::new(composite),
            auto_issue,
            status: RuleStatus::Active,
        }
    }

    fn grant(
        store: &EntityStore,
        issuer: &Address,
        recipient: &Address,
        type_id: &str,
        status: CredentialStatus,
    ) {
        store
            .add_credential(Credential {
                id: CredentialId::generate(),
                asa_id: AsaId(1),
                credential_type_id: CredentialTypeId::new(type_id),
                issuer_address: issuer.clone(),
                recipient_address: recipient.clone(),
                evidence_hash: None,
                issued_at: Timestamp::now(),
                status,
                claim_status: ClaimStatus::Claimed,
                expires_at: None,
                revoked_at: None,
                revocation_reason: None,
                tx_id: TxId::new("TX0"),
            })
            .unwrap();
    }

    #[test]
    fn test_progress_revoked_component_not_counted() {
        let issuer = addr('A');
        let alice = addr('B');
        let store = setup_store(&issuer);
        store
            .add_composition_rule(rule(&["CT-A", "CT-B", "CT-C"], "CT-MASTER", true))
            .unwrap();

        grant(&store, &issuer, &alice, "CT-A", CredentialStatus::Active);
        grant(&store, &issuer, &alice, "CT-B", CredentialStatus::Active);
        grant(&store, &issuer, &alice, "CT-C", CredentialStatus::Revoked);

        let progress = composition_progress(&store, &alice).unwrap();
        assert_eq!(progress.len(), 1);
        let p = &progress[0];
        assert_eq!(p.total_required, 3);
        assert_eq!(p.total_earned, 2);
        assert_eq!(p.missing_type_ids, vec![CredentialTypeId::new("CT-C")]);
        assert!(!p.is_eligible);
        assert!(p.composite_credential.is_none());
    }

    #[test]
    fn test_progress_pending_not_counted() {
        let issuer = addr('A');
        let alice = addr('B');
        let store = setup_store(&issuer);
        store
            .add_composition_rule(rule(&["CT-A", "CT-B"], "CT-MASTER", true))
            .unwrap();

        grant(&store, &issuer, &alice, "CT-A", CredentialStatus::Active);
        grant(&store, &issuer, &alice, "CT-B", CredentialStatus::Pending);

        let p = &composition_progress(&store, &alice).unwrap()[0];
        assert_eq!(p.total_earned, 1);
        assert!(!p.is_eligible);
    }

    #[test]
    fn test_progress_preserves_rule_order() {
        let issuer = addr('A');
        let alice = addr('B');
        let store = setup_store(&issuer);
        store
            .add_composition_rule(rule(&["CT-C", "CT-A", "CT-B"], "CT-MASTER", true))
            .unwrap();

        // Granted in a different order than the rule lists them
        grant(&store, &issuer, &alice, "CT-A", CredentialStatus::Active);
        grant(&store, &issuer, &alice, "CT-C", CredentialStatus::Active);

        let p = &composition_progress(&store, &alice).unwrap()[0];
        assert_eq!(
            p.earned_type_ids,
            vec![CredentialTypeId::new("CT-C"), CredentialTypeId::new("CT-A")]
        );
        assert_eq!(p.missing_type_ids, vec![CredentialTypeId::new("CT-B")]);
    }

    #[test]
    fn test_auto_issuance_idempotent() {
        let issuer = addr('A');
        let alice = addr('B');
        let store = setup_store(&issuer);
        let ledger = StubLedger::new();
        store
            .add_composition_rule(rule(&["CT-A", "CT-B"], "CT-MASTER", true))
            .unwrap();

        grant(&store, &issuer, &alice, "CT-A", CredentialStatus::Active);
        grant(&store, &issuer, &alice, "CT-B", CredentialStatus::Active);

        let first = evaluate_auto_issuance(&store, &ledger, &alice, &issuer).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].status, CredentialStatus::Active);
        assert_eq!(first[0].claim_status, ClaimStatus::NotApplicable);

        // Re-evaluating any number of times mints nothing further
        for _ in 0..3 {
            let again = evaluate_auto_issuance(&store, &ledger, &alice, &issuer).unwrap();
            assert!(again.is_empty());
        }
        let composites: Vec<_> = store
            .credentials_by_recipient(&alice)
            .unwrap()
            .into_iter()
            .filter(|c| c.credential_type_id.as_str() == "CT-MASTER")
            .collect();
        assert_eq!(composites.len(), 1);
    }

    #[test]
    fn test_auto_issuance_respects_flag() {
        let issuer = addr('A');
        let alice = addr('B');
        let store = setup_store(&issuer);
        let ledger = StubLedger::new();
        store
            .add_composition_rule(rule(&["CT-A", "CT-B"], "CT-MASTER", false))
            .unwrap();

        grant(&store, &issuer, &alice, "CT-A", CredentialStatus::Active);
        grant(&store, &issuer, &alice, "CT-B", CredentialStatus::Active);

        let minted = evaluate_auto_issuance(&store, &ledger, &alice, &issuer).unwrap();
        assert!(minted.is_empty());
        // Progress still reports eligibility for manual issuance
        let p = &composition_progress(&store, &alice).unwrap()[0];
        assert!(p.is_eligible);
    }

    #[test]
    fn test_auto_issuance_skips_ineligible() {
        let issuer = addr('A');
        let alice = addr('B');
        let store = setup_store(&issuer);
        let ledger = StubLedger::new();
        store
            .add_composition_rule(rule(&["CT-A", "CT-B"], "CT-MASTER", true))
            .unwrap();

        grant(&store, &issuer, &alice, "CT-A", CredentialStatus::Active);
        let minted = evaluate_auto_issuance(&store, &ledger, &alice, &issuer).unwrap();
        assert!(minted.is_empty());
    }

    #[test]
    fn test_component_revocation_does_not_revoke_composite() {
        let issuer = addr('A');
        let alice = addr('B');
        let store = setup_store(&issuer);
        let ledger = StubLedger::new();
        store
            .add_composition_rule(rule(&["CT-A", "CT-B"], "CT-MASTER", true))
            .unwrap();

        grant(&store, &issuer, &alice, "CT-A", CredentialStatus::Active);
        grant(&store, &issuer, &alice, "CT-B", CredentialStatus::Active);
        let minted = evaluate_auto_issuance(&store, &ledger, &alice, &issuer).unwrap();
        let composite_id = minted[0].id.clone();

        // Revoke a component
        let component_id = store
            .credentials_by_recipient(&alice)
            .unwrap()
            .into_iter()
            .find(|c| c.credential_type_id.as_str() == "CT-A")
            .unwrap()
            .id;
        store.revoke_credential(&component_id, "expired cert").unwrap();

        // Progress shows the gap again, but the composite stays active
        let p = &composition_progress(&store, &alice).unwrap()[0];
        assert!(!p.is_eligible);
        assert_eq!(p.missing_type_ids, vec![CredentialTypeId::new("CT-A")]);
        let composite = store.credential(&composite_id).unwrap().unwrap();
        assert_eq!(composite.status, CredentialStatus::Active);
        // And the engine does not mint a second composite either
        let again = evaluate_auto_issuance(&store, &ledger, &alice, &issuer).unwrap();
        assert!(again.is_empty());
    }
}
