//! Integration tests for quorum aggregation and the privileged-action flow

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use proptest::prelude::*;
use serde_json::json;

use tapguard_authz::{
    Account, AuthMode, AuthzError, DeriveError, PrivilegedAction, PrivilegedActionFlow,
    PrivilegedRequest, QuorumAggregator, SignatureSet, StepUpGate, TokenDeriver,
};
use tapguard_core::{AuthorizationToken, SecurityQuestionToken, SoftwareSigner, VerifyToken};

use common::{Answer, FakeIdentity, RecordingPolicy, ScriptedPrompt, EMAIL, PASSWORD};

const CHALLENGE: &[u8] = b"delete_wallet:wallet-1:nonce-7";

fn signed_set(signers: &[SoftwareSigner]) -> SignatureSet {
    signers
        .iter()
        .map(|s| s.sign(CHALLENGE))
        .collect::<Vec<_>>()
        .into()
}

fn flow(
    identity: &Arc<FakeIdentity>,
    policy: &Arc<RecordingPolicy>,
    mode: AuthMode,
) -> PrivilegedActionFlow {
    PrivilegedActionFlow::new(
        StepUpGate::new(identity.clone()),
        QuorumAggregator::default(),
        policy.clone(),
        Account::new(EMAIL, mode),
    )
}

/// Deriver that refuses one fingerprint
struct RefusingDeriver {
    refused: String,
}

impl TokenDeriver for RefusingDeriver {
    fn derive(
        &self,
        fingerprint: &str,
        signature_hex: &str,
    ) -> Result<AuthorizationToken, DeriveError> {
        if fingerprint == self.refused {
            Err(DeriveError::Engine("signature does not match signer".to_string()))
        } else {
            Ok(AuthorizationToken::new(format!("{}:{}", fingerprint, signature_hex)))
        }
    }
}

#[test]
fn test_tokens_match_signers() {
    let signers = [SoftwareSigner::random(), SoftwareSigner::random()];
    let set = signed_set(&signers);

    let bundle = QuorumAggregator::default()
        .build(&set, Some(VerifyToken::new("v")), None)
        .unwrap();

    let prefixes: HashSet<String> = bundle
        .tokens
        .iter()
        .map(|t| t.as_str().split('.').next().unwrap().to_string())
        .collect();
    let expected: HashSet<String> = signers.iter().map(|s| s.fingerprint().to_hex()).collect();
    assert_eq!(prefixes, expected);
}

#[test]
fn test_one_bad_signer_fails_whole_build() {
    let mut set = SignatureSet::new();
    set.insert("aaaaaaaa", "11".repeat(64));
    set.insert("bbbbbbbb", "22".repeat(64));

    let aggregator = QuorumAggregator::new(Arc::new(RefusingDeriver {
        refused: "bbbbbbbb".to_string(),
    }));
    let err = aggregator.build(&set, None, None).unwrap_err();

    assert_eq!(
        err,
        AuthzError::Aggregation {
            fingerprint: "bbbbbbbb".to_string(),
            reason: "signature does not match signer".to_string(),
        }
    );
}

#[tokio::test]
async fn test_delete_wallet_end_to_end() {
    let identity = Arc::new(FakeIdentity::new());
    let policy = Arc::new(RecordingPolicy::default());
    let prompt = ScriptedPrompt::new([Answer::Submit(PASSWORD)]);

    let signers = [SoftwareSigner::random(), SoftwareSigner::random()];
    let request = PrivilegedRequest::new(
        PrivilegedAction::DeleteWallet,
        json!({ "wallet_id": "wallet-1" }),
        signed_set(&signers),
    )
    .with_security_question_token(SecurityQuestionToken::new("sq-token"));

    let reply = flow(&identity, &policy, AuthMode::Password)
        .execute(request, &prompt)
        .await
        .unwrap();

    assert_eq!(reply["status"], "accepted");
    assert_eq!(reply["action"], "delete_wallet");

    let submissions = policy.submissions.lock();
    assert_eq!(submissions.len(), 1);
    let (action, payload, headers) = &submissions[0];
    assert_eq!(*action, PrivilegedAction::DeleteWallet);
    assert_eq!(payload["wallet_id"], "wallet-1");

    let names: Vec<&str> = headers.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "Verify-token",
            "Security-Question-token",
            "AuthorizationX-1",
            "AuthorizationX-2"
        ]
    );
    assert_eq!(headers[0].1, "verify-DELETE_WALLET");
}

#[tokio::test]
async fn test_claim_inheritance_skips_step_up() {
    let identity = Arc::new(FakeIdentity::new());
    let policy = Arc::new(RecordingPolicy::default());
    let prompt = ScriptedPrompt::new([]);

    let request = PrivilegedRequest::new(
        PrivilegedAction::ClaimInheritance,
        json!({ "magic": "abc" }),
        signed_set(&[SoftwareSigner::random()]),
    );

    flow(&identity, &policy, AuthMode::Federated)
        .execute(request, &prompt)
        .await
        .unwrap();

    assert!(prompt.requests.lock().is_empty());
    assert_eq!(identity.network_calls(), 0);

    let submissions = policy.submissions.lock();
    let names: Vec<&str> = submissions[0].2.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["AuthorizationX-1"]);
}

#[tokio::test]
async fn test_bad_signature_submits_nothing() {
    let identity = Arc::new(FakeIdentity::new());
    let policy = Arc::new(RecordingPolicy::default());
    let prompt = ScriptedPrompt::new([Answer::Submit(PASSWORD)]);

    let mut signatures = signed_set(&[SoftwareSigner::random()]);
    signatures.insert("c0ffee00", "not a signature");

    let err = flow(&identity, &policy, AuthMode::Password)
        .execute(
            PrivilegedRequest::new(PrivilegedAction::EditGroupMembers, json!({}), signatures),
            &prompt,
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AuthzError::Aggregation { ref fingerprint, .. } if fingerprint == "c0ffee00"
    ));
    assert!(policy.submissions.lock().is_empty());
}

#[tokio::test]
async fn test_failed_step_up_submits_nothing() {
    let identity = Arc::new(FakeIdentity::new());
    let policy = Arc::new(RecordingPolicy::default());
    let prompt = ScriptedPrompt::new([Answer::Submit("wrong")]);

    let err = flow(&identity, &policy, AuthMode::Password)
        .execute(
            PrivilegedRequest::new(
                PrivilegedAction::EmergencyLockdown,
                json!({ "period_id": "p1" }),
                signed_set(&[SoftwareSigner::random()]),
            ),
            &prompt,
        )
        .await
        .unwrap_err();

    assert_eq!(err, AuthzError::Verification("Incorrect password".to_string()));
    assert!(policy.submissions.lock().is_empty());
}

#[tokio::test]
async fn test_policy_rejection_surfaces_once() {
    let identity = Arc::new(FakeIdentity::new());
    let policy = Arc::new(RecordingPolicy {
        reject_with: Some("Wallet has pending transactions".to_string()),
        ..RecordingPolicy::default()
    });
    let prompt = ScriptedPrompt::new([Answer::Submit(PASSWORD)]);

    let err = flow(&identity, &policy, AuthMode::Password)
        .execute(
            PrivilegedRequest::new(
                PrivilegedAction::DeleteWallet,
                json!({}),
                signed_set(&[SoftwareSigner::random()]),
            ),
            &prompt,
        )
        .await
        .unwrap_err();

    assert_eq!(
        err,
        AuthzError::Submission("Wallet has pending transactions".to_string())
    );
    assert_eq!(policy.submissions.lock().len(), 1);
}

fn arb_fingerprint() -> impl Strategy<Value = String> {
    "[0-9a-f]{8}"
}

fn arb_signature() -> impl Strategy<Value = String> {
    prop::collection::vec(any::<u8>(), 64..=65).prop_map(hex::encode)
}

proptest! {
    /// Every signer gets exactly one token
    #[test]
    fn prop_one_token_per_signer(
        entries in prop::collection::btree_map(arb_fingerprint(), arb_signature(), 1..6)
    ) {
        let set: SignatureSet = entries.clone().into_iter().collect();
        let bundle = QuorumAggregator::default().build(&set, None, None).unwrap();

        prop_assert_eq!(bundle.tokens.len(), entries.len());
        let prefixes: HashSet<String> = bundle
            .tokens
            .iter()
            .map(|t| t.as_str().split('.').next().unwrap().to_string())
            .collect();
        let expected: HashSet<String> = entries.keys().cloned().collect();
        prop_assert_eq!(prefixes, expected);
    }

    /// A single undecodable signature anywhere fails the build
    #[test]
    fn prop_all_or_nothing(
        entries in prop::collection::btree_map(arb_fingerprint(), arb_signature(), 1..6),
        bad_index in any::<prop::sample::Index>(),
    ) {
        let bad = bad_index.index(entries.len());
        let set: SignatureSet = entries
            .iter()
            .enumerate()
            .map(|(i, (fp, sig))| {
                let sig = if i == bad { format!("{}zz", sig) } else { sig.clone() };
                (fp.clone(), sig)
            })
            .collect();

        let result = QuorumAggregator::default().build(&set, None, None);
        let bad_fingerprint = entries.keys().nth(bad).unwrap();
        let failed_on_bad = matches!(
            result,
            Err(AuthzError::Aggregation { ref fingerprint, .. }) if fingerprint == bad_fingerprint
        );
        prop_assert!(failed_on_bad, "build did not fail on the undecodable signature");
    }
}
