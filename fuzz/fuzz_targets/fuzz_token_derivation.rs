#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tapguard_authz::{AuthzError, QuorumAggregator, SignatureSet};

#[derive(Debug, Arbitrary)]
struct Input {
    entries: Vec<(String, String)>,
}

fuzz_target!(|input: Input| {
    let set: SignatureSet = input.entries.into_iter().collect();

    match QuorumAggregator::default().build(&set, None, None) {
        Ok(bundle) => {
            // One token per signer, each tagged with its signer
            assert_eq!(bundle.tokens.len(), set.len());
            for ((fingerprint, _), token) in set.iter().zip(&bundle.tokens) {
                let (prefix, body) = token.as_str().split_once('.').unwrap();
                assert_eq!(prefix, fingerprint.to_lowercase());
                assert!(!body.contains('='));
            }
        }
        Err(AuthzError::Aggregation { fingerprint, .. }) => {
            assert!(set.contains(&fingerprint));
        }
        Err(other) => panic!("unexpected error: {other:?}"),
    }
});
