#![no_main]

use libfuzzer_sys::fuzz_target;
use tapguard_card::{CardError, NativeError, BAD_AUTH_MARKER, RATE_LIMIT_MARKER};

fuzz_target!(|message: String| {
    let err = CardError::from(NativeError(message.clone()));

    // Lockout wins over bad auth when both markers appear
    if message.contains(RATE_LIMIT_MARKER) {
        assert!(matches!(err, CardError::RateLimited(ref m) if *m == message));
    } else if message.contains(BAD_AUTH_MARKER) {
        assert!(matches!(err, CardError::BadAuth(ref m) if *m == message));
    } else {
        assert!(matches!(err, CardError::Protocol(ref m) if *m == message));
    }

    // Never a connection error
    assert!(!matches!(err, CardError::Connection(_)));
});
