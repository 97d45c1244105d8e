#![no_main]

use libfuzzer_sys::fuzz_target;
use tapguard_core::Fingerprint;

fuzz_target!(|data: &str| {
    if let Ok(fingerprint) = Fingerprint::from_hex(data) {
        assert_eq!(data.len(), 8);

        // Canonical form is lowercase and parses back to the same value
        let canonical = fingerprint.to_hex();
        assert_eq!(canonical, data.to_lowercase());
        assert_eq!(Fingerprint::from_hex(&canonical).unwrap(), fingerprint);
    }
});
