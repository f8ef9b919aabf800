#![no_main]

//! Fuzz target for envelope decoding.
//!
//! Arbitrary stream payloads must never panic the decoder, and anything it
//! accepts must satisfy the forwarding invariants: no reserved key among the
//! headers, and a body that is itself valid JSON.

use hookrelay_core::{decode, RESERVED_KEYS};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };

    let Ok(message) = decode(raw) else {
        return;
    };

    for key in RESERVED_KEYS {
        assert!(!message.headers.contains_key(key), "reserved key {key} forwarded as header");
    }
    assert!(serde_json::from_str::<serde_json::Value>(&message.body).is_ok());

    // Decoding is deterministic.
    let again = decode(raw).expect("second decode of accepted input");
    assert_eq!(again, message);
});
