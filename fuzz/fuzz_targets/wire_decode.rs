//! Fuzz target for WireMessage::decode
//!
//! Feeds arbitrary bytes to the JSON wire decoder to find:
//! - Parser panics on malformed JSON or unknown `type` tags
//! - Envelopes that decode but fail to re-encode
//!
//! The fuzzer should NEVER panic. All invalid inputs should return an error.

#![no_main]

use confab_core::{Envelope, WireMessage};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(json) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(message) = WireMessage::decode(json) {
        // Anything accepted must encode again and decode to the same value
        let encoded = message.encode().expect("decoded message must re-encode");
        let again = WireMessage::decode(&encoded).expect("re-encoded message must decode");
        assert_eq!(message, again);
    }

    let _ = Envelope::from_json(json);
});
