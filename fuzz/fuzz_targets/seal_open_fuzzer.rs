//! Fuzz target for sealing and opening group envelopes
//!
//! # Strategy
//!
//! - Arbitrary plaintexts, including empty and non-ASCII
//! - Arbitrary recipient sets with arbitrary pairwise secrets
//! - A sequence of tamper operations applied before opening
//!
//! # Invariants
//!
//! - Sealing never panics
//! - An untampered envelope opens to the plaintext for every recipient
//! - A tampered envelope never opens to a different plaintext
//! - An envelope opened once is rejected the second time

#![no_main]

use std::collections::BTreeMap;

use arbitrary::Arbitrary;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use confab_core::{decrypt, encrypt, DecryptError, Envelope, IvRegistry, Recipient};
use confab_crypto::{SeededEntropy, SharedSecret};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Clone, Arbitrary)]
struct SealScenario {
    plaintext: String,
    /// Recipient slot and key material; repeated slots collapse
    recipients: Vec<(u8, [u8; 32], [u8; 32])>,
    /// Entropy seed
    seed: u64,
    /// Tampering applied to a copy of the sealed envelope
    tampering: Vec<Tamper>,
}

#[derive(Debug, Clone, Arbitrary)]
enum Tamper {
    FlipMessage { slot: u8, byte: u16 },
    FlipIv { slot: u8, byte: u16 },
    FlipHmac { slot: u8, byte: u16 },
    Drop { slot: u8 },
    SwapMessages { a: u8, b: u8 },
    ReplaceTag { tag: String },
}

fn name(slot: u8) -> String {
    format!("member-{}", slot % 16)
}

fn flip(encoded: &str, byte: u16) -> String {
    let Ok(mut bytes) = STANDARD.decode(encoded) else {
        return encoded.to_string();
    };
    if bytes.is_empty() {
        return encoded.to_string();
    }
    let index = usize::from(byte) % bytes.len();
    bytes[index] ^= 0x80;
    STANDARD.encode(bytes)
}

fn apply(envelope: &mut Envelope, tamper: &Tamper) {
    match tamper {
        Tamper::FlipMessage { slot, byte } => {
            if let Some(entry) = envelope.text.get_mut(&name(*slot)) {
                entry.message = flip(&entry.message, *byte);
            }
        },
        Tamper::FlipIv { slot, byte } => {
            if let Some(entry) = envelope.text.get_mut(&name(*slot)) {
                entry.iv = flip(&entry.iv, *byte);
            }
        },
        Tamper::FlipHmac { slot, byte } => {
            if let Some(entry) = envelope.text.get_mut(&name(*slot)) {
                entry.hmac = flip(&entry.hmac, *byte);
            }
        },
        Tamper::Drop { slot } => {
            envelope.text.remove(&name(*slot));
        },
        Tamper::SwapMessages { a, b } => {
            let (a, b) = (name(*a), name(*b));
            if let (Some(first), Some(second)) = (envelope.text.get(&a), envelope.text.get(&b)) {
                let (first, second) = (first.message.clone(), second.message.clone());
                if let Some(entry) = envelope.text.get_mut(&a) {
                    entry.message = second;
                }
                if let Some(entry) = envelope.text.get_mut(&b) {
                    entry.message = first;
                }
            }
        },
        Tamper::ReplaceTag { tag } => envelope.tag = tag.clone(),
    }
}

fuzz_target!(|scenario: SealScenario| {
    let keys: BTreeMap<String, SharedSecret> = scenario
        .recipients
        .iter()
        .map(|(slot, message_key, mac_key)| (name(*slot), SharedSecret::from_keys(*message_key, *mac_key)))
        .collect();
    let recipients: Vec<_> =
        keys.iter().map(|(identity, secret)| Recipient::new(identity.clone(), secret.clone())).collect();

    // INVARIANT 1: Sealing never panics
    let envelope = encrypt(
        &scenario.plaintext,
        &recipients,
        &IvRegistry::new(),
        &SeededEntropy::new(scenario.seed),
    )
    .expect("seeded entropy never fails");

    let mut tampered = envelope.clone();
    for tamper in &scenario.tampering {
        apply(&mut tampered, tamper);
    }

    for (identity, secret) in &keys {
        let sender = Recipient::new("sender", secret.clone());
        let registry = IvRegistry::new();

        // INVARIANT 2: Untampered envelopes open for everyone
        let opened = decrypt(&envelope, &sender, identity, keys.keys(), &registry)
            .expect("untampered envelope must open");
        assert_eq!(opened.plaintext, scenario.plaintext);
        assert!(opened.missing_recipients.is_empty());

        // INVARIANT 3: Second open is a replay
        let replay = decrypt(&envelope, &sender, identity, keys.keys(), &registry);
        assert!(matches!(replay, Err(DecryptError::ReplayDetected { .. })));

        // INVARIANT 4: Tampering never changes the plaintext
        if let Ok(opened) = decrypt(&tampered, &sender, identity, keys.keys(), &IvRegistry::new()) {
            assert_eq!(opened.plaintext, scenario.plaintext, "tampered envelope opened to new text");
        }
    }
});
