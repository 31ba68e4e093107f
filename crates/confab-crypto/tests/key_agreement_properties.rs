//! Property-based tests for key agreement and primitive wrappers
//!
//! 1. **Symmetry**: both sides of a pair derive the same shared secret
//! 2. **Separation**: different peers yield different secrets
//! 3. **Fingerprint shape**: always 40 uppercase hex characters
//! 4. **CTR involution**: encrypting twice with the same key and IV is identity

use confab_crypto::{
    KeyPair, PrivateKey, SharedSecret,
    primitives::{aes256_ctr, hmac_sha512},
};
use proptest::prelude::*;

fn key_pair() -> impl Strategy<Value = KeyPair> {
    any::<[u8; 32]>().prop_map(|bytes| KeyPair::from_private_key(PrivateKey::from_bytes(bytes)))
}

proptest! {
    #[test]
    fn prop_shared_secret_is_symmetric(alice in key_pair(), bob in key_pair()) {
        let from_alice = alice.shared_secret(bob.public_key());
        let from_bob = bob.shared_secret(alice.public_key());

        prop_assert_eq!(from_alice, from_bob);
    }

    #[test]
    fn prop_distinct_peers_get_distinct_secrets(
        alice in key_pair(),
        bob in key_pair(),
        carol in key_pair(),
    ) {
        prop_assume!(bob.public_key() != carol.public_key());

        let with_bob = alice.shared_secret(bob.public_key());
        let with_carol = alice.shared_secret(carol.public_key());

        prop_assert_ne!(with_bob.message_key(), with_carol.message_key());
        prop_assert_ne!(with_bob.mac_key(), with_carol.mac_key());
    }

    #[test]
    fn prop_fingerprint_is_forty_uppercase_hex(keys in key_pair()) {
        let hex = keys.fingerprint().to_hex();

        prop_assert_eq!(hex.len(), 40);
        prop_assert!(hex.chars().all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
    }

    #[test]
    fn prop_ctr_is_an_involution(
        data in prop::collection::vec(any::<u8>(), 0..512),
        key in any::<[u8; 32]>(),
        iv in any::<[u8; 12]>(),
    ) {
        let ciphertext = aes256_ctr(&data, &key, &iv);
        prop_assert_eq!(ciphertext.len(), data.len());
        prop_assert_eq!(aes256_ctr(&ciphertext, &key, &iv), data);
    }

    #[test]
    fn prop_mac_keys_are_independent(
        message in prop::collection::vec(any::<u8>(), 0..128),
        secret in any::<([u8; 32], [u8; 32])>(),
    ) {
        let secret = SharedSecret::from_keys(secret.0, secret.1);
        prop_assume!(secret.message_key() != secret.mac_key());

        prop_assert_ne!(
            hmac_sha512(&message, secret.mac_key()),
            hmac_sha512(&message, secret.message_key())
        );
    }
}
