//! Envelope verification and decryption.
//!
//! Opening runs a fixed sequence of gates. The first gate that fails halts
//! processing with its own error; nothing decrypted is returned unless every
//! gate passes.
//!
//! ```text
//! addressed to me? ─► sender key? ─► decode entries ─► HMAC ─► fresh IV?
//!        ─► decrypt ─► size ≥ 64 ─► tag ─► strip padding ─► UTF-8
//! ```

use std::collections::{BTreeMap, BTreeSet};

use confab_crypto::primitives::{aes256_ctr, constant_time_eq, hmac_sha512};
use zeroize::Zeroize;

use crate::{
    auth::{DecodedEntry, PADDING_SIZE, aggregate_tag, iv_key, mac_input},
    error::DecryptError,
    recipient::Recipient,
    registry::IvRegistry,
    wire::Envelope,
};

/// Result of opening an envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decrypted {
    /// Recovered text.
    ///
    /// Empty when the verified body is not valid UTF-8.
    pub plaintext: String,
    /// Known identities, other than the sender, with no entry in the envelope
    pub missing_recipients: Vec<String>,
}

/// Open `envelope` as `my_identity`, sent by `sender`.
///
/// `known_identities` is the caller's view of who should have been addressed;
/// any of them (other than the sender) without an entry is reported in
/// [`Decrypted::missing_recipients`]. The envelope's IV for `my_identity` is
/// recorded in `registry` as soon as the HMAC verifies.
///
/// A body that passes every check but is not valid UTF-8 yields an empty
/// plaintext rather than an error.
///
/// # Errors
///
/// In gate order: `NotAddressedToMe`, `MissingSenderKey`,
/// `MalformedEnvelope`, `AuthenticationFailure`, `ReplayDetected`,
/// `InvalidPlaintextSize`, `TagFailure`.
pub fn decrypt<I>(
    envelope: &Envelope,
    sender: &Recipient,
    my_identity: &str,
    known_identities: I,
    registry: &IvRegistry,
) -> Result<Decrypted, DecryptError>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let sender_id = sender.identity();

    let not_addressed = || DecryptError::NotAddressedToMe {
        sender: sender_id.to_string(),
        recipient: my_identity.to_string(),
    };

    if !envelope.is_addressed_to(my_identity) {
        return Err(not_addressed());
    }

    let Some(secret) = sender.secret() else {
        return Err(DecryptError::MissingSenderKey { sender: sender_id.to_string() });
    };

    let missing_recipients: Vec<String> = known_identities
        .into_iter()
        .filter(|identity| {
            let identity = identity.as_ref();
            identity != sender_id && !envelope.is_addressed_to(identity)
        })
        .map(|identity| identity.as_ref().to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut entries = BTreeMap::new();
    for (identity, entry) in &envelope.text {
        let decoded = DecodedEntry::decode(entry).map_err(|field| DecryptError::MalformedEnvelope {
            sender: sender_id.to_string(),
            identity: identity.clone(),
            field,
        })?;
        entries.insert(identity.as_str(), decoded);
    }

    let Some(mine) = entries.get(my_identity) else {
        return Err(not_addressed());
    };

    let input = mac_input(entries.values().map(|e| (e.ciphertext.as_slice(), &e.iv)));
    let expected_hmac = hmac_sha512(&input, secret.mac_key());
    if !constant_time_eq(&mine.hmac, &expected_hmac) {
        return Err(DecryptError::AuthenticationFailure { sender: sender_id.to_string() });
    }

    if !registry.add(&iv_key(&mine.iv)) {
        return Err(DecryptError::ReplayDetected { sender: sender_id.to_string() });
    }

    let mut padded = aes256_ctr(&mine.ciphertext, secret.message_key(), &mine.iv);

    if padded.len() < PADDING_SIZE {
        let len = padded.len();
        padded.zeroize();
        return Err(DecryptError::InvalidPlaintextSize { sender: sender_id.to_string(), len });
    }

    let tag = aggregate_tag(&padded, entries.values().map(|e| e.hmac.as_slice()));
    if !constant_time_eq(tag.as_bytes(), envelope.tag.as_bytes()) {
        padded.zeroize();
        return Err(DecryptError::TagFailure { sender: sender_id.to_string() });
    }

    padded.truncate(padded.len() - PADDING_SIZE);
    let plaintext = String::from_utf8(padded).unwrap_or_else(|err| {
        tracing::warn!(sender = %sender_id, "verified message body is not valid UTF-8, dropping text");
        err.into_bytes().zeroize();
        String::new()
    });

    Ok(Decrypted { plaintext, missing_recipients })
}

#[cfg(test)]
mod tests {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use confab_crypto::{
        SeededEntropy, SharedSecret,
        primitives::{aes256_ctr, hmac_sha512},
    };

    use super::*;
    use crate::seal::encrypt;

    const NO_KNOWN: [&str; 0] = [];

    fn secret(seed: u8) -> SharedSecret {
        SharedSecret::from_keys([seed; 32], [seed.wrapping_add(100); 32])
    }

    /// Envelope from the point of view of a single recipient that shares
    /// `secret(1)` with the sender.
    fn sealed_for_ann(plaintext: &str) -> Envelope {
        let recipients = vec![Recipient::new("ann", secret(1)), Recipient::new("zed", secret(2))];
        encrypt(plaintext, &recipients, &IvRegistry::new(), &SeededEntropy::new(5)).unwrap()
    }

    /// Rebuild an envelope for one recipient around an arbitrary padded body,
    /// with a valid HMAC and a valid tag.
    fn forge_single(body: &[u8], key: &SharedSecret) -> Envelope {
        let iv = [3u8; 12];
        let ciphertext = aes256_ctr(body, key.message_key(), &iv);

        let mut input = ciphertext.clone();
        input.extend_from_slice(&iv);
        let hmac = hmac_sha512(&input, key.mac_key());
        let tag = aggregate_tag(body, [hmac.as_slice()]);

        let mut text = BTreeMap::new();
        text.insert(
            "ann".to_string(),
            crate::wire::EnvelopeEntry {
                message: STANDARD.encode(&ciphertext),
                iv: STANDARD.encode(iv),
                hmac: STANDARD.encode(hmac),
            },
        );
        Envelope { text, tag }
    }

    #[test]
    fn opens_for_addressed_recipient() {
        let envelope = sealed_for_ann("hello there");
        let sender = Recipient::new("sam", secret(1));

        let opened = decrypt(&envelope, &sender, "ann", NO_KNOWN, &IvRegistry::new()).unwrap();

        assert_eq!(opened.plaintext, "hello there");
        assert!(opened.missing_recipients.is_empty());
    }

    #[test]
    fn not_addressed_to_me() {
        let envelope = sealed_for_ann("hi");
        let sender = Recipient::new("sam", secret(1));

        let result = decrypt(&envelope, &sender, "bob", NO_KNOWN, &IvRegistry::new());

        assert_eq!(
            result,
            Err(DecryptError::NotAddressedToMe {
                sender: "sam".to_string(),
                recipient: "bob".to_string()
            })
        );
    }

    #[test]
    fn missing_sender_key() {
        let envelope = sealed_for_ann("hi");

        let result =
            decrypt(&envelope, &Recipient::unresolved("sam"), "ann", NO_KNOWN, &IvRegistry::new());

        assert_eq!(result, Err(DecryptError::MissingSenderKey { sender: "sam".to_string() }));
    }

    #[test]
    fn wrong_sender_key_fails_authentication() {
        let envelope = sealed_for_ann("hi");
        let sender = Recipient::new("sam", secret(9));

        let result = decrypt(&envelope, &sender, "ann", NO_KNOWN, &IvRegistry::new());

        assert_eq!(result, Err(DecryptError::AuthenticationFailure { sender: "sam".to_string() }));
    }

    #[test]
    fn failed_authentication_does_not_register_iv() {
        let envelope = sealed_for_ann("hi");
        let registry = IvRegistry::new();

        let _ = decrypt(&envelope, &Recipient::new("sam", secret(9)), "ann", NO_KNOWN, &registry);

        assert!(registry.is_empty());
    }

    #[test]
    fn replay_is_rejected() {
        let envelope = sealed_for_ann("hi");
        let sender = Recipient::new("sam", secret(1));
        let registry = IvRegistry::new();

        assert!(decrypt(&envelope, &sender, "ann", NO_KNOWN, &registry).is_ok());
        assert_eq!(
            decrypt(&envelope, &sender, "ann", NO_KNOWN, &registry),
            Err(DecryptError::ReplayDetected { sender: "sam".to_string() })
        );
    }

    #[test]
    fn missing_recipients_exclude_sender_and_are_sorted() {
        let envelope = sealed_for_ann("hi");
        let sender = Recipient::new("sam", secret(1));
        let known = ["zoe", "sam", "ann", "zed", "carl", "zoe"];

        let opened = decrypt(&envelope, &sender, "ann", known, &IvRegistry::new()).unwrap();

        assert_eq!(opened.missing_recipients, vec!["carl".to_string(), "zoe".to_string()]);
    }

    #[test]
    fn short_body_fails_size_check_before_tag() {
        let key = secret(1);
        let mut envelope = forge_single(&[0u8; PADDING_SIZE - 1], &key);
        // Break the tag too; the size gate must fire first
        envelope.tag = "garbage".to_string();

        let result = decrypt(&envelope, &Recipient::new("sam", key), "ann", NO_KNOWN, &IvRegistry::new());

        assert_eq!(
            result,
            Err(DecryptError::InvalidPlaintextSize { sender: "sam".to_string(), len: PADDING_SIZE - 1 })
        );
    }

    #[test]
    fn exact_padding_yields_empty_text() {
        let key = secret(1);
        let envelope = forge_single(&[0u8; PADDING_SIZE], &key);

        let opened =
            decrypt(&envelope, &Recipient::new("sam", key), "ann", NO_KNOWN, &IvRegistry::new()).unwrap();

        assert_eq!(opened.plaintext, "");
    }

    #[test]
    fn invalid_utf8_yields_empty_text() {
        let key = secret(1);
        let mut body = vec![0xFF, 0xFE, 0xC3];
        body.extend_from_slice(&[0u8; PADDING_SIZE]);
        let envelope = forge_single(&body, &key);

        let opened =
            decrypt(&envelope, &Recipient::new("sam", key), "ann", NO_KNOWN, &IvRegistry::new()).unwrap();

        assert_eq!(opened.plaintext, "");
    }

    #[test]
    fn tampered_tag_fails() {
        let mut envelope = sealed_for_ann("hi");
        envelope.tag = STANDARD.encode([0u8; 64]);

        let result =
            decrypt(&envelope, &Recipient::new("sam", secret(1)), "ann", NO_KNOWN, &IvRegistry::new());

        assert_eq!(result, Err(DecryptError::TagFailure { sender: "sam".to_string() }));
    }

    #[test]
    fn malformed_iv_is_reported() {
        let mut envelope = sealed_for_ann("hi");
        if let Some(entry) = envelope.text.get_mut("zed") {
            entry.iv = STANDARD.encode([0u8; 8]);
        }

        let result =
            decrypt(&envelope, &Recipient::new("sam", secret(1)), "ann", NO_KNOWN, &IvRegistry::new());

        assert_eq!(
            result,
            Err(DecryptError::MalformedEnvelope {
                sender: "sam".to_string(),
                identity: "zed".to_string(),
                field: crate::error::EntryField::Iv,
            })
        );
    }
}
