//! Envelope construction.
//!
//! One plaintext, N recipients, one envelope. Each resolved recipient gets
//! the padded plaintext encrypted under their own message key with a fresh
//! IV; every recipient's HMAC covers all ciphertexts and IVs; the aggregate
//! tag binds the plaintext to the full set of HMACs.

use std::collections::BTreeMap;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use confab_crypto::{
    Entropy, IV_SIZE, SharedSecret,
    primitives::{aes256_ctr, hmac_sha512},
};
use zeroize::Zeroize;

use crate::{
    auth::{PADDING_SIZE, aggregate_tag, iv_key, mac_input},
    error::EncryptError,
    recipient::Recipient,
    registry::IvRegistry,
    wire::{Envelope, EnvelopeEntry},
};

/// Maximum IV draws per recipient before giving up.
///
/// A secure source collides with the registry with negligible probability; a
/// source that keeps colliding is broken.
const MAX_IV_ATTEMPTS: u32 = 16;

/// Encrypt `plaintext` to every resolved recipient.
///
/// Recipients without a shared secret are skipped. Entries are ordered by
/// identity regardless of the order of `recipients`; a repeated identity keeps
/// its last secret. Every IV used is recorded in `registry`.
///
/// # Errors
///
/// - `Crypto`: the random source failed
/// - `IvExhausted`: the random source keeps producing registered IVs
pub fn encrypt<E: Entropy>(
    plaintext: &str,
    recipients: &[Recipient],
    registry: &IvRegistry,
    entropy: &E,
) -> Result<Envelope, EncryptError> {
    let resolved: BTreeMap<&str, &SharedSecret> = recipients
        .iter()
        .filter_map(|recipient| recipient.secret().map(|secret| (recipient.identity(), secret)))
        .collect();

    let mut padded = Vec::with_capacity(plaintext.len() + PADDING_SIZE);
    padded.extend_from_slice(plaintext.as_bytes());
    padded.extend_from_slice(&entropy.array::<PADDING_SIZE>()?);

    let mut sealed = Vec::with_capacity(resolved.len());
    for secret in resolved.values() {
        let iv = fresh_iv(registry, entropy)?;
        let ciphertext = aes256_ctr(&padded, secret.message_key(), &iv);
        sealed.push((ciphertext, iv));
    }

    let input = mac_input(sealed.iter().map(|(ciphertext, iv)| (ciphertext.as_slice(), iv)));
    let hmacs: Vec<_> = resolved.values().map(|secret| hmac_sha512(&input, secret.mac_key())).collect();
    let tag = aggregate_tag(&padded, hmacs.iter().map(|hmac| hmac.as_slice()));
    padded.zeroize();

    let text = resolved
        .keys()
        .zip(sealed)
        .zip(&hmacs)
        .map(|((identity, (ciphertext, iv)), hmac)| {
            let entry = EnvelopeEntry {
                message: STANDARD.encode(ciphertext),
                iv: iv_key(&iv),
                hmac: STANDARD.encode(hmac),
            };
            ((*identity).to_string(), entry)
        })
        .collect();

    tracing::debug!(recipients = hmacs.len(), "sealed envelope");

    Ok(Envelope { text, tag })
}

/// Draw an IV that is not yet registered, and register it.
fn fresh_iv<E: Entropy>(registry: &IvRegistry, entropy: &E) -> Result<[u8; IV_SIZE], EncryptError> {
    for _ in 0..MAX_IV_ATTEMPTS {
        let iv = entropy.array::<IV_SIZE>()?;
        if registry.add(&iv_key(&iv)) {
            return Ok(iv);
        }
        tracing::debug!("IV collided with registry, redrawing");
    }

    Err(EncryptError::IvExhausted { attempts: MAX_IV_ATTEMPTS })
}
