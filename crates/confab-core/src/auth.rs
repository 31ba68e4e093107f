//! MAC and tag construction shared by sealing and opening.
//!
//! Both sides must feed byte-identical input to HMAC and the tag hash, so the
//! concatenation rules live here once:
//!
//! ```text
//! mac_input = ct[r1] ‖ iv[r1] ‖ ct[r2] ‖ iv[r2] ‖ ...      (identity order)
//! hmac[r]   = HMAC-SHA512(key = mac_key[r], mac_input)
//! tag       = SHA-512⁸(padded plaintext ‖ hmac[r1] ‖ hmac[r2] ‖ ...)
//! ```

use base64::{Engine as _, engine::general_purpose::STANDARD};
use confab_crypto::{IV_SIZE, primitives::repeated_sha512};

use crate::{error::EntryField, wire::EnvelopeEntry};

/// Random padding appended to every plaintext (64 bytes)
pub const PADDING_SIZE: usize = 64;

/// SHA-512 rounds for the aggregate tag
pub const TAG_ROUNDS: u32 = 8;

/// Envelope entry with every field decoded to raw bytes.
pub(crate) struct DecodedEntry {
    pub(crate) ciphertext: Vec<u8>,
    pub(crate) iv: [u8; IV_SIZE],
    pub(crate) hmac: Vec<u8>,
}

impl DecodedEntry {
    /// Decode the base64 fields of `entry`. The IV must be exactly 12 bytes.
    pub(crate) fn decode(entry: &EnvelopeEntry) -> Result<Self, EntryField> {
        let ciphertext = STANDARD.decode(&entry.message).map_err(|_| EntryField::Message)?;
        let iv_bytes = STANDARD.decode(&entry.iv).map_err(|_| EntryField::Iv)?;
        let iv = <[u8; IV_SIZE]>::try_from(iv_bytes.as_slice()).map_err(|_| EntryField::Iv)?;
        let hmac = STANDARD.decode(&entry.hmac).map_err(|_| EntryField::Hmac)?;

        Ok(Self { ciphertext, iv, hmac })
    }
}

/// Concatenate every (ciphertext ‖ iv) pair, in the order given.
///
/// Callers MUST pass entries in identity order.
pub(crate) fn mac_input<'a, I>(entries: I) -> Vec<u8>
where
    I: IntoIterator<Item = (&'a [u8], &'a [u8; IV_SIZE])>,
{
    let mut input = Vec::new();
    for (ciphertext, iv) in entries {
        input.extend_from_slice(ciphertext);
        input.extend_from_slice(iv);
    }
    input
}

/// Aggregate tag over the padded plaintext and every HMAC, in the order given.
pub(crate) fn aggregate_tag<'a, I>(padded_plaintext: &[u8], hmacs: I) -> String
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut input = padded_plaintext.to_vec();
    for hmac in hmacs {
        input.extend_from_slice(hmac);
    }
    STANDARD.encode(repeated_sha512(&input, TAG_ROUNDS))
}

/// Canonical registry key for an IV.
pub(crate) fn iv_key(iv: &[u8; IV_SIZE]) -> String {
    STANDARD.encode(iv)
}
