//! Hash, MAC and cipher primitives used by the envelope
//!
//! Thin wrappers over the RustCrypto crates with fixed-size outputs so the
//! envelope code never handles `GenericArray` or fallible constructors.

use aes::Aes256;
use ctr::cipher::{KeyIvInit, StreamCipher};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha512};
use subtle::ConstantTimeEq;

type HmacSha512 = Hmac<Sha512>;

/// AES-256 in counter mode, 32-bit big-endian counter in the last four bytes
type Aes256Ctr = ctr::Ctr32BE<Aes256>;

/// Size of a symmetric subkey (32 bytes)
pub const KEY_SIZE: usize = 32;

/// Size of an envelope IV (12 bytes)
pub const IV_SIZE: usize = 12;

/// Size of the AES counter block (16 bytes)
pub const COUNTER_BLOCK_SIZE: usize = 16;

/// SHA-512 digest size (64 bytes)
pub const DIGEST_SIZE: usize = 64;

/// SHA-512 digest of `data`.
pub fn sha512(data: &[u8]) -> [u8; DIGEST_SIZE] {
    let digest = Sha512::digest(data);
    let mut out = [0u8; DIGEST_SIZE];
    out.copy_from_slice(&digest);
    out
}

/// SHA-512 applied `rounds` times in sequence, each round hashing the
/// previous digest.
///
/// At least one round is always applied.
pub fn repeated_sha512(data: &[u8], rounds: u32) -> [u8; DIGEST_SIZE] {
    let mut digest = sha512(data);
    for _ in 1..rounds {
        digest = sha512(&digest);
    }
    digest
}

/// HMAC-SHA512 of `message` under `key`.
pub fn hmac_sha512(message: &[u8], key: &[u8]) -> [u8; DIGEST_SIZE] {
    let Ok(mut mac) = HmacSha512::new_from_slice(key) else {
        unreachable!("HMAC accepts keys of any length");
    };
    mac.update(message);

    let mut out = [0u8; DIGEST_SIZE];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}

/// Counter block for a 12-byte IV.
///
/// Layout:
/// - bytes 0-11: IV
/// - bytes 12-15: block counter, starting at zero
pub fn counter_block(iv: &[u8; IV_SIZE]) -> [u8; COUNTER_BLOCK_SIZE] {
    let mut block = [0u8; COUNTER_BLOCK_SIZE];
    block[..IV_SIZE].copy_from_slice(iv);
    block
}

/// AES-256-CTR keystream applied to `data`.
///
/// Encryption and decryption are the same operation. No padding; output
/// length equals input length.
pub fn aes256_ctr(data: &[u8], key: &[u8; KEY_SIZE], iv: &[u8; IV_SIZE]) -> Vec<u8> {
    let block = counter_block(iv);
    let mut cipher = Aes256Ctr::new(key.into(), (&block).into());

    let mut out = data.to_vec();
    cipher.apply_keystream(&mut out);
    out
}

/// Constant-time equality. Slices of different length compare unequal.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unhex(s: &str) -> Vec<u8> {
        hex::decode(s).unwrap()
    }

    #[test]
    fn sha512_known_answer() {
        // FIPS 180-2 "abc"
        assert_eq!(
            sha512(b"abc").to_vec(),
            unhex(
                "ddaf35a193617abacc417349ae20413112e6fa4e89a97ea20a9eeee64b55d39a\
                 2192992a274fc1a836ba3c23a3feebbd454d4423643ce80e2a9ac94fa54ca49f"
            )
        );
    }

    #[test]
    fn repeated_sha512_applies_every_round() {
        assert_eq!(
            repeated_sha512(b"abc", 8).to_vec(),
            unhex(
                "1b067540e6268c2749549c6dbe3d351dc5eb870958acd989e0b14b6a5e88c34b\
                 bcbf7ebee6164d984d6460b84f4b829a82b31848a1439ea2769da8edebbece24"
            )
        );
    }

    #[test]
    fn repeated_sha512_single_round_is_plain_hash() {
        assert_eq!(repeated_sha512(b"abc", 1), sha512(b"abc"));
        assert_eq!(repeated_sha512(b"abc", 0), sha512(b"abc"));
        assert_eq!(repeated_sha512(b"abc", 2), sha512(&sha512(b"abc")));
    }

    #[test]
    fn hmac_sha512_known_answer() {
        assert_eq!(
            hmac_sha512(b"message", b"key").to_vec(),
            unhex(
                "e477384d7ca229dd1426e64b63ebf2d36ebd6d7e669a6735424e72ea6c01d3f8\
                 b56eb39c36d8232f5427999b8d1a3f9cd1128fc69f4d75b434216810fa367e98"
            )
        );
    }

    #[test]
    fn counter_block_zero_extends_iv() {
        let block = counter_block(&[0xAB; IV_SIZE]);

        assert_eq!(&block[..IV_SIZE], &[0xAB; IV_SIZE]);
        assert_eq!(&block[IV_SIZE..], &[0x00; 4]);
    }

    #[test]
    fn aes256_ctr_known_answer() {
        let mut key = [0u8; KEY_SIZE];
        for (i, byte) in key.iter_mut().enumerate() {
            *byte = i as u8;
        }
        let iv = [0x11; IV_SIZE];

        // 40 bytes crosses into the third counter block
        let keystream = aes256_ctr(&[0u8; 40], &key, &iv);
        assert_eq!(
            keystream,
            unhex(
                "68530e0241c2c4c52115017ac5a5871026d4c02250ad7fb7df80718d11401f3b\
                 806094bfb8002fae"
            )
        );
    }

    #[test]
    fn aes256_ctr_is_an_involution() {
        let key = [0x42; KEY_SIZE];
        let iv = [0x07; IV_SIZE];
        let plaintext = b"the same operation both ways";

        let ciphertext = aes256_ctr(plaintext, &key, &iv);
        assert_ne!(ciphertext.as_slice(), plaintext);
        assert_eq!(aes256_ctr(&ciphertext, &key, &iv), plaintext);
    }

    #[test]
    fn aes256_ctr_empty_input() {
        assert!(aes256_ctr(&[], &[0; KEY_SIZE], &[0; IV_SIZE]).is_empty());
    }

    #[test]
    fn constant_time_eq_behaviour() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
        assert!(constant_time_eq(b"", b""));
    }
}
