//! Key agreement: X25519 key pairs, fingerprints and pairwise shared secrets
//!
//! # Security Properties
//!
//! - Private keys and shared secrets are zeroized on drop
//! - Shared secrets are symmetric: (me, peer) derives the same material as
//!   (peer, me)
//! - Message and MAC subkeys are independent halves of one SHA-512 digest

use std::fmt;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use zeroize::Zeroize;

use crate::{
    entropy::Entropy,
    error::CryptoError,
    primitives::{KEY_SIZE, constant_time_eq, sha512},
};

/// Size of a fingerprint in bytes (40 hex characters)
pub const FINGERPRINT_SIZE: usize = 20;

/// X25519 private scalar.
///
/// Clamping happens inside the scalar multiplication, so any 32 bytes are a
/// valid private key.
#[derive(Clone)]
pub struct PrivateKey([u8; KEY_SIZE]);

impl PrivateKey {
    /// Wrap raw scalar bytes.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Raw scalar bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// Base64 encoding of the raw scalar, for key files.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    /// Decode a base64 scalar.
    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        let mut decoded = STANDARD.decode(encoded).map_err(|_| CryptoError::InvalidEncoding)?;
        let result = <[u8; KEY_SIZE]>::try_from(decoded.as_slice())
            .map(Self)
            .map_err(|_| CryptoError::InvalidPrivateKey { len: decoded.len() });
        decoded.zeroize();
        result
    }
}

impl Drop for PrivateKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(..)")
    }
}

/// X25519 public point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; KEY_SIZE]);

impl PublicKey {
    /// Wrap raw point bytes.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Parse raw point bytes of unchecked length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        <[u8; KEY_SIZE]>::try_from(bytes)
            .map(Self)
            .map_err(|_| CryptoError::InvalidPublicKey { len: bytes.len() })
    }

    /// Raw point bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// Transport encoding (standard base64 with padding).
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    /// Decode the transport encoding.
    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        let decoded = STANDARD.decode(encoded).map_err(|_| CryptoError::InvalidEncoding)?;
        Self::from_slice(&decoded)
    }

    /// Human-verifiable fingerprint of this key.
    pub fn fingerprint(&self) -> Fingerprint {
        fingerprint(self)
    }
}

impl From<&PrivateKey> for PublicKey {
    fn from(private: &PrivateKey) -> Self {
        public_key_from_private(private)
    }
}

/// Truncated SHA-512 of a public key, shown as 40 uppercase hex characters.
///
/// Used for out-of-band verification only; the protocol never consumes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; FINGERPRINT_SIZE]);

impl Fingerprint {
    /// Raw fingerprint bytes.
    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_SIZE] {
        &self.0
    }

    /// Uppercase hex rendering.
    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Pairwise secret shared between two identities.
///
/// Both subkeys come from one SHA-512 digest of the X25519 output:
/// - bytes 0-31: message key (AES-256-CTR)
/// - bytes 32-63: MAC key (HMAC-SHA512)
#[derive(Clone)]
pub struct SharedSecret {
    message_key: [u8; KEY_SIZE],
    mac_key: [u8; KEY_SIZE],
}

impl SharedSecret {
    /// Build a secret from already-split subkeys.
    pub fn from_keys(message_key: [u8; KEY_SIZE], mac_key: [u8; KEY_SIZE]) -> Self {
        Self { message_key, mac_key }
    }

    /// 32-byte AES-256 key for this pair.
    pub fn message_key(&self) -> &[u8; KEY_SIZE] {
        &self.message_key
    }

    /// 32-byte HMAC-SHA512 key for this pair.
    pub fn mac_key(&self) -> &[u8; KEY_SIZE] {
        &self.mac_key
    }
}

impl PartialEq for SharedSecret {
    fn eq(&self, other: &Self) -> bool {
        // Non-short-circuiting so both halves are always compared
        constant_time_eq(&self.message_key, &other.message_key)
            & constant_time_eq(&self.mac_key, &other.mac_key)
    }
}

impl Eq for SharedSecret {}

impl Drop for SharedSecret {
    fn drop(&mut self) {
        self.message_key.zeroize();
        self.mac_key.zeroize();
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(..)")
    }
}

/// An identity's long-lived key pair, created once per session.
#[derive(Debug, Clone)]
pub struct KeyPair {
    private: PrivateKey,
    public: PublicKey,
}

impl KeyPair {
    /// Generate a fresh key pair from `entropy`.
    pub fn generate<E: Entropy>(entropy: &E) -> Result<Self, CryptoError> {
        generate_private_key(entropy).map(Self::from_private_key)
    }

    /// Rebuild a key pair from a stored private key.
    pub fn from_private_key(private: PrivateKey) -> Self {
        let public = public_key_from_private(&private);
        Self { private, public }
    }

    /// Private scalar.
    pub fn private_key(&self) -> &PrivateKey {
        &self.private
    }

    /// Public point.
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Fingerprint of the public key.
    pub fn fingerprint(&self) -> Fingerprint {
        fingerprint(&self.public)
    }

    /// Shared secret with a peer.
    pub fn shared_secret(&self, their_public: &PublicKey) -> SharedSecret {
        derive_shared_secret(&self.private, their_public)
    }
}

/// Draw a private key from the secure random source.
///
/// # Errors
///
/// - `EntropyUnavailable`: the source failed; there is no fallback
pub fn generate_private_key<E: Entropy>(entropy: &E) -> Result<PrivateKey, CryptoError> {
    entropy.array::<KEY_SIZE>().map(PrivateKey)
}

/// Scalar multiplication of `private` with the curve base point.
pub fn public_key_from_private(private: &PrivateKey) -> PublicKey {
    let secret = x25519_dalek::StaticSecret::from(private.0);
    PublicKey(x25519_dalek::PublicKey::from(&secret).to_bytes())
}

/// Fingerprint of a public key: first 20 bytes of SHA-512(raw point).
pub fn fingerprint(public: &PublicKey) -> Fingerprint {
    let digest = sha512(&public.0);
    let mut bytes = [0u8; FINGERPRINT_SIZE];
    bytes.copy_from_slice(&digest[..FINGERPRINT_SIZE]);
    Fingerprint(bytes)
}

/// Derive the pairwise secret between `my_private` and `their_public`.
///
/// SHA-512 over the 32-byte X25519 output, split into message and MAC keys.
/// Runs in constant time with respect to key material.
pub fn derive_shared_secret(my_private: &PrivateKey, their_public: &PublicKey) -> SharedSecret {
    let secret = x25519_dalek::StaticSecret::from(my_private.0);
    let point = x25519_dalek::PublicKey::from(their_public.0);
    let shared = secret.diffie_hellman(&point);

    let mut digest = sha512(shared.as_bytes());
    let mut message_key = [0u8; KEY_SIZE];
    let mut mac_key = [0u8; KEY_SIZE];
    message_key.copy_from_slice(&digest[..KEY_SIZE]);
    mac_key.copy_from_slice(&digest[KEY_SIZE..]);
    digest.zeroize();

    SharedSecret { message_key, mac_key }
}
