//! Confab Cryptographic Primitives
//!
//! Key agreement and the fixed set of primitives the Confab group envelope is
//! built from. Everything here is a pure function except key generation, which
//! draws from an injected [`Entropy`] source so tests can run deterministically.
//!
//! # Key Lifecycle
//!
//! Each identity generates one X25519 key pair per session. On learning a
//! peer's public key, the pairwise secret is derived once and cached for every
//! later message.
//!
//! ```text
//! Random scalar (32 bytes)
//!        │
//!        ▼ X25519 base point
//! Public key ──► SHA-512[..20] ──► Fingerprint (out-of-band check)
//!        │
//!        ▼ X25519(my private, their public)
//! DH output (32 bytes)
//!        │
//!        ▼ SHA-512
//! message key (bytes 0..32) │ MAC key (bytes 32..64)
//! ```
//!
//! # Primitives
//!
//! - AES-256-CTR with the 12-byte IV zero-extended to a 16-byte counter block
//! - HMAC-SHA512 for per-recipient authentication
//! - SHA-512, repeated, for the aggregate envelope tag
//! - Constant-time comparison for every MAC and tag check
//!
//! # Security
//!
//! - Private keys and shared secrets are zeroized on drop
//! - Random source failure is reported, never papered over with weaker bytes

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod entropy;
pub mod error;
pub mod keys;
pub mod primitives;

pub use entropy::{Entropy, OsEntropy, SeededEntropy};
pub use error::CryptoError;
pub use keys::{
    FINGERPRINT_SIZE, Fingerprint, KeyPair, PrivateKey, PublicKey, SharedSecret,
    derive_shared_secret, fingerprint, generate_private_key, public_key_from_private,
};
pub use primitives::{DIGEST_SIZE, IV_SIZE, KEY_SIZE};
