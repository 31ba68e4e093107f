//! Error types for key agreement and primitive operations

use thiserror::Error;

/// Errors from key handling and the random source
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// The secure random source could not produce bytes.
    ///
    /// There is no fallback to a weaker source; callers must abort the
    /// operation that needed randomness.
    #[error("secure random source unavailable: {reason}")]
    EntropyUnavailable {
        /// Reason reported by the source
        reason: String,
    },

    /// Public key material has the wrong length
    #[error("invalid public key length: expected 32, got {len}")]
    InvalidPublicKey {
        /// Decoded length
        len: usize,
    },

    /// Private key material has the wrong length
    #[error("invalid private key length: expected 32, got {len}")]
    InvalidPrivateKey {
        /// Decoded length
        len: usize,
    },

    /// Transport encoding (base64) could not be decoded
    #[error("invalid base64 encoding")]
    InvalidEncoding,
}

impl CryptoError {
    /// Returns true if this error is fatal (unrecoverable).
    ///
    /// A missing random source cannot be worked around; malformed key
    /// material only affects the peer that sent it.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::EntropyUnavailable { .. } => true,
            Self::InvalidPublicKey { .. }
            | Self::InvalidPrivateKey { .. }
            | Self::InvalidEncoding => false,
        }
    }
}
