//! Error types for envelope construction, verification and session handling.
//!
//! Every decryption failure names the sender so callers can attribute a
//! rejected envelope without parsing strings. No error variant carries
//! plaintext, partial or otherwise.

use std::fmt;

use confab_crypto::CryptoError;
use thiserror::Error;

/// Envelope entry field, for pinpointing malformed input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryField {
    /// Base64 ciphertext
    Message,
    /// Base64 IV (must decode to 12 bytes)
    Iv,
    /// Base64 per-recipient HMAC
    Hmac,
}

impl fmt::Display for EntryField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Message => "message",
            Self::Iv => "iv",
            Self::Hmac => "hmac",
        })
    }
}

/// Errors from building an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncryptError {
    /// Random source failed while drawing padding or IVs
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Every IV drawn collided with the registry.
    ///
    /// Only reachable with a broken random source.
    #[error("no unused IV after {attempts} attempts")]
    IvExhausted {
        /// Draws attempted
        attempts: u32,
    },
}

/// Errors from opening an envelope.
///
/// Each variant corresponds to one verification gate; the first failing gate
/// halts processing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecryptError {
    /// The envelope has no entry for our identity
    #[error("message from {sender} is not addressed to {recipient}")]
    NotAddressedToMe {
        /// Claimed sender
        sender: String,
        /// Our identity
        recipient: String,
    },

    /// No shared secret with the sender
    #[error("no shared secret with sender {sender}")]
    MissingSenderKey {
        /// Claimed sender
        sender: String,
    },

    /// An entry field is not valid base64 or has the wrong length
    #[error("malformed {field} in entry for {identity} from {sender}")]
    MalformedEnvelope {
        /// Claimed sender
        sender: String,
        /// Identity whose entry is malformed
        identity: String,
        /// Offending field
        field: EntryField,
    },

    /// Our per-recipient HMAC does not match
    #[error("authentication failed for message from {sender}")]
    AuthenticationFailure {
        /// Claimed sender
        sender: String,
    },

    /// Our IV has been seen before
    #[error("replayed message from {sender}")]
    ReplayDetected {
        /// Claimed sender
        sender: String,
    },

    /// Decrypted body is shorter than the padding suffix
    #[error("invalid plaintext size {len} in message from {sender}")]
    InvalidPlaintextSize {
        /// Claimed sender
        sender: String,
        /// Decrypted length in bytes
        len: usize,
    },

    /// Aggregate tag does not match the plaintext and MAC set
    #[error("tag verification failed for message from {sender}")]
    TagFailure {
        /// Claimed sender
        sender: String,
    },
}

impl DecryptError {
    /// Returns true if the envelope was forged, tampered with or replayed.
    ///
    /// The remaining variants reflect local state (no key yet) or an envelope
    /// meant for others, and may resolve once keys are exchanged.
    pub fn is_security_violation(&self) -> bool {
        match self {
            Self::MalformedEnvelope { .. }
            | Self::AuthenticationFailure { .. }
            | Self::ReplayDetected { .. }
            | Self::InvalidPlaintextSize { .. }
            | Self::TagFailure { .. } => true,

            Self::NotAddressedToMe { .. } | Self::MissingSenderKey { .. } => false,
        }
    }

    /// Sender named by the envelope.
    pub fn sender(&self) -> &str {
        match self {
            Self::NotAddressedToMe { sender, .. }
            | Self::MissingSenderKey { sender }
            | Self::MalformedEnvelope { sender, .. }
            | Self::AuthenticationFailure { sender }
            | Self::ReplayDetected { sender }
            | Self::InvalidPlaintextSize { sender, .. }
            | Self::TagFailure { sender } => sender,
        }
    }
}

/// Errors from the JSON wire format.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    /// Input is not a valid wire message
    #[error("malformed wire message: {reason}")]
    Malformed {
        /// Parser diagnostic
        reason: String,
    },

    /// A message of another type arrived where a specific one was expected
    #[error("unexpected message type: expected {expected}, got {actual}")]
    UnexpectedType {
        /// Expected `type` value
        expected: &'static str,
        /// Received `type` value
        actual: &'static str,
    },
}

impl From<serde_json::Error> for WireError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed { reason: err.to_string() }
    }
}

/// Errors surfaced by [`crate::Session`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Wire decoding failed
    #[error(transparent)]
    Wire(#[from] WireError),

    /// Envelope construction failed
    #[error(transparent)]
    Encrypt(#[from] EncryptError),

    /// Envelope verification failed
    #[error(transparent)]
    Decrypt(#[from] DecryptError),

    /// Key material was invalid or randomness unavailable
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Identity is not on the session roster
    #[error("unknown member: {identity}")]
    UnknownMember {
        /// Identity that was looked up
        identity: String,
    },
}
