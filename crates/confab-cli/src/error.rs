//! CLI error type.

use std::{io, path::PathBuf};

use confab_core::{EncryptError, SessionError, WireError};
use confab_crypto::CryptoError;
use thiserror::Error;

/// Everything a `confab` command can fail with.
#[derive(Debug, Error)]
pub enum CliError {
    /// Reading or writing a file or stdio failed
    #[error("{context}: {source}")]
    Io {
        /// What was being done
        context: String,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Key file is not valid JSON or misses a field
    #[error("invalid key file {path}: {source}")]
    KeyFile {
        /// File that failed to parse
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },

    /// Key file's public key does not belong to its private key
    #[error("key file {path} holds a public key that does not match its private key")]
    KeyMismatch {
        /// Offending file
        path: PathBuf,
    },

    /// Key material could not be decoded
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Sealing failed
    #[error(transparent)]
    Encrypt(#[from] EncryptError),

    /// Wire encoding failed
    #[error(transparent)]
    Wire(#[from] WireError),

    /// Opening failed
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Input was a valid wire message but not an encrypted one
    #[error("expected an encrypted message, got {kind}")]
    NotAMessage {
        /// What arrived instead
        kind: String,
    },
}

impl CliError {
    pub(crate) fn io(context: impl Into<String>) -> impl FnOnce(io::Error) -> Self {
        let context = context.into();
        move |source| Self::Io { context, source }
    }

    /// Exit code for this failure.
    ///
    /// Rejected messages get their own code so scripts can tell "not for
    /// you" or "forged" apart from plumbing problems.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Session(SessionError::Decrypt(err)) if err.is_security_violation() => 3,
            Self::Session(_) | Self::NotAMessage { .. } => 4,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use confab_core::DecryptError;

    use super::*;

    #[test]
    fn security_violations_have_distinct_exit_code() {
        let forged = CliError::Session(SessionError::Decrypt(DecryptError::TagFailure {
            sender: "sam".to_string(),
        }));
        let stranger = CliError::Session(SessionError::Decrypt(DecryptError::NotAddressedToMe {
            sender: "sam".to_string(),
            recipient: "ann".to_string(),
        }));
        let plumbing = CliError::KeyMismatch { path: PathBuf::from("k.json") };

        assert_eq!(forged.exit_code(), 3);
        assert_eq!(stranger.exit_code(), 4);
        assert_eq!(plumbing.exit_code(), 1);
    }

    #[test]
    fn io_context_is_reported() {
        let err = CliError::io("reading stdin")(io::Error::other("closed"));

        assert_eq!(err.to_string(), "reading stdin: closed");
    }
}
