//! Recipient identities and their resolved shared secrets

use confab_crypto::SharedSecret;

/// An identity on either end of an envelope.
///
/// The identity label is the sort and lookup key inside an envelope. The
/// secret is the pairwise secret with the local identity, absent until their
/// public key is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    identity: String,
    secret: Option<SharedSecret>,
}

impl Recipient {
    /// Recipient with a resolved shared secret.
    pub fn new(identity: impl Into<String>, secret: SharedSecret) -> Self {
        Self { identity: identity.into(), secret: Some(secret) }
    }

    /// Recipient whose public key is not yet known.
    pub fn unresolved(identity: impl Into<String>) -> Self {
        Self { identity: identity.into(), secret: None }
    }

    /// Identity label.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Shared secret, if resolved.
    pub fn secret(&self) -> Option<&SharedSecret> {
        self.secret.as_ref()
    }

    /// Check if a shared secret is available.
    pub fn is_resolved(&self) -> bool {
        self.secret.is_some()
    }
}
