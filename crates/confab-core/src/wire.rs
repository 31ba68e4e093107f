//! JSON wire messages.
//!
//! Three message types share one object shape, discriminated by `type`:
//!
//! ```text
//! {"type":"message","text":{"<id>":{"message":b64,"iv":b64,"hmac":b64},...},"tag":b64}
//! {"type":"publicKey","text":{"<id>":{"message":b64}}}
//! {"type":"publicKeyRequest","text":"<id>"}
//! ```
//!
//! # Invariants
//!
//! - Field names are fixed for interoperability and never renamed
//! - Envelope entries live in a `BTreeMap`, so iteration and serialization
//!   follow the byte-wise identity order the MAC construction depends on

use std::collections::BTreeMap;

use confab_crypto::PublicKey;
use serde::{Deserialize, Serialize};

use crate::error::WireError;

/// One recipient's slot in an envelope (all fields base64).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeEntry {
    /// AES-256-CTR ciphertext of the padded plaintext
    pub message: String,
    /// 12-byte IV
    pub iv: String,
    /// HMAC-SHA512 over every entry's ciphertext and IV
    pub hmac: String,
}

/// Encrypted group message addressed to a fixed set of identities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Entries keyed by recipient identity
    pub text: BTreeMap<String, EnvelopeEntry>,
    /// Aggregate tag binding the plaintext to every entry's HMAC
    pub tag: String,
}

impl Envelope {
    /// Addressed identities, in protocol order.
    pub fn recipients(&self) -> impl Iterator<Item = &str> {
        self.text.keys().map(String::as_str)
    }

    /// Entry for one identity.
    pub fn entry(&self, identity: &str) -> Option<&EnvelopeEntry> {
        self.text.get(identity)
    }

    /// Check if `identity` has an entry.
    pub fn is_addressed_to(&self, identity: &str) -> bool {
        self.text.contains_key(identity)
    }

    /// Encode as a `message` wire object.
    pub fn to_json(&self) -> Result<String, WireError> {
        Ok(serde_json::to_string(&WireMessageRef::Message(self))?)
    }

    /// Decode a `message` wire object.
    ///
    /// # Errors
    ///
    /// - `Malformed`: not valid JSON or missing fields
    /// - `UnexpectedType`: a valid wire message of another type
    pub fn from_json(json: &str) -> Result<Self, WireError> {
        match WireMessage::decode(json)? {
            WireMessage::Message(envelope) => Ok(envelope),
            other => Err(WireError::UnexpectedType { expected: "message", actual: other.kind() }),
        }
    }
}

/// Public key addressed to one identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyEntry {
    /// Base64 X25519 public key
    pub message: String,
}

/// `publicKey` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyAnnouncement {
    /// Keyed by the identity the announcement is meant for
    pub text: BTreeMap<String, PublicKeyEntry>,
}

/// `publicKeyRequest` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyRequest {
    /// Identity asked to respond. `None` asks everyone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Every message type on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WireMessage {
    /// Encrypted group message
    #[serde(rename = "message")]
    Message(Envelope),
    /// Sender's public key
    #[serde(rename = "publicKey")]
    PublicKey(PublicKeyAnnouncement),
    /// Ask for a public key
    #[serde(rename = "publicKeyRequest")]
    PublicKeyRequest(PublicKeyRequest),
}

/// Borrowing twin of [`WireMessage`] so encoding an envelope does not clone it.
#[derive(Serialize)]
#[serde(tag = "type")]
enum WireMessageRef<'a> {
    #[serde(rename = "message")]
    Message(&'a Envelope),
}

impl WireMessage {
    /// Announce `public_key` to `recipient`.
    pub fn public_key(recipient: &str, public_key: &PublicKey) -> Self {
        let mut text = BTreeMap::new();
        text.insert(recipient.to_string(), PublicKeyEntry { message: public_key.to_base64() });
        Self::PublicKey(PublicKeyAnnouncement { text })
    }

    /// Ask `recipient` (or everyone, with `None`) for their public key.
    pub fn public_key_request(recipient: Option<&str>) -> Self {
        Self::PublicKeyRequest(PublicKeyRequest { text: recipient.map(str::to_string) })
    }

    /// Value of the `type` field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Message(_) => "message",
            Self::PublicKey(_) => "publicKey",
            Self::PublicKeyRequest(_) => "publicKeyRequest",
        }
    }

    /// Encode as JSON.
    pub fn encode(&self) -> Result<String, WireError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode from JSON.
    pub fn decode(json: &str) -> Result<Self, WireError> {
        Ok(serde_json::from_str(json)?)
    }
}
