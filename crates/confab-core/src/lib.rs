//! Confab Group Envelope
//!
//! Sends one plaintext to many recipients who each share a distinct pairwise
//! secret with the sender. Every recipient can verify that the envelope they
//! open is the same envelope everyone else received, and notice when someone
//! they expected was left out.
//!
//! # Envelope Construction
//!
//! ```text
//! plaintext ‖ 64 random bytes
//!        │
//!        ▼ for each recipient, in identity order
//! AES-256-CTR(message_key[r], fresh IV[r]) ──► ct[r]
//!        │
//!        ▼
//! HMAC-SHA512(mac_key[r], ct[1] ‖ iv[1] ‖ … ‖ ct[n] ‖ iv[n]) ──► hmac[r]
//!        │
//!        ▼
//! SHA-512⁸(padded plaintext ‖ hmac[1] ‖ … ‖ hmac[n]) ──► tag
//! ```
//!
//! # Security
//!
//! Cross-recipient binding:
//! - Each HMAC covers every recipient's ciphertext and IV, so altering or
//!   dropping any entry breaks verification for all recipients
//! - The tag binds the plaintext to the full HMAC set, so a recipient cannot
//!   re-use another recipient's slot to deliver different content
//!
//! Freshness:
//! - IVs are recorded in a per-session [`IvRegistry`]; a repeated IV on
//!   receive is a replay
//! - Sealing never reuses an IV the session has sent or seen
//!
//! Fail-closed:
//! - Every verification gate halts with a typed [`DecryptError`]
//! - No partially verified plaintext is ever returned
//!
//! # Known Quirk
//!
//! A body that passes every check but is not valid UTF-8 opens as an empty
//! string instead of failing. This matches deployed peers, which treat such
//! messages as unprintable.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod auth;
pub mod error;
pub mod open;
pub mod recipient;
pub mod registry;
pub mod seal;
pub mod session;
pub mod wire;

pub use auth::{PADDING_SIZE, TAG_ROUNDS};
pub use error::{DecryptError, EncryptError, EntryField, SessionError, WireError};
pub use open::{Decrypted, decrypt};
pub use recipient::Recipient;
pub use registry::IvRegistry;
pub use seal::encrypt;
pub use session::{Inbound, PeerKeyUpdate, Session, SessionConfig};
pub use wire::{
    Envelope, EnvelopeEntry, PublicKeyAnnouncement, PublicKeyEntry, PublicKeyRequest, WireMessage,
};
