//! Per-identity session state.
//!
//! A [`Session`] owns everything one participant needs across messages: its
//! key pair, the roster of other members with their cached shared secrets,
//! and the IV registry. Two sessions in one process share nothing.
//!
//! # Invariants
//!
//! - A member's shared secret is derived once, when their key is installed
//! - An installed key is never silently replaced; a different key for the
//!   same member is reported as [`PeerKeyUpdate::Changed`] and ignored
//! - The local identity is never a roster member

use std::{collections::BTreeMap, num::NonZeroUsize};

use confab_crypto::{
    CryptoError, Entropy, Fingerprint, KeyPair, OsEntropy, PublicKey, SharedSecret,
};

use crate::{
    error::{DecryptError, EncryptError, SessionError},
    open::{Decrypted, decrypt},
    recipient::Recipient,
    registry::IvRegistry,
    seal::encrypt,
    wire::{Envelope, WireMessage},
};

/// Session configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionConfig {
    /// Maximum IVs remembered for replay detection. `None` keeps every IV for
    /// the lifetime of the session.
    pub registry_capacity: Option<NonZeroUsize>,
}

/// Outcome of installing a member's public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerKeyUpdate {
    /// First key for this member; shared secret derived
    Added {
        /// Fingerprint of the installed key
        fingerprint: Fingerprint,
    },
    /// Same key as already installed
    Unchanged,
    /// A different key than the one installed. The old key stays in place.
    Changed {
        /// Fingerprint of the installed key
        previous: Fingerprint,
        /// Fingerprint of the rejected key
        offered: Fingerprint,
    },
}

/// What a received wire message amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A verified group message
    Message(Decrypted),
    /// The sender announced a public key to us
    PeerKey {
        /// Announcing member
        identity: String,
        /// What happened to the roster
        update: PeerKeyUpdate,
    },
    /// The sender asked for our public key; `reply` should be sent back
    KeyRequested {
        /// `publicKey` message addressed to the requester
        reply: WireMessage,
    },
    /// Addressed to someone else
    Ignored,
}

#[derive(Clone)]
struct PeerKey {
    public_key: PublicKey,
    secret: SharedSecret,
}

/// One participant's view of a group conversation.
pub struct Session<E: Entropy = OsEntropy> {
    identity: String,
    keys: KeyPair,
    members: BTreeMap<String, Option<PeerKey>>,
    registry: IvRegistry,
    entropy: E,
}

impl<E: Entropy> Session<E> {
    /// Start a session with a freshly generated key pair.
    pub fn new(
        identity: impl Into<String>,
        config: SessionConfig,
        entropy: E,
    ) -> Result<Self, CryptoError> {
        let keys = KeyPair::generate(&entropy)?;
        Ok(Self::from_key_pair(identity, keys, config, entropy))
    }

    /// Start a session with an existing key pair.
    pub fn from_key_pair(
        identity: impl Into<String>,
        keys: KeyPair,
        config: SessionConfig,
        entropy: E,
    ) -> Self {
        let registry = match config.registry_capacity {
            Some(limit) => IvRegistry::with_capacity_limit(limit),
            None => IvRegistry::new(),
        };

        Self { identity: identity.into(), keys, members: BTreeMap::new(), registry, entropy }
    }

    /// Local identity.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Local public key.
    pub fn public_key(&self) -> &PublicKey {
        self.keys.public_key()
    }

    /// Local fingerprint.
    pub fn fingerprint(&self) -> Fingerprint {
        self.keys.fingerprint()
    }

    /// IV registry shared by sealing and opening.
    pub fn registry(&self) -> &IvRegistry {
        &self.registry
    }

    /// Add a member without a key. Returns `false` if already present or if
    /// `identity` is the local identity.
    pub fn add_member(&mut self, identity: &str) -> bool {
        if identity == self.identity || self.members.contains_key(identity) {
            return false;
        }
        self.members.insert(identity.to_string(), None);
        true
    }

    /// Remove a member and forget their key.
    pub fn remove_member(&mut self, identity: &str) -> bool {
        self.members.remove(identity).is_some()
    }

    /// Check if `identity` is on the roster.
    pub fn has_member(&self, identity: &str) -> bool {
        self.members.contains_key(identity)
    }

    /// Roster, in identity order.
    pub fn members(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }

    /// Fingerprint of a member's installed key.
    pub fn peer_fingerprint(&self, identity: &str) -> Option<Fingerprint> {
        self.members.get(identity)?.as_ref().map(|peer| peer.public_key.fingerprint())
    }

    /// Install a member's public key, adding them to the roster if needed.
    ///
    /// The shared secret is derived here, once.
    pub fn set_peer_public_key(
        &mut self,
        identity: &str,
        public_key: PublicKey,
    ) -> Result<PeerKeyUpdate, SessionError> {
        if identity == self.identity {
            return Err(SessionError::UnknownMember { identity: identity.to_string() });
        }

        let offered = public_key.fingerprint();
        let slot = self.members.entry(identity.to_string()).or_default();

        if let Some(existing) = slot.as_ref() {
            if existing.public_key == public_key {
                return Ok(PeerKeyUpdate::Unchanged);
            }

            let previous = existing.public_key.fingerprint();
            tracing::warn!(
                member = %identity,
                %previous,
                %offered,
                "member presented a different public key, keeping the installed one"
            );
            return Ok(PeerKeyUpdate::Changed { previous, offered });
        }

        let secret = self.keys.shared_secret(&public_key);
        *slot = Some(PeerKey { public_key, secret });
        tracing::debug!(member = %identity, fingerprint = %offered, "installed member key");

        Ok(PeerKeyUpdate::Added { fingerprint: offered })
    }

    /// Encrypt to every member with an installed key.
    pub fn encrypt(&self, plaintext: &str) -> Result<Envelope, EncryptError> {
        let recipients: Vec<_> =
            self.members.keys().map(|identity| self.recipient(identity)).collect();
        encrypt(plaintext, &recipients, &self.registry, &self.entropy)
    }

    /// Encrypt to a subset of the roster.
    ///
    /// Members without an installed key are skipped.
    ///
    /// # Errors
    ///
    /// - `UnknownMember`: an identity is not on the roster
    pub fn encrypt_to(&self, plaintext: &str, identities: &[&str]) -> Result<Envelope, SessionError> {
        let recipients = identities
            .iter()
            .map(|&identity| {
                if self.members.contains_key(identity) {
                    Ok(self.recipient(identity))
                } else {
                    Err(SessionError::UnknownMember { identity: identity.to_string() })
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(encrypt(plaintext, &recipients, &self.registry, &self.entropy)?)
    }

    /// Open an envelope from `sender`, using the roster as the set of
    /// identities that should have been addressed.
    pub fn decrypt(&self, sender: &str, envelope: &Envelope) -> Result<Decrypted, DecryptError> {
        let result =
            decrypt(envelope, &self.recipient(sender), &self.identity, self.members(), &self.registry);

        match &result {
            Ok(decrypted) if !decrypted.missing_recipients.is_empty() => {
                tracing::warn!(
                    %sender,
                    missing = ?decrypted.missing_recipients,
                    "message was not addressed to every member"
                );
            },
            Ok(_) => {},
            Err(err) if err.is_security_violation() => {
                tracing::warn!(%sender, error = %err, "rejected message");
            },
            Err(err) => {
                tracing::debug!(%sender, error = %err, "could not open message");
            },
        }

        result
    }

    /// Our public key, addressed to `recipient`.
    pub fn public_key_message(&self, recipient: &str) -> WireMessage {
        WireMessage::public_key(recipient, self.keys.public_key())
    }

    /// Request `recipient`'s public key, or everyone's with `None`.
    pub fn public_key_request(&self, recipient: Option<&str>) -> WireMessage {
        WireMessage::public_key_request(recipient)
    }

    /// Handle a raw wire message from `sender`.
    ///
    /// - `message`: opened with [`decrypt`](Self::decrypt)
    /// - `publicKey`: installed if addressed to us
    /// - `publicKeyRequest`: answered if addressed to us or to everyone
    pub fn receive(&mut self, sender: &str, raw: &str) -> Result<Inbound, SessionError> {
        match WireMessage::decode(raw)? {
            WireMessage::Message(envelope) => Ok(Inbound::Message(self.decrypt(sender, &envelope)?)),
            WireMessage::PublicKey(announcement) => {
                let Some(entry) = announcement.text.get(&self.identity) else {
                    return Ok(Inbound::Ignored);
                };
                let public_key = PublicKey::from_base64(&entry.message)?;
                let update = self.set_peer_public_key(sender, public_key)?;
                Ok(Inbound::PeerKey { identity: sender.to_string(), update })
            },
            WireMessage::PublicKeyRequest(request) => match request.text {
                Some(target) if target != self.identity => Ok(Inbound::Ignored),
                _ => Ok(Inbound::KeyRequested { reply: self.public_key_message(sender) }),
            },
        }
    }

    fn recipient(&self, identity: &str) -> Recipient {
        match self.members.get(identity) {
            Some(Some(peer)) => Recipient::new(identity, peer.secret.clone()),
            _ => Recipient::unresolved(identity),
        }
    }
}

#[cfg(test)]
mod tests {
    use confab_crypto::SeededEntropy;

    use super::*;

    fn session(identity: &str, seed: u64) -> Session<SeededEntropy> {
        Session::new(identity, SessionConfig::default(), SeededEntropy::new(seed)).unwrap()
    }

    fn introduce(a: &mut Session<SeededEntropy>, b: &mut Session<SeededEntropy>) {
        let a_key = *a.public_key();
        let b_key = *b.public_key();
        a.set_peer_public_key(b.identity(), b_key).unwrap();
        b.set_peer_public_key(a.identity(), a_key).unwrap();
    }

    #[test]
    fn new_session_has_empty_roster() {
        let alice = session("alice", 1);
        assert_eq!(alice.identity(), "alice");
        assert_eq!(alice.members().count(), 0);
        assert!(alice.registry().is_empty());
    }

    #[test]
    fn roster_management() {
        let mut alice = session("alice", 1);

        assert!(alice.add_member("bob"));
        assert!(!alice.add_member("bob"));
        assert!(!alice.add_member("alice"), "local identity is never a member");
        assert!(alice.has_member("bob"));
        assert_eq!(alice.peer_fingerprint("bob"), None);

        assert!(alice.remove_member("bob"));
        assert!(!alice.remove_member("bob"));
    }

    #[test]
    fn installing_keys() {
        let mut alice = session("alice", 1);
        let bob = session("bob", 2);
        let mallory = session("mallory", 3);

        let added = alice.set_peer_public_key("bob", *bob.public_key()).unwrap();
        assert_eq!(added, PeerKeyUpdate::Added { fingerprint: bob.fingerprint() });
        assert_eq!(alice.peer_fingerprint("bob"), Some(bob.fingerprint()));

        let again = alice.set_peer_public_key("bob", *bob.public_key()).unwrap();
        assert_eq!(again, PeerKeyUpdate::Unchanged);

        let swapped = alice.set_peer_public_key("bob", *mallory.public_key()).unwrap();
        assert_eq!(
            swapped,
            PeerKeyUpdate::Changed { previous: bob.fingerprint(), offered: mallory.fingerprint() }
        );
        assert_eq!(alice.peer_fingerprint("bob"), Some(bob.fingerprint()), "old key retained");
    }

    #[test]
    fn own_key_cannot_be_installed() {
        let mut alice = session("alice", 1);
        let key = *alice.public_key();

        assert!(matches!(
            alice.set_peer_public_key("alice", key),
            Err(SessionError::UnknownMember { .. })
        ));
    }

    #[test]
    fn encrypt_skips_members_without_keys() {
        let mut alice = session("alice", 1);
        let mut bob = session("bob", 2);
        introduce(&mut alice, &mut bob);
        alice.add_member("carol");

        let envelope = alice.encrypt("hi").unwrap();

        assert_eq!(envelope.recipients().collect::<Vec<_>>(), vec!["bob"]);
    }

    #[test]
    fn encrypt_to_rejects_strangers() {
        let alice = session("alice", 1);

        assert_eq!(
            alice.encrypt_to("hi", &["nobody"]).unwrap_err(),
            SessionError::UnknownMember { identity: "nobody".to_string() }
        );
    }

    #[test]
    fn decrypt_reports_members_left_out() {
        let mut alice = session("alice", 1);
        let mut bob = session("bob", 2);
        let mut carol = session("carol", 3);
        introduce(&mut alice, &mut bob);
        introduce(&mut alice, &mut carol);
        bob.add_member("carol");

        let envelope = alice.encrypt_to("just you", &["bob"]).unwrap();
        let opened = bob.decrypt("alice", &envelope).unwrap();

        assert_eq!(opened.plaintext, "just you");
        assert_eq!(opened.missing_recipients, vec!["carol".to_string()]);
    }

    #[test]
    fn registry_capacity_is_applied() {
        let config = SessionConfig { registry_capacity: NonZeroUsize::new(4) };
        let alice = Session::new("alice", config, SeededEntropy::new(1)).unwrap();

        assert_eq!(alice.registry().capacity_limit(), NonZeroUsize::new(4));
    }
}
