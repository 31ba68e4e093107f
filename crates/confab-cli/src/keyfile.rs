//! On-disk identity key.
//!
//! ```json
//! { "private_key": "<base64>", "public_key": "<base64>", "fingerprint": "<hex>" }
//! ```
//!
//! Only `private_key` is authoritative. The other two fields are for humans
//! and are checked against it on load.

use std::{fs, path::Path};

use confab_crypto::{KeyPair, PrivateKey, PublicKey};
use serde::{Deserialize, Serialize};

use crate::error::CliError;

#[derive(Debug, Serialize, Deserialize)]
struct KeyFile {
    private_key: String,
    public_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fingerprint: Option<String>,
}

/// Serialize `keys` as a key file.
pub fn encode(keys: &KeyPair) -> String {
    let file = KeyFile {
        private_key: keys.private_key().to_base64(),
        public_key: keys.public_key().to_base64(),
        fingerprint: Some(keys.fingerprint().to_hex()),
    };

    // Three string fields always serialize
    let Ok(json) = serde_json::to_string_pretty(&file) else {
        unreachable!("key file is plain strings");
    };
    json
}

/// Load and check a key file.
pub fn load(path: &Path) -> Result<KeyPair, CliError> {
    let raw = fs::read_to_string(path)
        .map_err(CliError::io(format!("reading key file {}", path.display())))?;
    let file: KeyFile = serde_json::from_str(&raw)
        .map_err(|source| CliError::KeyFile { path: path.to_path_buf(), source })?;

    let keys = KeyPair::from_private_key(PrivateKey::from_base64(&file.private_key)?);

    let stated = PublicKey::from_base64(&file.public_key)?;
    if stated != *keys.public_key() {
        return Err(CliError::KeyMismatch { path: path.to_path_buf() });
    }

    if let Some(fingerprint) = &file.fingerprint
        && !fingerprint.eq_ignore_ascii_case(&keys.fingerprint().to_hex())
    {
        return Err(CliError::KeyMismatch { path: path.to_path_buf() });
    }

    Ok(keys)
}
