//! Token pair and refresh-token fingerprinting.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Access + refresh token pair handed to a client.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// SHA-256 hex digest of a refresh token. Only this digest is persisted.
pub fn refresh_token_fingerprint(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
