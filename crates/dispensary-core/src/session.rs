use sha2::{Digest, Sha256};

/// Hash a session token for storage and lookup.
///
/// Only the salted digest is persisted; the raw token never reaches the
/// database.
#[must_use]
pub fn hash_session_token(salt: &str, token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}
