//! Shared-secret API key gate for the HTTP boundary.

use std::fmt;

use sha2::{Digest, Sha256};

/// Header callers present the key in.
pub const API_KEY_HEADER: &str = "x-api-key";

/// A configured API key. Only the SHA-256 digest is kept in memory.
#[derive(Clone)]
pub struct ApiKey {
    digest: [u8; 32],
}

impl ApiKey {
    pub fn new(secret: &str) -> Self {
        Self {
            digest: digest(secret),
        }
    }

    /// Compare a presented key in time independent of where it differs.
    /// Hashing first also hides the configured key's length. An empty
    /// presented key never matches.
    pub fn verify(&self, presented: Option<&str>) -> bool {
        let Some(presented) = presented.filter(|p| !p.is_empty()) else {
            return false;
        };
        let candidate = digest(presented);
        self.digest
            .iter()
            .zip(candidate.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

fn digest(value: &str) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(value.as_bytes()));
    out
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify() {
        let key = ApiKey::new("s3cret-key");
        assert!(key.verify(Some("s3cret-key")));
        assert!(!key.verify(Some("s3cret-kez")));
        assert!(!key.verify(Some("")));
        assert!(!key.verify(None));
    }

    #[test]
    fn test_empty_key_never_matches() {
        let key = ApiKey::new("");
        assert!(!key.verify(Some("")));
        assert!(!key.verify(None));
    }

    #[test]
    fn test_debug_redacts() {
        let key = ApiKey::new("s3cret-key");
        assert!(!format!("{key:?}").contains("s3cret"));
    }
}
