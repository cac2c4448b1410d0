use std::collections::BTreeSet;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use sha2::{Digest, Sha256};

/// Derives the per-prefix one-time token for the current session.
///
/// Tokens are only verified here; the session secret and id are owned by the
/// host's authentication layer.
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    secret: String,
    session_id: String,
}

impl TokenIssuer {
    pub fn new(secret: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            session_id: session_id.into(),
        }
    }

    pub fn issue(&self, prefix: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.session_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(prefix.as_bytes());
        URL_SAFE_NO_PAD.encode(hasher.finalize())
    }

    pub fn verify(&self, prefix: &str, token: &str) -> bool {
        if token.is_empty() {
            return false;
        }
        constant_time_eq(self.issue(prefix).as_bytes(), token.as_bytes())
    }
}

fn constant_time_eq(expected: &[u8], actual: &[u8]) -> bool {
    if expected.len() != actual.len() {
        return false;
    }
    expected
        .iter()
        .zip(actual)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

/// Capability claims of the session issuing a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Caller {
    capabilities: BTreeSet<String>,
}

impl Caller {
    pub fn new<I, S>(capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            capabilities: capabilities.into_iter().map(Into::into).collect(),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn can(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }
}

#[cfg(test)]
#[path = "tests/security_tests.rs"]
mod tests;
