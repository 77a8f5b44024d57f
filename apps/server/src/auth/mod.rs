//! Authentication: password hashing, session tokens and request extractors.

mod extractor;
pub mod password;
pub mod session;

use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;

pub use extractor::{AuthError, MaybeSession, Session};
pub use session::SessionKeys;

/// Bearer secret guarding the setup endpoint in production.
///
/// `Debug` never prints the value; comparison is constant-time.
#[derive(Clone)]
pub struct SetupKey(Option<SecretString>);

impl SetupKey {
    pub fn new(key: Option<SecretString>) -> Self {
        Self(key)
    }

    /// Compare a provided secret with the configured one.
    ///
    /// `ConstantTimeEq` returns false for unequal lengths without an early exit.
    pub fn verify(&self, provided: &str) -> bool {
        match &self.0 {
            Some(secret) => secret
                .expose_secret()
                .as_bytes()
                .ct_eq(provided.as_bytes())
                .into(),
            None => false,
        }
    }

    /// Check an `Authorization: Bearer <secret>` header value.
    pub fn verify_bearer(&self, header: Option<&str>) -> bool {
        header
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(|token| self.verify(token.trim()))
            .unwrap_or(false)
    }
}

impl std::fmt::Debug for SetupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            Some(_) => write!(f, "SetupKey([REDACTED])"),
            None => write!(f, "SetupKey(None)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_key_bearer() {
        let key = SetupKey::new(Some(SecretString::from("s3cret-value".to_string())));
        assert!(key.verify_bearer(Some("Bearer s3cret-value")));
        assert!(!key.verify_bearer(Some("Bearer s3cret")));
        assert!(!key.verify_bearer(Some("s3cret-value")));
        assert!(!key.verify_bearer(None));
    }

    #[test]
    fn test_unset_setup_key_rejects_everything() {
        let key = SetupKey::new(None);
        assert!(!key.verify(""));
        assert_eq!(format!("{:?}", key), "SetupKey(None)");
    }

    #[test]
    fn test_debug_redacts() {
        let key = SetupKey::new(Some(SecretString::from("hidden".to_string())));
        assert!(!format!("{:?}", key).contains("hidden"));
    }
}
