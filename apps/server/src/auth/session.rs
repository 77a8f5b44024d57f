//! Session tokens.
//!
//! A session is an HS256 JWT kept in the `acs_session` HttpOnly cookie.

use actix_web::cookie::{Cookie, SameSite, time::Duration as CookieDuration};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

use crate::config::{Config, SESSION_COOKIE};
use crate::error::{AppError, AppResult};
use crate::models::{SessionClaims, User};

/// Session JWT issuer.
pub const SESSION_ISSUER: &str = "acs";

/// Signing material and cookie settings shared by login and the extractor.
#[derive(Clone)]
pub struct SessionKeys {
    secret: SecretString,
    ttl_secs: u64,
    secure_cookie: bool,
}

impl SessionKeys {
    pub fn new(secret: SecretString, ttl_secs: u64, secure_cookie: bool) -> Self {
        Self {
            secret,
            ttl_secs,
            secure_cookie,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.session_secret.clone(),
            config.session_ttl_secs,
            config.environment.is_production(),
        )
    }

    /// Sign a session token for `user`.
    pub fn issue_token(&self, user: &User) -> AppResult<String> {
        let now = chrono::Utc::now();
        let exp = now + chrono::Duration::seconds(self.ttl_secs as i64);

        let claims = SessionClaims {
            sub: user.id.to_string(),
            iss: SESSION_ISSUER.to_string(),
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
            username: user.username.clone(),
            role: user.role.as_str().to_string(),
            client_id: user.client_id.map(|id| id.to_string()),
        };

        let key = EncodingKey::from_secret(self.secret.expose_secret().as_bytes());
        encode(&Header::default(), &claims, &key)
            .map_err(|e| AppError::InvalidInput(format!("Failed to create session token: {}", e)))
    }

    /// Verify a session token and return its claims.
    pub fn verify_token(&self, token: &str) -> Result<SessionClaims, String> {
        let key = DecodingKey::from_secret(self.secret.expose_secret().as_bytes());
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[SESSION_ISSUER]);
        validation.validate_aud = false;

        decode::<SessionClaims>(token, &key, &validation)
            .map(|data| data.claims)
            .map_err(|e| format!("Invalid session token: {}", e))
    }

    /// Cookie carrying a freshly issued token.
    pub fn session_cookie(&self, token: String) -> Cookie<'static> {
        let mut cookie = Cookie::new(SESSION_COOKIE, token);
        cookie.set_path("/");
        cookie.set_http_only(true);
        cookie.set_same_site(SameSite::Lax);
        cookie.set_secure(self.secure_cookie);
        cookie.set_max_age(CookieDuration::seconds(self.ttl_secs as i64));
        cookie
    }

    /// Expired cookie that clears the session.
    pub fn clear_cookie(&self) -> Cookie<'static> {
        let mut cookie = Cookie::new(SESSION_COOKIE, "");
        cookie.set_path("/");
        cookie.set_http_only(true);
        cookie.set_same_site(SameSite::Lax);
        cookie.set_secure(self.secure_cookie);
        cookie.set_max_age(CookieDuration::ZERO);
        cookie
    }
}

/// Random URL-safe token for one-off links.
pub fn generate_token() -> String {
    let random_bytes: [u8; 32] = rand::random();
    hex::encode(random_bytes)
}

/// SHA-256 hex digest; only digests of one-off tokens are stored.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRole;
    use uuid::Uuid;

    fn keys() -> SessionKeys {
        SessionKeys::new(SecretString::from("test-secret".to_string()), 3600, false)
    }

    fn user(role: UserRole, client_id: Option<Uuid>) -> User {
        User {
            id: Uuid::new_v4(),
            username: "somchai".to_string(),
            display_name: "Somchai".to_string(),
            role,
            client_id,
            chat_user_id: None,
            last_login_at: None,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_issue_and_verify() {
        let client = Uuid::new_v4();
        let u = user(UserRole::Client, Some(client));
        let token = keys().issue_token(&u).unwrap();
        let claims = keys().verify_token(&token).unwrap();
        assert_eq!(claims.sub, u.id.to_string());
        assert_eq!(claims.role, "CLIENT");
        assert_eq!(claims.client_id, Some(client.to_string()));
    }

    #[test]
    fn test_token_from_other_secret_is_rejected() {
        let token = keys().issue_token(&user(UserRole::Admin, None)).unwrap();
        let other = SessionKeys::new(SecretString::from("other".to_string()), 3600, false);
        assert!(other.verify_token(&token).is_err());
    }

    #[test]
    fn test_cookies() {
        let cookie = keys().session_cookie("abc".to_string());
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(keys().clear_cookie().value(), "");
    }

    #[test]
    fn test_hash_token_is_stable_hex() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert_eq!(hash_token(&token), hash_token(&token));
        assert_ne!(hash_token(&token), token);
    }
}
