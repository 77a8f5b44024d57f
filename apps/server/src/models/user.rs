//! User models, roles and session claims.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Access roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Admin,
    Technician,
    Client,
}

impl UserRole {
    pub const ALL: [UserRole; 3] = [Self::Admin, Self::Technician, Self::Client];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Technician => "TECHNICIAN",
            Self::Client => "CLIENT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "ADMIN" => Some(Self::Admin),
            "TECHNICIAN" => Some(Self::Technician),
            "CLIENT" => Some(Self::Client),
            _ => None,
        }
    }

    /// Admins and technicians.
    pub fn is_staff(&self) -> bool {
        matches!(self, Self::Admin | Self::Technician)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// User stored in database (password hash excluded).
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
    pub role: UserRole,
    /// Client organisation a CLIENT user belongs to
    pub client_id: Option<Uuid>,
    /// Recipient id on the chat-messaging platform
    pub chat_user_id: Option<String>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Session JWT claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub iss: String,
    pub exp: usize,
    pub iat: usize,
    pub username: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

/// Login form.
#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct LoginForm {
    #[validate(length(min = 1, message = "is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "is required"))]
    pub password: String,
}

/// Admin form for creating a user.
#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CreateUserForm {
    #[validate(length(min = 3, max = 100, message = "must be 3-100 characters"))]
    pub username: String,
    #[validate(length(min = 1, max = 255, message = "is required"))]
    pub display_name: String,
    pub role: String,
    #[validate(length(min = 8, message = "must be at least 8 characters"))]
    pub password: String,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub chat_user_id: Option<String>,
}

/// Admin form for updating a user. An empty password keeps the current one.
#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct UpdateUserForm {
    #[validate(length(min = 1, max = 255, message = "is required"))]
    pub display_name: String,
    pub role: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub chat_user_id: Option<String>,
}

/// Bootstrap form posted to the setup endpoint.
#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct SetupForm {
    #[validate(length(min = 3, max = 100, message = "must be 3-100 characters"))]
    pub username: String,
    #[validate(length(min = 8, message = "must be at least 8 characters"))]
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse_is_case_insensitive() {
        assert_eq!(UserRole::parse("admin"), Some(UserRole::Admin));
        assert_eq!(UserRole::parse(" Technician "), Some(UserRole::Technician));
        assert_eq!(UserRole::parse("CLIENT"), Some(UserRole::Client));
        assert_eq!(UserRole::parse("viewer"), None);
    }

    #[test]
    fn test_staff_roles() {
        assert!(UserRole::Admin.is_staff());
        assert!(UserRole::Technician.is_staff());
        assert!(!UserRole::Client.is_staff());
    }
}
