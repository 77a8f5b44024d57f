//! Contact messages, repair requests and security incidents.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Origin of a stored contact message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactKind {
    /// Public contact form
    Contact,
    /// Raised by a CLIENT user for one of their sites
    RepairRequest,
}

impl ContactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contact => "contact",
            Self::RepairRequest => "repair_request",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "contact" => Some(Self::Contact),
            "repair_request" => Some(Self::RepairRequest),
            _ => None,
        }
    }
}

/// Public contact form.
#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ContactForm {
    #[validate(length(min = 1, max = 255, message = "is required"))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 50, message = "must be at most 50 characters"))]
    pub phone: Option<String>,
    #[serde(default)]
    #[validate(length(max = 255, message = "must be at most 255 characters"))]
    pub email: Option<String>,
    #[validate(length(min = 1, max = 5000, message = "is required"))]
    pub message: String,
}

/// CLIENT form for reporting a broken unit.
#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct RepairRequestForm {
    pub site_id: Uuid,
    /// Optional asset id; blank when the client does not know the unit.
    #[serde(default)]
    pub asset_id: Option<String>,
    #[validate(length(min = 1, max = 5000, message = "is required"))]
    pub description: String,
}

/// Category of a recorded security incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentKind {
    FailedLogin,
    AccessDenied,
    SetupRejected,
}

impl IncidentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FailedLogin => "failed_login",
            Self::AccessDenied => "access_denied",
            Self::SetupRejected => "setup_rejected",
        }
    }
}

impl std::fmt::Display for IncidentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
