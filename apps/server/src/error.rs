//! Domain error types for the service operations server.
//!
//! Uses thiserror for ergonomic error handling with automatic Display implementations.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use sea_orm::SqlErr;
use std::fmt;

/// Application-level errors.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed
    #[error("Database error: {0}")]
    Database(String),

    /// Resource not found
    #[error("{0} not found")]
    NotFound(String),

    /// Invalid input data or an unmet precondition
    #[error("{0}")]
    InvalidInput(String),

    /// Wrong role, wrong technician or missing credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Storage (S3) operation failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Page template failed to render
    #[error("Render error: {0}")]
    Render(String),

    /// CSV or spreadsheet export failed
    #[error("Export error: {0}")]
    Export(String),
}

impl AppError {
    /// Shorthand for the generic authorization failure.
    pub fn unauthorized(reason: impl Into<String>) -> Self {
        AppError::Unauthorized(reason.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, AppError::InvalidInput(_))
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::FORBIDDEN,
            AppError::Database(_)
            | AppError::Storage(_)
            | AppError::Render(_)
            | AppError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .content_type("text/html; charset=utf-8")
            .body(self.to_response().to_html())
    }
}

impl AppError {
    /// User-facing body; internal details are logged here and never returned.
    pub fn to_response(&self) -> ErrorResponse {
        let (error_code, response_message) = match self {
            AppError::Database(err_str) => {
                tracing::error!("Database error: {}", err_str);
                ("DATABASE_ERROR", "Something went wrong. Please try again.".to_string())
            }
            AppError::Storage(err_str) => {
                tracing::error!("Storage error: {}", err_str);
                ("STORAGE_ERROR", "Something went wrong. Please try again.".to_string())
            }
            AppError::Render(err_str) => {
                tracing::error!("Render error: {}", err_str);
                ("RENDER_ERROR", "Something went wrong. Please try again.".to_string())
            }
            AppError::Export(err_str) => {
                tracing::error!("Export error: {}", err_str);
                ("EXPORT_ERROR", "Something went wrong. Please try again.".to_string())
            }
            AppError::NotFound(_) => ("NOT_FOUND", self.to_string()),
            AppError::InvalidInput(_) => ("INVALID_INPUT", self.to_string()),
            AppError::Unauthorized(reason) => {
                tracing::warn!("Authorization denied: {}", reason);
                ("UNAUTHORIZED", "Unauthorized".to_string())
            }
        };

        ErrorResponse {
            error: error_code.to_string(),
            message: response_message,
        }
    }
}

/// [`AppError`] answered as JSON, for handlers under `/api`.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        self.0.status_code()
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(self.0.to_response())
    }
}

/// Error body shown on the generic error page (and in the JSON API docs).
#[derive(Debug, serde::Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    /// Minimal standalone page, independent of the template registry.
    pub fn to_html(&self) -> String {
        format!(
            "<!doctype html><html><head><meta charset=\"utf-8\"><title>{code}</title></head>\
             <body><main class=\"error\"><h1>{message}</h1><p><a href=\"/\">Back to dashboard</a></p>\
             </main></body></html>",
            code = handlebars::html_escape(&self.error),
            message = handlebars::html_escape(&self.message),
        )
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

// Conversion implementations for common error types

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

impl From<sea_orm::DbErr> for AppError {
    fn from(err: sea_orm::DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => {
                AppError::InvalidInput("A record with the same value already exists".to_string())
            }
            Some(SqlErr::ForeignKeyConstraintViolation(_)) => AppError::InvalidInput(
                "This record is still referenced by other records".to_string(),
            ),
            _ => AppError::Database(err.to_string()),
        }
    }
}

impl From<uuid::Error> for AppError {
    fn from(err: uuid::Error) -> Self {
        AppError::InvalidInput(format!("Invalid UUID: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = err
            .field_errors()
            .iter()
            .map(|(field, errors)| {
                let reason = errors
                    .iter()
                    .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| "is invalid".to_string());
                format!("{} {}", field, reason)
            })
            .collect();
        fields.sort();
        AppError::InvalidInput(fields.join(", "))
    }
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::Export(err.to_string())
    }
}

impl From<rust_xlsxwriter::XlsxError> for AppError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        AppError::Export(err.to_string())
    }
}

impl From<handlebars::RenderError> for AppError {
    fn from(err: handlebars::RenderError) -> Self {
        AppError::Render(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct SiteForm {
        #[validate(length(min = 1, message = "is required"))]
        name: String,
    }

    #[test]
    fn test_validation_errors_become_invalid_input() {
        let err: AppError = SiteForm {
            name: String::new(),
        }
        .validate()
        .unwrap_err()
        .into();
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "name is required");
    }

    #[test]
    fn test_unauthorized_is_generic_to_the_user() {
        let err = AppError::unauthorized("job item assigned to another technician");
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        let html = ErrorResponse {
            error: "UNAUTHORIZED".to_string(),
            message: "Unauthorized".to_string(),
        }
        .to_html();
        assert!(html.contains("Unauthorized"));
    }

    #[test]
    fn test_api_errors_are_json() {
        let err = ApiError::from(AppError::NotFound("Work order".to_string()));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        let response = err.error_response();
        let content_type = response
            .headers()
            .get(actix_web::http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        assert_eq!(content_type, "application/json");
    }

    #[test]
    fn test_internal_details_stay_out_of_the_body() {
        let body = AppError::Database("relation \"users\" does not exist".to_string()).to_response();
        assert_eq!(body.error, "DATABASE_ERROR");
        assert!(!body.message.contains("users"));
    }

    #[test]
    fn test_error_page_escapes_message() {
        let html = ErrorResponse {
            error: "NOT_FOUND".to_string(),
            message: "<script>alert(1)</script>".to_string(),
        }
        .to_html();
        assert!(!html.contains("<script>"));
    }
}
