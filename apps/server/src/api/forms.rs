//! Helpers shared by the form handlers.

use actix_web::HttpResponse;
use actix_web::http::header;
use serde::Deserialize;

use crate::error::AppResult;

/// `?error=` carried back to a form page after a rejected post.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorQuery {
    #[serde(default)]
    pub error: Option<String>,
}

/// 303 redirect after a successful post.
pub fn redirect(location: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header((header::LOCATION, location))
        .finish()
}

/// Append an URL-encoded error message to a location.
pub fn with_error(location: &str, message: &str) -> String {
    let separator = if location.contains('?') { '&' } else { '?' };
    format!("{}{}error={}", location, separator, urlencoding::encode(message))
}

/// Turn a validation failure into a redirect back to the form.
///
/// Every other error is propagated and rendered as an error page.
pub fn or_back(result: AppResult<HttpResponse>, location: &str) -> AppResult<HttpResponse> {
    match result {
        Err(err) if err.is_validation() => Ok(redirect(&with_error(location, &err.to_string()))),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use actix_web::http::StatusCode;

    #[test]
    fn test_with_error_encodes_message() {
        assert_eq!(
            with_error("/clients", "name is required"),
            "/clients?error=name%20is%20required"
        );
        assert_eq!(
            with_error("/work-orders?status=OPEN", "x&y"),
            "/work-orders?status=OPEN&error=x%26y"
        );
    }

    #[test]
    fn test_or_back_redirects_validation_errors_only() {
        let res = or_back(Err(AppError::InvalidInput("bad".to_string())), "/users").unwrap();
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            res.headers().get(header::LOCATION).unwrap(),
            "/users?error=bad"
        );

        let err = or_back(Err(AppError::NotFound("User".to_string())), "/users").unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
