//! Actix-web extractor for the per-request session.
//!
//! The session cookie is verified once per request and the user is reloaded
//! from the database, so a deleted account or a changed role takes effect on
//! the next request. Handlers receive the resulting [`Session`] explicitly
//! and never read auth state from elsewhere.

use actix_web::dev::Payload;
use actix_web::http::{StatusCode, header};
use actix_web::{FromRequest, HttpRequest, HttpResponse, ResponseError, web};
use futures_util::future::LocalBoxFuture;
use uuid::Uuid;

use super::SessionKeys;
use crate::config::SESSION_COOKIE;
use crate::db::DbPool;
use crate::error::{ApiError, AppError, AppResult, ErrorResponse};
use crate::models::User;
use crate::models::UserRole;
use crate::services::job_lifecycle::Actor;

/// Missing or invalid session.
#[derive(Debug)]
pub struct AuthError {
    message: String,
    api: bool,
}

impl AuthError {
    fn new(message: &str, api: bool) -> Self {
        Self {
            message: message.to_string(),
            api,
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        if self.api {
            StatusCode::UNAUTHORIZED
        } else {
            StatusCode::SEE_OTHER
        }
    }

    /// Pages redirect to the login form; the JSON API answers 401.
    fn error_response(&self) -> HttpResponse {
        if self.api {
            return HttpResponse::Unauthorized().json(ErrorResponse {
                error: "UNAUTHORIZED".to_string(),
                message: self.message.clone(),
            });
        }
        HttpResponse::SeeOther()
            .insert_header((header::LOCATION, "/login"))
            .finish()
    }
}

/// Authenticated user of the current request.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: Uuid,
    pub username: String,
    pub role: UserRole,
    /// Client organisation of a CLIENT user
    pub client_id: Option<Uuid>,
}

impl Session {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn require_admin(&self) -> AppResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::unauthorized(format!(
                "{} ({}) requires ADMIN",
                self.username, self.role
            )))
        }
    }

    pub fn require_staff(&self) -> AppResult<()> {
        if self.role.is_staff() {
            Ok(())
        } else {
            Err(AppError::unauthorized(format!(
                "{} ({}) requires ADMIN or TECHNICIAN",
                self.username, self.role
            )))
        }
    }

    /// CLIENT users must belong to a client organisation.
    pub fn require_client(&self) -> AppResult<Uuid> {
        match (self.role, self.client_id) {
            (UserRole::Client, Some(client_id)) => Ok(client_id),
            _ => Err(AppError::unauthorized(format!(
                "{} ({}) is not a client user",
                self.username, self.role
            ))),
        }
    }

    pub fn actor(&self) -> Actor {
        Actor {
            user_id: self.user_id,
            role: self.role,
        }
    }
}

impl From<User> for Session {
    fn from(user: User) -> Self {
        Session {
            user_id: user.id,
            username: user.username,
            role: user.role,
            client_id: user.client_id,
        }
    }
}

/// User id of a valid session cookie.
fn cookie_user_id(req: &HttpRequest) -> Result<Uuid, &'static str> {
    let keys = req
        .app_data::<web::Data<SessionKeys>>()
        .ok_or("Internal configuration error")?;
    let cookie = req.cookie(SESSION_COOKIE).ok_or("Login required")?;
    let claims = keys.verify_token(cookie.value()).map_err(|e| {
        tracing::debug!("Rejected session cookie: {}", e);
        "Session expired"
    })?;
    Uuid::parse_str(&claims.sub).map_err(|_| "Session expired")
}

async fn load_session(
    user_id: Result<Uuid, &'static str>,
    pool: Option<web::Data<DbPool>>,
    api: bool,
) -> Result<Session, actix_web::Error> {
    let user_id = user_id.map_err(|message| AuthError::new(message, api))?;
    let pool = pool.ok_or_else(|| AuthError::new("Internal configuration error", api))?;

    // Deleted users are filtered out by the lookup
    let user = match pool.get_user(user_id).await {
        Ok(user) => user,
        Err(e) if api => return Err(ApiError(e).into()),
        Err(e) => return Err(e.into()),
    };
    match user {
        Some(user) => Ok(Session::from(user)),
        None => {
            tracing::info!(user_id = %user_id, "Session of a removed user rejected");
            Err(AuthError::new("Session expired", api).into())
        }
    }
}

impl FromRequest for Session {
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let api = req.path().starts_with("/api/");
        let user_id = cookie_user_id(req);
        let pool = req.app_data::<web::Data<DbPool>>().cloned();
        Box::pin(load_session(user_id, pool, api))
    }
}

/// Session when present; public pages use it to tailor navigation.
pub struct MaybeSession(pub Option<Session>);

impl FromRequest for MaybeSession {
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let session = Session::from_request(req, payload);
        Box::pin(async move { Ok::<_, actix_web::Error>(MaybeSession(session.await.ok())) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(role: UserRole, client_id: Option<Uuid>) -> Session {
        Session {
            user_id: Uuid::new_v4(),
            username: "u".to_string(),
            role,
            client_id,
        }
    }

    #[test]
    fn test_role_gates() {
        assert!(session(UserRole::Admin, None).require_admin().is_ok());
        assert!(session(UserRole::Technician, None).require_admin().is_err());
        assert!(session(UserRole::Technician, None).require_staff().is_ok());
        assert!(session(UserRole::Client, None).require_staff().is_err());
    }

    #[test]
    fn test_session_takes_role_and_client_from_the_user_row() {
        let client_id = Uuid::new_v4();
        let user = User {
            id: Uuid::new_v4(),
            username: "plaza".to_string(),
            display_name: "Plaza".to_string(),
            role: UserRole::Client,
            client_id: Some(client_id),
            chat_user_id: None,
            last_login_at: None,
            created_at: chrono::Utc::now(),
        };
        let session = Session::from(user);
        assert_eq!(session.role, UserRole::Client);
        assert_eq!(session.require_client().unwrap(), client_id);
    }

    #[test]
    fn test_client_without_organisation_is_rejected() {
        assert!(session(UserRole::Client, None).require_client().is_err());
        let org = Uuid::new_v4();
        assert_eq!(
            session(UserRole::Client, Some(org)).require_client().unwrap(),
            org
        );
    }
}
