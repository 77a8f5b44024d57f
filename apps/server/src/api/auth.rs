//! Login, logout and first-admin setup.

use actix_web::http::header;
use actix_web::{HttpRequest, HttpResponse, web};
use serde_json::json;
use tracing::{info, warn};
use validator::Validate;

use crate::api::forms::{ErrorQuery, redirect, with_error};
use crate::auth::{MaybeSession, SessionKeys, SetupKey, password};
use crate::config::Config;
use crate::db::{DbPool, NewUser};
use crate::error::{AppError, AppResult};
use crate::models::user::{LoginForm, SetupForm};
use crate::models::{IncidentKind, UserRole};
use crate::views::{Views, page};

const LOGIN_FAILED: &str = "Invalid username or password";

fn client_ip(req: &HttpRequest) -> Option<String> {
    req.connection_info().realip_remote_addr().map(str::to_string)
}

async fn login_page(
    session: MaybeSession,
    views: web::Data<Views>,
    query: web::Query<ErrorQuery>,
) -> AppResult<HttpResponse> {
    if session.0.is_some() {
        return Ok(redirect("/"));
    }
    views.render(
        "login",
        &page(None, "Sign in", query.error.as_deref(), json!({})),
    )
}

async fn login(
    req: HttpRequest,
    pool: web::Data<DbPool>,
    keys: web::Data<SessionKeys>,
    form: web::Form<LoginForm>,
) -> AppResult<HttpResponse> {
    let form = form.into_inner();
    if form.validate().is_err() {
        return Ok(redirect(&with_error("/login", LOGIN_FAILED)));
    }

    let username = form.username.trim();
    let stored = pool.find_user_for_login(username).await?;
    let user = match stored {
        Some(stored) if password::verify_password(&form.password, &stored.password_hash) => {
            stored.user
        }
        _ => {
            warn!(username = %username, "Failed login");
            pool.record_incident(
                IncidentKind::FailedLogin,
                Some(username),
                client_ip(&req).as_deref(),
                Some(req.path()),
                "invalid credentials",
            )
            .await;
            return Ok(redirect(&with_error("/login", LOGIN_FAILED)));
        }
    };

    pool.record_login(user.id).await?;
    let token = keys.issue_token(&user)?;
    info!(username = %user.username, role = %user.role, "User logged in");

    Ok(HttpResponse::SeeOther()
        .insert_header((header::LOCATION, "/"))
        .cookie(keys.session_cookie(token))
        .finish())
}

async fn logout(keys: web::Data<SessionKeys>) -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header((header::LOCATION, "/login"))
        .cookie(keys.clear_cookie())
        .finish()
}

/// Create the first ADMIN account.
///
/// Production requires `Authorization: Bearer <setup secret>`. Refused once
/// any admin exists.
async fn setup(
    req: HttpRequest,
    config: web::Data<Config>,
    setup_key: web::Data<SetupKey>,
    pool: web::Data<DbPool>,
    form: web::Form<SetupForm>,
) -> AppResult<HttpResponse> {
    if config.environment.is_production() {
        let bearer = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        if !setup_key.verify_bearer(bearer) {
            pool.record_incident(
                IncidentKind::SetupRejected,
                None,
                client_ip(&req).as_deref(),
                Some(req.path()),
                "missing or invalid setup secret",
            )
            .await;
            return Err(AppError::unauthorized("setup secret rejected"));
        }
    }

    let form = form.into_inner();
    form.validate()?;

    if pool.admin_exists().await? {
        return Err(AppError::InvalidInput(
            "An admin account already exists".to_string(),
        ));
    }

    let display_name = form
        .display_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(form.username.trim())
        .to_string();

    let user = pool
        .insert_user(NewUser {
            username: form.username.trim(),
            display_name: &display_name,
            password_hash: password::hash_password(&form.password)?,
            role: UserRole::Admin,
            client_id: None,
            chat_user_id: None,
        })
        .await?;

    info!(username = %user.username, "Initial admin created");
    Ok(HttpResponse::Created().json(json!({
        "id": user.id,
        "username": user.username,
        "role": user.role,
    })))
}

/// Configure authentication routes.
pub fn configure_auth_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/login")
            .route(web::get().to(login_page))
            .route(web::post().to(login)),
    )
    .service(web::resource("/logout").route(web::post().to(logout)))
    .service(web::resource("/setup").route(web::post().to(setup)));
}
