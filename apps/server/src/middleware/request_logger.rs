//! Request logging middleware.
//!
//! Logs every request with the session's username (never the cookie itself)
//! and records authorization denials as security incidents.

use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready};
use actix_web::http::StatusCode;
use actix_web::{Error, web};
use futures_util::future::LocalBoxFuture;
use std::future::{Ready, ready};
use std::time::Instant;
use tracing::{info, warn};

use crate::auth::SessionKeys;
use crate::config::SESSION_COOKIE;
use crate::db::DbPool;
use crate::models::IncidentKind;

/// Request logger middleware factory.
pub struct RequestLogger;

impl<S, B> Transform<S, ServiceRequest> for RequestLogger
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestLoggerMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestLoggerMiddleware { service }))
    }
}

/// Request logger middleware service.
pub struct RequestLoggerMiddleware<S> {
    service: S,
}

/// Username of a valid session cookie, if any.
fn session_username(req: &ServiceRequest) -> Option<String> {
    let keys = req.app_data::<web::Data<SessionKeys>>()?;
    let cookie = req.request().cookie(SESSION_COOKIE)?;
    keys.verify_token(cookie.value()).ok().map(|c| c.username)
}

impl<S, B> Service<ServiceRequest> for RequestLoggerMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let start = Instant::now();
        let method = req.method().to_string();
        let path = req.path().to_string();
        let remote_addr = req
            .connection_info()
            .realip_remote_addr()
            .unwrap_or("unknown")
            .to_string();
        let username = session_username(&req);
        let pool = req.app_data::<web::Data<DbPool>>().cloned();

        let fut = self.service.call(req);

        Box::pin(async move {
            let res = fut.await?;
            let elapsed = start.elapsed();
            let status = res.status();
            let status_code = status.as_u16();
            let user = username.as_deref().unwrap_or("-");

            if status.is_success() || status.is_redirection() {
                info!(
                    target: "http",
                    method = %method,
                    path = %path,
                    status = %status_code,
                    user = %user,
                    duration_ms = %elapsed.as_millis(),
                    "Request completed"
                );
            } else if status.is_client_error() {
                warn!(
                    target: "http",
                    method = %method,
                    path = %path,
                    status = %status_code,
                    user = %user,
                    remote_addr = %remote_addr,
                    duration_ms = %elapsed.as_millis(),
                    "Client error"
                );
            } else {
                warn!(
                    target: "http",
                    method = %method,
                    path = %path,
                    status = %status_code,
                    user = %user,
                    duration_ms = %elapsed.as_millis(),
                    "Server error"
                );
            }

            // Denials of a logged-in user; anonymous rejections are recorded by their handlers.
            if status == StatusCode::FORBIDDEN {
                if let (Some(pool), Some(name)) = (pool, username.as_deref()) {
                    pool.record_incident(
                        IncidentKind::AccessDenied,
                        Some(name),
                        Some(&remote_addr),
                        Some(&path),
                        &format!("{} {}", method, path),
                    )
                    .await;
                }
            }

            Ok(res)
        })
    }
}
