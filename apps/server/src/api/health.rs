//! Liveness and readiness endpoints.
//!
//! Readiness needs the database. Photo storage and chat messaging are
//! reported alongside: an unreachable bucket only degrades the service, since
//! everything except photo uploads keeps working.

use std::time::Duration;

use actix_web::{HttpResponse, get, web};
use chrono::Utc;
use serde::Serialize;
use tracing::warn;
use utoipa::ToSchema;

use crate::config::{Config, MessagingSettings};
use crate::db::DbPool;
use crate::services::Storage;

/// Upper bound for the bucket check; the S3 client retries on its own.
const STORAGE_CHECK_TIMEOUT: Duration = Duration::from_secs(3);

/// Health check response.
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    status: &'static str,
    timestamp: String,
}

/// Overall readiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    Ready,
    /// Serving, but photo storage is unreachable
    Degraded,
    NotReady,
}

/// Readiness of the service and what it depends on.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReadyResponse {
    pub status: Readiness,
    pub database: bool,
    pub photo_storage: bool,
    /// Push notifications are sent (otherwise only logged)
    pub messaging: bool,
    /// Admin channel configured for repair requests and completions
    pub admin_channel: bool,
}

impl ReadyResponse {
    pub fn new(database: bool, photo_storage: bool, messaging: &MessagingSettings) -> Self {
        let status = match (database, photo_storage) {
            (false, _) => Readiness::NotReady,
            (true, false) => Readiness::Degraded,
            (true, true) => Readiness::Ready,
        };
        Self {
            status,
            database,
            photo_storage,
            messaging: messaging.is_enabled(),
            admin_channel: messaging.admin_channel.is_some(),
        }
    }
}

/// Health check endpoint.
///
/// Returns 200 if the service is running.
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
#[get("/health")]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now().to_rfc3339(),
    })
}

async fn storage_reachable(storage: &Storage) -> bool {
    match tokio::time::timeout(STORAGE_CHECK_TIMEOUT, storage.ping()).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            warn!("Readiness: {}", e);
            false
        }
        Err(_) => {
            warn!("Readiness: photo storage did not answer in time");
            false
        }
    }
}

/// Readiness check endpoint.
///
/// 200 while the database answers, with `degraded` status when photo storage
/// does not; 503 without a database.
#[utoipa::path(
    get,
    path = "/api/v1/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Service is ready or degraded", body = ReadyResponse),
        (status = 503, description = "Database unavailable", body = ReadyResponse)
    )
)]
#[get("/ready")]
pub async fn ready(
    pool: web::Data<DbPool>,
    storage: web::Data<Storage>,
    config: web::Data<Config>,
) -> HttpResponse {
    let (database, photo_storage) =
        futures_util::join!(pool.ping(), storage_reachable(&storage));
    if let Err(ref e) = database {
        warn!("Readiness: {}", e);
    }

    let body = ReadyResponse::new(database.is_ok(), photo_storage, &config.messaging);
    match body.status {
        Readiness::NotReady => HttpResponse::ServiceUnavailable().json(body),
        Readiness::Ready | Readiness::Degraded => HttpResponse::Ok().json(body),
    }
}

/// Configure health routes.
pub fn configure_health_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(health).service(ready);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messaging(admin_channel: Option<&str>) -> MessagingSettings {
        MessagingSettings {
            api_url: None,
            access_token: None,
            admin_channel: admin_channel.map(str::to_string),
        }
    }

    #[test]
    fn test_storage_outage_only_degrades() {
        let body = ReadyResponse::new(true, false, &messaging(None));
        assert_eq!(body.status, Readiness::Degraded);
        assert!(!body.messaging);
    }

    #[test]
    fn test_database_outage_is_not_ready() {
        let body = ReadyResponse::new(false, true, &messaging(Some("C-admins")));
        assert_eq!(body.status, Readiness::NotReady);
        assert!(body.admin_channel);
    }
}
