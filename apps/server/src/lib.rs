//! AC service operations server library.
//!
//! Work orders, job items, photo evidence, checklists, the location hierarchy
//! and role-based access for a server-rendered maintenance operations app.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod middleware;
pub mod migration;
pub mod models;
pub mod services;
pub mod views;

use actix_web::web;

use crate::auth::{SessionKeys, SetupKey};
use crate::config::Config;
use crate::db::DbPool;
use crate::services::{NotificationHub, Storage};
use crate::views::Views;

/// Shared application state, registered as separate `web::Data` values.
#[derive(Clone)]
pub struct AppState {
    pub pool: web::Data<DbPool>,
    pub config: web::Data<Config>,
    pub storage: web::Data<Storage>,
    pub hub: web::Data<NotificationHub>,
    pub session_keys: web::Data<SessionKeys>,
    pub setup_key: web::Data<SetupKey>,
    pub views: web::Data<Views>,
}

impl AppState {
    pub fn new(
        pool: DbPool,
        config: Config,
        storage: Storage,
        hub: NotificationHub,
        views: Views,
    ) -> Self {
        Self {
            session_keys: web::Data::new(SessionKeys::from_config(&config)),
            setup_key: web::Data::new(SetupKey::new(config.setup_secret.clone())),
            pool: web::Data::new(pool),
            storage: web::Data::new(storage),
            hub: web::Data::new(hub),
            views: web::Data::new(views),
            config: web::Data::new(config),
        }
    }

    /// Register the shared state and every route.
    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(self.pool.clone())
            .app_data(self.config.clone())
            .app_data(self.storage.clone())
            .app_data(self.hub.clone())
            .app_data(self.session_keys.clone())
            .app_data(self.setup_key.clone())
            .app_data(self.views.clone())
            .app_data(web::FormConfig::default().limit(256 * 1024))
            .service(
                web::scope("/api/v1")
                    .configure(api::configure_health_routes)
                    .configure(api::configure_work_order_api),
            )
            .configure(api::configure_page_routes);
    }
}
