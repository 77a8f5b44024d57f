//! HTTP handlers: server-rendered pages, form posts and the JSON endpoints.

pub mod auth;
pub mod checklist_templates;
pub mod dashboard;
pub mod files;
pub mod forms;
pub mod health;
pub mod jobs;
pub mod locations;
pub mod messages;
pub mod openapi;
pub mod scope;
pub mod users;
pub mod work_orders;

pub use auth::configure_auth_routes;
pub use checklist_templates::configure_checklist_template_routes;
pub use dashboard::configure_dashboard_routes;
pub use files::configure_file_routes;
pub use health::configure_health_routes;
pub use jobs::configure_job_routes;
pub use locations::configure_location_routes;
pub use messages::configure_message_routes;
pub use openapi::ApiDoc;
pub use users::configure_user_routes;
pub use work_orders::{configure_work_order_api, configure_work_order_routes};

use actix_web::web;

/// Every page route of the application.
pub fn configure_page_routes(cfg: &mut web::ServiceConfig) {
    cfg.configure(configure_auth_routes)
        .configure(configure_dashboard_routes)
        .configure(configure_user_routes)
        .configure(configure_location_routes)
        .configure(configure_work_order_routes)
        .configure(configure_job_routes)
        .configure(configure_checklist_template_routes)
        .configure(configure_message_routes)
        .configure(configure_file_routes);
}
