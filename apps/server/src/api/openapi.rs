//! OpenAPI documentation for the JSON endpoints.

use utoipa::OpenApi;

use crate::{api, error, models};

/// OpenAPI documentation.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "AC Service Operations",
        version = "0.1.0",
        description = "JSON endpoints of the air-conditioning service operations server"
    ),
    servers(
        (url = "/", description = "Local server")
    ),
    paths(
        api::health::health,
        api::health::ready,
        api::work_orders::work_order_progress,
    ),
    components(
        schemas(
            error::ErrorResponse,
            api::health::HealthResponse,
            api::health::Readiness,
            api::health::ReadyResponse,
            models::WorkOrderStatus,
            models::work_order::WorkOrderProgressResponse,
        )
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Work orders", description = "Work order progress")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Session cookie security scheme.
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "session",
                utoipa::openapi::security::SecurityScheme::ApiKey(
                    utoipa::openapi::security::ApiKey::Cookie(
                        utoipa::openapi::security::ApiKeyValue::new(crate::config::SESSION_COOKIE),
                    ),
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_progress_endpoint() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/v1/work-orders/{id}/progress"));
        assert!(doc.paths.paths.contains_key("/api/v1/health"));
    }
}
