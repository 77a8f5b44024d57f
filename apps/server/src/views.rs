//! Server-rendered pages.
//!
//! Templates are compiled into the binary and registered once at start-up.

use actix_web::HttpResponse;
use actix_web::http::header;
use handlebars::{Handlebars, TemplateError, handlebars_helper};
use serde::Serialize;
use serde_json::{Value, json};

use crate::auth::Session;
use crate::error::{AppError, AppResult};

const LAYOUT: &str = include_str!("../templates/layout.hbs");

const PAGES: &[(&str, &str)] = &[
    ("login", include_str!("../templates/login.hbs")),
    ("dashboard_admin", include_str!("../templates/dashboard_admin.hbs")),
    ("dashboard_technician", include_str!("../templates/dashboard_technician.hbs")),
    ("dashboard_client", include_str!("../templates/dashboard_client.hbs")),
    ("users", include_str!("../templates/users.hbs")),
    ("user_edit", include_str!("../templates/user_edit.hbs")),
    ("clients", include_str!("../templates/clients.hbs")),
    ("client", include_str!("../templates/client.hbs")),
    ("location", include_str!("../templates/location.hbs")),
    ("room", include_str!("../templates/room.hbs")),
    ("asset", include_str!("../templates/asset.hbs")),
    ("work_orders", include_str!("../templates/work_orders.hbs")),
    ("work_order_new", include_str!("../templates/work_order_new.hbs")),
    ("work_order", include_str!("../templates/work_order.hbs")),
    ("job", include_str!("../templates/job.hbs")),
    ("approve", include_str!("../templates/approve.hbs")),
    ("checklist_templates", include_str!("../templates/checklist_templates.hbs")),
    ("checklist_template_edit", include_str!("../templates/checklist_template_edit.hbs")),
    ("messages", include_str!("../templates/messages.hbs")),
    ("contact", include_str!("../templates/contact.hbs")),
    ("repair_request", include_str!("../templates/repair_request.hbs")),
    ("incidents", include_str!("../templates/incidents.hbs")),
];

handlebars_helper!(datetime: |value: str| {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|_| value.to_string())
});

handlebars_helper!(to_json: |value: Json| serde_json::to_string(value).unwrap_or_default());

/// Template registry.
pub struct Views {
    registry: Handlebars<'static>,
}

impl Views {
    pub fn new() -> Result<Self, TemplateError> {
        let mut registry = Handlebars::new();
        registry.register_partial("layout", LAYOUT)?;
        for (name, source) in PAGES {
            registry.register_template_string(name, *source)?;
        }
        registry.register_helper("datetime", Box::new(datetime));
        registry.register_helper("json", Box::new(to_json));
        Ok(Self { registry })
    }

    /// Render a page to an HTML string.
    pub fn render_string<T: Serialize>(&self, name: &str, data: &T) -> AppResult<String> {
        Ok(self.registry.render(name, data)?)
    }

    /// Render a page into a 200 response.
    pub fn render<T: Serialize>(&self, name: &str, data: &T) -> AppResult<HttpResponse> {
        let body = self.render_string(name, data)?;
        Ok(HttpResponse::Ok()
            .content_type("text/html; charset=utf-8")
            .insert_header((header::CACHE_CONTROL, "no-store"))
            .body(body))
    }
}

/// Navigation flags for the layout.
#[derive(Debug, Serialize)]
struct Nav<'a> {
    username: &'a str,
    role: &'static str,
    is_admin: bool,
    is_staff: bool,
    is_client: bool,
}

/// Build a page context: layout data merged with the page's own fields.
///
/// `body` must be a JSON object; other values are placed under `data`.
pub fn page(session: Option<&Session>, title: &str, error: Option<&str>, body: Value) -> Value {
    let nav = session.map(|s| Nav {
        username: &s.username,
        role: s.role.as_str(),
        is_admin: s.is_admin(),
        is_staff: s.role.is_staff(),
        is_client: !s.role.is_staff(),
    });

    let mut context = json!({
        "title": title,
        "nav": nav,
        "error": error,
    });
    if let (Some(target), Value::Object(fields)) = (context.as_object_mut(), body) {
        target.extend(fields);
    }
    context
}

impl From<TemplateError> for AppError {
    fn from(err: TemplateError) -> Self {
        AppError::Render(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRole;
    use uuid::Uuid;

    #[test]
    fn test_all_templates_register() {
        assert!(Views::new().is_ok());
    }

    #[test]
    fn test_login_page_renders_escaped_error() {
        let views = Views::new().unwrap();
        let html = views
            .render_string(
                "login",
                &page(None, "Sign in", Some("<b>bad</b>"), json!({})),
            )
            .unwrap();
        assert!(html.contains("Sign in"));
        assert!(html.contains("&lt;b&gt;bad&lt;/b&gt;"));
    }

    #[test]
    fn test_page_merges_layout_fields() {
        let session = Session {
            user_id: Uuid::new_v4(),
            username: "ploy".to_string(),
            role: UserRole::Technician,
            client_id: None,
        };
        let ctx = page(Some(&session), "Jobs", None, json!({ "count": 3 }));
        assert_eq!(ctx["nav"]["username"], "ploy");
        assert_eq!(ctx["nav"]["is_staff"], true);
        assert_eq!(ctx["nav"]["is_admin"], false);
        assert_eq!(ctx["count"], 3);
        assert_eq!(ctx["title"], "Jobs");
    }

    #[test]
    fn test_datetime_helper_formats_rfc3339() {
        let mut hb = Handlebars::new();
        hb.register_helper("datetime", Box::new(datetime));
        let out = hb
            .render_template("{{datetime at}}", &json!({ "at": "2026-10-19T09:30:00Z" }))
            .unwrap();
        assert_eq!(out, "2026-10-19 09:30");
    }
}
