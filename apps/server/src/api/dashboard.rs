//! Role-specific landing pages.

use actix_web::{HttpResponse, web};
use chrono::Utc;
use serde_json::json;

use crate::api::scope;
use crate::auth::Session;
use crate::db::{DbPool, WorkOrderListQuery};
use crate::error::AppResult;
use crate::models::UserRole;
use crate::views::{Views, page};

async fn dashboard(
    session: Session,
    pool: web::Data<DbPool>,
    views: web::Data<Views>,
) -> AppResult<HttpResponse> {
    match session.role {
        UserRole::Admin => admin_dashboard(&session, &pool, &views).await,
        UserRole::Technician => {
            let tasks = pool.technician_tasks(session.user_id).await?;
            let (mine, open): (Vec<_>, Vec<_>) = tasks.into_iter().partition(|t| t.assigned_to_me);
            views.render(
                "dashboard_technician",
                &page(
                    Some(&session),
                    "My jobs",
                    None,
                    json!({ "mine": mine, "open": open }),
                ),
            )
        }
        UserRole::Client => {
            let site_ids = scope::visible_sites(&pool, &session).await?;
            let (orders, _) = pool
                .list_work_orders(&WorkOrderListQuery {
                    site_ids,
                    limit: Some(50),
                    ..Default::default()
                })
                .await?;
            let orders: Vec<_> = orders
                .into_iter()
                .map(|o| json!({ "order": o, "percent": o.progress.percent() }))
                .collect();
            views.render(
                "dashboard_client",
                &page(Some(&session), "Our work orders", None, json!({ "orders": orders })),
            )
        }
    }
}

async fn admin_dashboard(session: &Session, pool: &DbPool, views: &Views) -> AppResult<HttpResponse> {
    let counts: Vec<_> = pool
        .count_work_orders_by_status()
        .await?
        .into_iter()
        .map(|(status, count)| json!({ "status": status, "count": count }))
        .collect();
    let (today, _) = pool
        .list_work_orders(&WorkOrderListQuery {
            scheduled_on: Some(Utc::now().date_naive()),
            ..Default::default()
        })
        .await?;
    let unread = pool.count_unread_messages().await?;

    views.render(
        "dashboard_admin",
        &page(
            Some(session),
            "Dashboard",
            None,
            json!({ "counts": counts, "today": today, "unread": unread }),
        ),
    )
}

/// Configure dashboard routes.
pub fn configure_dashboard_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(dashboard)));
}
