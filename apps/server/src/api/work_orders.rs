//! Work order pages, client sign-off, CSV/Excel export and the progress endpoint.

use actix_web::http::header;
use actix_web::{HttpResponse, get, web};
use chrono::Utc;
use serde_json::json;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::api::forms::{ErrorQuery, or_back, redirect};
use crate::api::scope;
use crate::auth::Session;
use crate::auth::session::{generate_token, hash_token};
use crate::config::Config;
use crate::db::{DbPool, NewWorkOrder, WorkOrderListQuery};
use crate::error::{ApiError, AppError, AppResult};
use crate::models::work_order::{
    AddJobItemForm, ApprovalForm, CreateWorkOrderForm, UpdateWorkOrderForm, WorkOrderFilter,
    WorkOrderProgressResponse, WorkOrderStatusForm, parse_asset_ids,
};
use crate::models::{JobType, WorkOrderStatus, non_empty};
use crate::models::{Pagination, PaginationParams};
use crate::services::{Storage, export};
use crate::views::{Views, page};

fn parse_job_type(raw: &str) -> AppResult<JobType> {
    JobType::parse(raw).ok_or_else(|| AppError::InvalidInput(format!("Unknown job type '{}'", raw)))
}

/// Blank filter values mean "any".
fn list_query(filter: &WorkOrderFilter) -> AppResult<WorkOrderListQuery> {
    let status = match non_empty(filter.status.clone()) {
        Some(raw) => Some(WorkOrderStatus::parse(&raw).ok_or_else(|| {
            AppError::InvalidInput(format!("Unknown status '{}'", raw))
        })?),
        None => None,
    };
    let job_type = match non_empty(filter.job_type.clone()) {
        Some(raw) => Some(parse_job_type(&raw)?),
        None => None,
    };
    let site_id = match non_empty(filter.site_id.clone()) {
        Some(raw) => Some(Uuid::parse_str(&raw)?),
        None => None,
    };
    Ok(WorkOrderListQuery {
        status,
        job_type,
        site_id,
        ..Default::default()
    })
}

async fn list_work_orders(
    session: Session,
    pool: web::Data<DbPool>,
    views: web::Data<Views>,
    filter: web::Query<WorkOrderFilter>,
) -> AppResult<HttpResponse> {
    let filter = filter.into_inner();
    let paging = PaginationParams {
        page: filter.page,
        limit: None,
    };
    let mut query = match list_query(&filter) {
        Ok(query) => query,
        Err(err) if err.is_validation() => return Ok(redirect("/work-orders")),
        Err(err) => return Err(err),
    };
    query.site_ids = scope::visible_sites(&pool, &session).await?;
    query.offset = paging.offset();
    query.limit = Some(u64::from(paging.clamped_limit()));

    let (orders, total) = pool.list_work_orders(&query).await?;
    let sites = pool.list_sites(session.client_id).await?;
    let pagination = Pagination::new(paging.page(), paging.clamped_limit(), total);

    views.render(
        "work_orders",
        &page(
            Some(&session),
            "Work orders",
            filter.error.as_deref(),
            json!({
                "orders": orders,
                "pagination": pagination,
                "sites": sites,
                "statuses": WorkOrderStatus::ALL,
                "job_types": JobType::ALL,
                "filter": {
                    "status": filter.status,
                    "job_type": filter.job_type,
                    "site_id": filter.site_id,
                },
            }),
        ),
    )
}

#[derive(Debug, serde::Deserialize)]
struct NewWorkOrderQuery {
    #[serde(default)]
    site_id: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

async fn new_work_order(
    session: Session,
    pool: web::Data<DbPool>,
    views: web::Data<Views>,
    query: web::Query<NewWorkOrderQuery>,
) -> AppResult<HttpResponse> {
    session.require_admin()?;
    let sites = pool.list_sites(None).await?;
    let selected = non_empty(query.site_id.clone())
        .and_then(|raw| Uuid::parse_str(&raw).ok());
    let assets = match selected {
        Some(site_id) => pool.list_assets_for_site(site_id).await?,
        None => Vec::new(),
    };
    views.render(
        "work_order_new",
        &page(
            Some(&session),
            "New work order",
            query.error.as_deref(),
            json!({
                "sites": sites,
                "site_id": selected,
                "assets": assets,
                "job_types": JobType::ALL,
                "today": Utc::now().date_naive(),
            }),
        ),
    )
}

async fn create_work_order(
    session: Session,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
    form: web::Form<CreateWorkOrderForm>,
) -> AppResult<HttpResponse> {
    session.require_admin()?;
    let form = form.into_inner();
    let back = format!("/work-orders/new?site_id={}", form.site_id);
    let result: AppResult<HttpResponse> = async {
        form.validate()?;
        let created = pool
            .create_work_order(
                &config.work_order_prefix,
                NewWorkOrder {
                    site_id: form.site_id,
                    job_type: parse_job_type(&form.job_type)?,
                    scheduled_date: form.scheduled_date,
                    assigned_team: non_empty(form.assigned_team.clone()),
                    asset_ids: parse_asset_ids(&form.asset_ids)?,
                    created_by: session.user_id,
                },
            )
            .await?;
        Ok(redirect(&format!("/work-orders/{}", created.id)))
    }
    .await;
    or_back(result, &back)
}

async fn render_detail(
    session: &Session,
    pool: &DbPool,
    views: &Views,
    id: Uuid,
    error: Option<&str>,
    approval_link: Option<String>,
) -> AppResult<HttpResponse> {
    let detail = pool.get_work_order_detail(id).await?;
    scope::ensure_site_access(pool, session, detail.site.id).await?;

    let addable: Vec<_> = if session.is_admin() {
        pool.list_assets_for_site(detail.site.id)
            .await?
            .into_iter()
            .filter(|a| !detail.items.iter().any(|line| line.item.asset_id == a.id))
            .collect()
    } else {
        Vec::new()
    };

    views.render(
        "work_order",
        &page(
            Some(session),
            &detail.work_order.number,
            error,
            json!({
                "detail": detail,
                "percent": detail.progress.percent(),
                "fully_complete": detail.progress.is_fully_complete(),
                "addable": addable,
                "statuses": WorkOrderStatus::ALL,
                "job_types": JobType::ALL,
                "approval_link": approval_link,
            }),
        ),
    )
}

async fn show_work_order(
    session: Session,
    pool: web::Data<DbPool>,
    views: web::Data<Views>,
    path: web::Path<Uuid>,
    query: web::Query<ErrorQuery>,
) -> AppResult<HttpResponse> {
    render_detail(
        &session,
        &pool,
        &views,
        path.into_inner(),
        query.error.as_deref(),
        None,
    )
    .await
}

async fn update_work_order(
    session: Session,
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
    form: web::Form<UpdateWorkOrderForm>,
) -> AppResult<HttpResponse> {
    session.require_admin()?;
    let id = path.into_inner();
    let back = format!("/work-orders/{}", id);
    let result: AppResult<HttpResponse> = async {
        let form = form.into_inner();
        form.validate()?;
        pool.update_work_order(
            id,
            parse_job_type(&form.job_type)?,
            form.scheduled_date,
            non_empty(form.assigned_team),
        )
        .await?;
        Ok(redirect(&back))
    }
    .await;
    or_back(result, &back)
}

/// Manual status gate; job item progress never changes it.
async fn set_status(
    session: Session,
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
    form: web::Form<WorkOrderStatusForm>,
) -> AppResult<HttpResponse> {
    session.require_admin()?;
    let id = path.into_inner();
    let back = format!("/work-orders/{}", id);
    let result: AppResult<HttpResponse> = async {
        let status = WorkOrderStatus::parse(&form.status).ok_or_else(|| {
            AppError::InvalidInput(format!("Unknown status '{}'", form.status))
        })?;
        let updated = pool.set_work_order_status(id, status).await?;
        info!(number = %updated.number, status = %status, by = %session.username, "Work order status set");
        Ok(redirect(&back))
    }
    .await;
    or_back(result, &back)
}

async fn add_item(
    session: Session,
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
    form: web::Form<AddJobItemForm>,
) -> AppResult<HttpResponse> {
    session.require_admin()?;
    let id = path.into_inner();
    let back = format!("/work-orders/{}", id);
    let result: AppResult<HttpResponse> = async {
        pool.add_job_item(id, form.asset_id).await?;
        Ok(redirect(&back))
    }
    .await;
    or_back(result, &back)
}

async fn delete_work_order(
    session: Session,
    pool: web::Data<DbPool>,
    storage: web::Data<Storage>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    session.require_admin()?;
    let id = path.into_inner();
    let result: AppResult<HttpResponse> = async {
        let photo_keys = pool.delete_work_order(id).await?;
        storage.delete_best_effort(&photo_keys).await;
        Ok(redirect("/work-orders"))
    }
    .await;
    or_back(result, &format!("/work-orders/{}", id))
}

/// Issue a fresh client sign-off link. The raw token is shown once.
async fn issue_approval(
    session: Session,
    pool: web::Data<DbPool>,
    views: web::Data<Views>,
    config: web::Data<Config>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    session.require_admin()?;
    let id = path.into_inner();
    let back = format!("/work-orders/{}", id);

    let progress = pool.work_order_progress(id).await?;
    if !progress.is_fully_complete() {
        return or_back(
            Err(AppError::InvalidInput(
                "A sign-off link is only available once every job is DONE".to_string(),
            )),
            &back,
        );
    }

    let token = generate_token();
    pool.set_approval_token(id, hash_token(&token)).await?;
    let link = config.absolute_url(&format!("/approve/{}", token));
    info!(work_order_id = %id, by = %session.username, "Sign-off link issued");

    render_detail(&session, &pool, &views, id, None, Some(link)).await
}

async fn approval_page(
    session: Session,
    pool: web::Data<DbPool>,
    views: web::Data<Views>,
    path: web::Path<String>,
    query: web::Query<ErrorQuery>,
) -> AppResult<HttpResponse> {
    session.require_client()?;
    let token = path.into_inner();
    let order = pool
        .find_work_order_by_approval(&hash_token(&token))
        .await?;
    let detail = pool.get_work_order_detail(order.id).await?;
    scope::ensure_site_access(&pool, &session, detail.site.id).await?;
    views.render(
        "approve",
        &page(
            Some(&session),
            "Approve work order",
            query.error.as_deref(),
            json!({ "detail": detail, "token": token }),
        ),
    )
}

async fn approve(
    session: Session,
    pool: web::Data<DbPool>,
    path: web::Path<String>,
    form: web::Form<ApprovalForm>,
) -> AppResult<HttpResponse> {
    session.require_client()?;
    let token = path.into_inner();
    let back = format!("/approve/{}", token);
    let order = pool
        .find_work_order_by_approval(&hash_token(&token))
        .await?;
    scope::ensure_site_access(&pool, &session, order.site_id).await?;

    let result: AppResult<HttpResponse> = async {
        if form.confirm != "yes" {
            return Err(AppError::InvalidInput("Tick the box to confirm".to_string()));
        }
        pool.approve_work_order(order.id, session.user_id).await?;
        info!(number = %order.number, by = %session.username, "Work order approved by client");
        Ok(redirect(&format!("/work-orders/{}", order.id)))
    }
    .await;
    or_back(result, &back)
}

/// Export format of the work order list.
#[derive(Debug, Clone, Copy)]
enum ExportFormat {
    Csv,
    Xlsx,
}

impl ExportFormat {
    fn content_type(self) -> &'static str {
        match self {
            Self::Csv => "text/csv; charset=utf-8",
            Self::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        }
    }

    fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Xlsx => "xlsx",
        }
    }
}

/// Every work order matching the list filters, as a download.
async fn export_work_orders(
    session: &Session,
    pool: &DbPool,
    filter: &WorkOrderFilter,
    format: ExportFormat,
) -> AppResult<HttpResponse> {
    session.require_admin()?;
    let query = list_query(filter)?;
    let (rows, _) = pool.list_work_orders(&query).await?;
    let body = match format {
        ExportFormat::Csv => export::work_orders_csv(&rows)?,
        ExportFormat::Xlsx => export::work_orders_xlsx(&rows)?,
    };
    info!(
        rows = rows.len(),
        format = format.extension(),
        by = %session.username,
        "Work orders exported"
    );

    let filename = format!(
        "work-orders-{}.{}",
        Utc::now().format("%Y%m%d"),
        format.extension()
    );
    Ok(HttpResponse::Ok()
        .content_type(format.content_type())
        .insert_header((
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        ))
        .body(body))
}

async fn export_csv(
    session: Session,
    pool: web::Data<DbPool>,
    filter: web::Query<WorkOrderFilter>,
) -> AppResult<HttpResponse> {
    export_work_orders(&session, &pool, &filter, ExportFormat::Csv).await
}

async fn export_xlsx(
    session: Session,
    pool: web::Data<DbPool>,
    filter: web::Query<WorkOrderFilter>,
) -> AppResult<HttpResponse> {
    export_work_orders(&session, &pool, &filter, ExportFormat::Xlsx).await
}

/// Completion of one work order.
#[utoipa::path(
    get,
    path = "/api/v1/work-orders/{id}/progress",
    tag = "Work orders",
    params(("id" = Uuid, Path, description = "Work order id")),
    responses(
        (status = 200, description = "Progress", body = WorkOrderProgressResponse),
        (status = 401, description = "Not logged in", body = crate::error::ErrorResponse),
        (status = 404, description = "Work order not found", body = crate::error::ErrorResponse),
    ),
    security(("session" = []))
)]
#[get("/work-orders/{id}/progress")]
pub async fn work_order_progress(
    session: Session,
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let order = pool.get_work_order(path.into_inner()).await?;
    scope::ensure_site_access(&pool, &session, order.site_id).await?;
    let progress = pool.work_order_progress(order.id).await?;
    let status = WorkOrderStatus::parse(&order.status).unwrap_or(WorkOrderStatus::Open);
    Ok(HttpResponse::Ok().json(WorkOrderProgressResponse {
        work_order_id: order.id,
        number: order.number,
        status,
        done: progress.done,
        total: progress.total,
        fully_complete: progress.is_fully_complete(),
    }))
}

/// Configure work order page routes.
pub fn configure_work_order_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/work-orders")
            .route(web::get().to(list_work_orders))
            .route(web::post().to(create_work_order)),
    )
    .service(web::resource("/work-orders/new").route(web::get().to(new_work_order)))
    .service(web::resource("/work-orders/export.csv").route(web::get().to(export_csv)))
    .service(web::resource("/work-orders/export.xlsx").route(web::get().to(export_xlsx)))
    .service(
        web::resource("/work-orders/{id}")
            .route(web::get().to(show_work_order))
            .route(web::post().to(update_work_order)),
    )
    .service(web::resource("/work-orders/{id}/status").route(web::post().to(set_status)))
    .service(web::resource("/work-orders/{id}/items").route(web::post().to(add_item)))
    .service(web::resource("/work-orders/{id}/delete").route(web::post().to(delete_work_order)))
    .service(web::resource("/work-orders/{id}/approval").route(web::post().to(issue_approval)))
    .service(
        web::resource("/approve/{token}")
            .route(web::get().to(approval_page))
            .route(web::post().to(approve)),
    );
}

/// Configure the JSON work order endpoints (mounted under `/api/v1`).
pub fn configure_work_order_api(cfg: &mut web::ServiceConfig) {
    cfg.service(work_order_progress);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_filters_mean_any() {
        let filter = WorkOrderFilter {
            status: Some(String::new()),
            job_type: Some(" ".to_string()),
            site_id: Some(String::new()),
            ..Default::default()
        };
        let query = list_query(&filter).unwrap();
        assert!(query.status.is_none());
        assert!(query.job_type.is_none());
        assert!(query.site_id.is_none());
    }

    #[test]
    fn test_unknown_filter_is_rejected() {
        let filter = WorkOrderFilter {
            status: Some("ARCHIVED".to_string()),
            ..Default::default()
        };
        assert!(list_query(&filter).is_err());
    }
}
