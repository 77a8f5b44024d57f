//! Job photo serving.
//!
//! Proxies photo requests to S3 storage after checking the caller may see the job.

use actix_web::http::header;
use actix_web::{HttpResponse, web};
use tracing::debug;

use crate::api::scope;
use crate::auth::Session;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::services::Storage;

/// Serve a stored photo.
pub async fn serve_file(
    session: Session,
    pool: web::Data<DbPool>,
    storage: web::Data<Storage>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let key = path.into_inner();

    if !key.starts_with("work-orders/") {
        return Err(AppError::NotFound("File".to_string()));
    }

    let photo = pool
        .find_photo_by_key(&key)
        .await?
        .ok_or_else(|| AppError::NotFound("File".to_string()))?;
    let item = pool.get_job_item(photo.job_item_id).await?;
    let site_id = pool.site_id_for_asset(item.asset_id).await?;
    scope::ensure_site_access(&pool, &session, site_id).await?;

    debug!("Serving photo from S3: {}", key);
    let (data, content_type) = storage.get(&key).await?;
    let content_type = content_type.unwrap_or(photo.content_type);

    Ok(HttpResponse::Ok()
        .content_type(content_type)
        .insert_header((header::CACHE_CONTROL, "private, max-age=3600"))
        .body(data))
}

/// Configure file routes.
pub fn configure_file_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/files/{key:.*}").route(web::get().to(serve_file)));
}
