//! Job item pages: status changes, assignment, notes, photos and checklists.

use actix_multipart::Multipart;
use actix_web::{HttpResponse, web};
use chrono::Utc;
use futures_util::StreamExt;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::api::forms::{ErrorQuery, or_back, redirect};
use crate::api::scope;
use crate::auth::Session;
use crate::config::Config;
use crate::db::{AppliedTransition, DbPool, JobItemDetail, NewPhoto, job_item_status};
use crate::entity::job_photo;
use crate::error::{AppError, AppResult};
use crate::models::job_item::{AssignTechnicianForm, ChecklistForm, JobStatusForm, TechNoteForm};
use crate::models::{JobItemStatus, JobPhoto, JobType, PhotoType, UserRole, non_empty};
use crate::services::job_lifecycle::{self, LifecycleEvent};
use crate::services::notifier::{Audience, NotificationEvent, NotificationHub};
use crate::services::storage::PHOTO_EXTENSIONS;
use crate::services::{Storage, checklist};
use crate::views::{Views, page};

fn job_url(id: Uuid) -> String {
    format!("/jobs/{}", id)
}

fn photo_view(photo: job_photo::Model) -> Option<JobPhoto> {
    Some(JobPhoto {
        photo_type: PhotoType::parse(&photo.photo_type)?,
        url: format!("/files/{}", photo.s3_key),
        id: photo.id,
        job_item_id: photo.job_item_id,
        created_at: photo.created_at,
    })
}

async fn show_job(
    session: Session,
    pool: web::Data<DbPool>,
    views: web::Data<Views>,
    path: web::Path<Uuid>,
    query: web::Query<ErrorQuery>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    let detail = pool.get_job_item_detail(id).await?;
    scope::ensure_site_access(&pool, &session, detail.asset.location.site_id).await?;

    let can_edit = job_lifecycle::authorize_mutation(&session.actor(), detail.item.technician_id).is_ok();

    let mut items = checklist::load(detail.item.checklist.as_ref());
    let mut prefilled = false;
    if items.is_empty() && can_edit {
        if let Some(job_type) = JobType::parse(&detail.work_order.job_type) {
            if let Some(template) = pool.checklist_template_for(job_type).await? {
                items = checklist::from_template(&template.items);
                prefilled = true;
            }
        }
    }

    let technicians = if session.is_admin() {
        pool.list_technicians().await?
    } else {
        Vec::new()
    };

    let JobItemDetail {
        item,
        status,
        work_order,
        asset,
        technician,
        photos,
    } = detail;
    let photos: Vec<JobPhoto> = photos.into_iter().filter_map(photo_view).collect();
    let targets = job_lifecycle::allowed_targets(status);

    views.render(
        "job",
        &page(
            Some(&session),
            &asset.asset.name,
            query.error.as_deref(),
            json!({
                "item": item,
                "status": status,
                "work_order": work_order,
                "asset": asset,
                "technician": technician,
                "photos": photos,
                "photo_types": PhotoType::ALL,
                "photo_accept": PHOTO_EXTENSIONS.iter().map(|e| format!(".{}", e)).collect::<Vec<_>>().join(","),
                "targets": targets,
                "can_edit": can_edit,
                "photos_mutable": can_edit && job_lifecycle::photos_are_mutable(status),
                "checklist": items,
                "checklist_prefilled": prefilled,
                "technicians": technicians,
            }),
        ),
    )
}

/// Tell the right people about an accepted transition.
async fn notify_transition(
    pool: &DbPool,
    hub: &NotificationHub,
    applied: &AppliedTransition,
) -> AppResult<()> {
    let event = applied.plan.event;
    if !matches!(event, LifecycleEvent::Started | LifecycleEvent::Completed) {
        return Ok(());
    }

    let id = applied.item.id;
    let detail = pool.get_job_item_detail(id).await?;
    let site_id = detail.asset.location.site_id;
    let technician_name = detail
        .technician
        .as_ref()
        .map(|t| t.display_name.clone())
        .unwrap_or_else(|| "Unassigned".to_string());
    let audience = [Audience::SiteClients(site_id)];

    if event == LifecycleEvent::Started {
        let started = NotificationEvent::JobStarted {
            job_item_id: id,
            work_order_number: detail.work_order.number.clone(),
            asset_name: detail.asset.asset.name.clone(),
            site_name: detail.asset.location.site_name.clone(),
            technician_name,
        };
        hub.notify(pool, started, &audience).await;
        return Ok(());
    }

    let completed = NotificationEvent::JobCompleted {
        job_item_id: id,
        work_order_number: detail.work_order.number.clone(),
        asset_name: detail.asset.asset.name.clone(),
        site_name: detail.asset.location.site_name.clone(),
        technician_name,
    };
    hub.notify(pool, completed, &audience).await;

    // Only the transition that closed the work order announces it
    if let Some(progress) = applied.completed_order {
        info!(number = %detail.work_order.number, "Every job of the work order is DONE");
        let finished = NotificationEvent::WorkOrderCompleted {
            work_order_id: detail.work_order.id,
            work_order_number: detail.work_order.number,
            site_name: detail.asset.location.site_name,
            total_items: progress.total,
        };
        hub.notify(pool, finished, &[Audience::SiteClients(site_id), Audience::AdminChannel])
            .await;
    }
    Ok(())
}

async fn change_status(
    session: Session,
    pool: web::Data<DbPool>,
    hub: web::Data<NotificationHub>,
    path: web::Path<Uuid>,
    form: web::Form<JobStatusForm>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    let back = job_url(id);
    let result: AppResult<HttpResponse> = async {
        let target = JobItemStatus::parse(&form.status).ok_or_else(|| {
            AppError::InvalidInput(format!("Unknown job status '{}'", form.status))
        })?;
        let applied = pool
            .transition_job_item(id, &session.actor(), target, Utc::now())
            .await?;
        info!(
            job_item_id = %id,
            from = %applied.plan.from,
            to = %applied.plan.to,
            by = %session.username,
            "Job status changed"
        );

        // The status change is committed; notification trouble is only logged.
        if let Err(e) = notify_transition(&pool, &hub, &applied).await {
            warn!(job_item_id = %id, "Skipped job notifications: {}", e);
        }
        Ok(redirect(&back))
    }
    .await;
    or_back(result, &back)
}

async fn assign(
    session: Session,
    pool: web::Data<DbPool>,
    hub: web::Data<NotificationHub>,
    path: web::Path<Uuid>,
    form: web::Form<AssignTechnicianForm>,
) -> AppResult<HttpResponse> {
    session.require_admin()?;
    let id = path.into_inner();
    let back = job_url(id);
    let result: AppResult<HttpResponse> = async {
        let technician = pool
            .get_user(form.technician_id)
            .await?
            .filter(|u| u.role == UserRole::Technician)
            .ok_or_else(|| AppError::InvalidInput("Pick an active technician".to_string()))?;
        pool.assign_technician(id, technician.id).await?;
        info!(job_item_id = %id, technician = %technician.username, "Technician assigned");

        let detail = pool.get_job_item_detail(id).await?;
        let site_id = detail.asset.location.site_id;
        let event = NotificationEvent::TechnicianAssigned {
            job_item_id: id,
            work_order_number: detail.work_order.number,
            asset_name: detail.asset.asset.name,
            site_name: detail.asset.location.site_name,
            technician_name: technician.display_name,
        };
        hub.notify(
            &pool,
            event,
            &[Audience::User(technician.id), Audience::SiteClients(site_id)],
        )
        .await;
        Ok(redirect(&back))
    }
    .await;
    or_back(result, &back)
}

async fn update_note(
    session: Session,
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
    form: web::Form<TechNoteForm>,
) -> AppResult<HttpResponse> {
    session.require_staff()?;
    let id = path.into_inner();
    let back = job_url(id);
    let item = pool.get_job_item(id).await?;
    job_lifecycle::authorize_mutation(&session.actor(), item.technician_id)?;
    let result: AppResult<HttpResponse> = async {
        let form = form.into_inner();
        form.validate()?;
        pool.update_tech_note(id, non_empty(Some(form.tech_note))).await?;
        Ok(redirect(&back))
    }
    .await;
    or_back(result, &back)
}

async fn save_checklist(
    session: Session,
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
    form: web::Form<ChecklistForm>,
) -> AppResult<HttpResponse> {
    session.require_staff()?;
    let id = path.into_inner();
    let back = job_url(id);
    let item = pool.get_job_item(id).await?;
    job_lifecycle::authorize_mutation(&session.actor(), item.technician_id)?;
    let result: AppResult<HttpResponse> = async {
        let items = checklist::parse_submission(&form.items)?;
        let document = checklist::evaluate(items)?;
        pool.save_checklist(id, document).await?;
        Ok(redirect(&back))
    }
    .await;
    or_back(result, &back)
}

/// Uploaded photo fields.
struct PhotoUpload {
    photo_type: PhotoType,
    extension: String,
    content_type: &'static str,
    data: Vec<u8>,
}

/// Lower-cased extension when it is an accepted image type.
fn photo_extension(filename: &str) -> Option<(String, &'static str)> {
    let (_, ext) = filename.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    let content_type = Storage::photo_content_type(&ext)?;
    Some((ext, content_type))
}

async fn read_photo_form(mut payload: Multipart, max_size: usize) -> AppResult<PhotoUpload> {
    let mut photo_type = None;
    let mut file = None;

    while let Some(item) = payload.next().await {
        let mut field =
            item.map_err(|e| AppError::InvalidInput(format!("Multipart error: {}", e)))?;
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "photo_type" => {
                let mut raw = Vec::new();
                while let Some(chunk) = field.next().await {
                    let chunk =
                        chunk.map_err(|e| AppError::InvalidInput(format!("Read error: {}", e)))?;
                    raw.extend_from_slice(&chunk);
                    if raw.len() > 32 {
                        return Err(AppError::InvalidInput("Unknown photo type".to_string()));
                    }
                }
                let raw = String::from_utf8_lossy(&raw).to_string();
                photo_type = Some(PhotoType::parse(&raw).ok_or_else(|| {
                    AppError::InvalidInput(format!("Unknown photo type '{}'", raw.trim()))
                })?);
            }
            "file" => {
                let filename = field
                    .content_disposition()
                    .and_then(|cd| cd.get_filename())
                    .unwrap_or_default()
                    .to_string();
                let (extension, content_type) = photo_extension(&filename).ok_or_else(|| {
                    AppError::InvalidInput(format!(
                        "Photos must be one of: {}",
                        PHOTO_EXTENSIONS.join(", ")
                    ))
                })?;

                let mut data = Vec::new();
                while let Some(chunk) = field.next().await {
                    let chunk =
                        chunk.map_err(|e| AppError::InvalidInput(format!("Read error: {}", e)))?;
                    if data.len() + chunk.len() > max_size {
                        return Err(AppError::InvalidInput(format!(
                            "Photo exceeds the {} MB limit",
                            max_size / 1024 / 1024
                        )));
                    }
                    data.extend_from_slice(&chunk);
                }
                if data.is_empty() {
                    return Err(AppError::InvalidInput("Choose a photo to upload".to_string()));
                }
                file = Some((extension, content_type, data));
            }
            other => {
                return Err(AppError::InvalidInput(format!("Unexpected field '{}'", other)));
            }
        }
    }

    let photo_type =
        photo_type.ok_or_else(|| AppError::InvalidInput("Choose a photo type".to_string()))?;
    let (extension, content_type, data) =
        file.ok_or_else(|| AppError::InvalidInput("Choose a photo to upload".to_string()))?;
    Ok(PhotoUpload {
        photo_type,
        extension,
        content_type,
        data,
    })
}

async fn upload_photo(
    session: Session,
    pool: web::Data<DbPool>,
    storage: web::Data<Storage>,
    config: web::Data<Config>,
    path: web::Path<Uuid>,
    payload: Multipart,
) -> AppResult<HttpResponse> {
    session.require_staff()?;
    let id = path.into_inner();
    let back = job_url(id);
    let item = pool.get_job_item(id).await?;
    job_lifecycle::authorize_mutation(&session.actor(), item.technician_id)?;

    let result: AppResult<HttpResponse> = async {
        if !job_lifecycle::photos_are_mutable(job_item_status(&item)?) {
            return Err(AppError::InvalidInput(
                "Photos of a DONE job cannot be changed".to_string(),
            ));
        }

        let upload = read_photo_form(payload, config.max_photo_size).await?;
        let photo_id = Uuid::now_v7();
        let key = Storage::photo_key(item.work_order_id, id, photo_id, &upload.extension);
        let size_bytes = upload.data.len() as i64;

        storage.put(&key, upload.data, upload.content_type).await?;
        let photo = NewPhoto {
            id: photo_id,
            job_item_id: id,
            photo_type: upload.photo_type,
            s3_key: key.clone(),
            content_type: upload.content_type.to_string(),
            size_bytes,
            uploaded_by: session.user_id,
        };
        let inserted = pool.insert_photo(photo, &session.actor()).await;
        if let Err(e) = inserted {
            storage.delete_best_effort(std::slice::from_ref(&key)).await;
            return Err(e);
        }

        info!(job_item_id = %id, photo_type = %upload.photo_type, size_bytes, "Photo uploaded");
        Ok(redirect(&back))
    }
    .await;
    or_back(result, &back)
}

async fn delete_photo(
    session: Session,
    pool: web::Data<DbPool>,
    storage: web::Data<Storage>,
    path: web::Path<(Uuid, Uuid)>,
) -> AppResult<HttpResponse> {
    session.require_staff()?;
    let (id, photo_id) = path.into_inner();
    let back = job_url(id);
    let result: AppResult<HttpResponse> = async {
        let photo = pool.get_photo(photo_id).await?;
        if photo.job_item_id != id {
            return Err(AppError::NotFound("Photo".to_string()));
        }
        let key = pool.delete_photo(photo_id, &session.actor()).await?;
        storage.delete_best_effort(&[key]).await;
        Ok(redirect(&back))
    }
    .await;
    or_back(result, &back)
}

/// Configure job item routes.
pub fn configure_job_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/jobs/{id}").route(web::get().to(show_job)))
        .service(web::resource("/jobs/{id}/status").route(web::post().to(change_status)))
        .service(web::resource("/jobs/{id}/assign").route(web::post().to(assign)))
        .service(web::resource("/jobs/{id}/note").route(web::post().to(update_note)))
        .service(web::resource("/jobs/{id}/checklist").route(web::post().to(save_checklist)))
        .service(web::resource("/jobs/{id}/photos").route(web::post().to(upload_photo)))
        .service(
            web::resource("/jobs/{id}/photos/{photo_id}/delete")
                .route(web::post().to(delete_photo)),
        );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_photo_extension_accepts_known_images() {
        assert_eq!(
            photo_extension("IMG_0001.JPG"),
            Some(("jpg".to_string(), "image/jpeg"))
        );
        assert_eq!(
            photo_extension("meter.reading.heic").map(|(ext, _)| ext),
            Some("heic".to_string())
        );
    }

    #[test]
    fn test_photo_extension_rejects_others() {
        assert_eq!(photo_extension("report.pdf"), None);
        assert_eq!(photo_extension("noextension"), None);
    }
}
