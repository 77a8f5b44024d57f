//! Contact form, client repair requests and the admin inbox.

use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::api::forms::{or_back, redirect};
use crate::api::scope;
use crate::auth::{MaybeSession, Session};
use crate::db::{DbPool, NewContactMessage};
use crate::error::{AppError, AppResult};
use crate::models::{
    ContactForm, ContactKind, Pagination, PaginationParams, RepairRequestForm, non_empty,
};
use crate::services::notifier::{Audience, NotificationEvent, NotificationHub};
use crate::views::{Views, page};

#[derive(Debug, Default, Deserialize)]
struct FormPageQuery {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    sent: Option<String>,
    #[serde(default)]
    site_id: Option<String>,
}

async fn contact_page(
    session: MaybeSession,
    views: web::Data<Views>,
    query: web::Query<FormPageQuery>,
) -> AppResult<HttpResponse> {
    views.render(
        "contact",
        &page(
            session.0.as_ref(),
            "Contact us",
            query.error.as_deref(),
            json!({ "sent": query.sent.is_some() }),
        ),
    )
}

async fn submit_contact(
    session: MaybeSession,
    pool: web::Data<DbPool>,
    form: web::Form<ContactForm>,
) -> AppResult<HttpResponse> {
    let result: AppResult<HttpResponse> = async {
        let form = form.into_inner();
        form.validate()?;
        let stored = pool
            .insert_contact_message(NewContactMessage {
                kind: ContactKind::Contact,
                name: form.name.trim().to_string(),
                phone: non_empty(form.phone),
                email: non_empty(form.email),
                message: form.message.trim().to_string(),
                site_id: None,
                asset_id: None,
                user_id: session.0.as_ref().map(|s| s.user_id),
            })
            .await?;
        info!(message_id = %stored.id, "Contact message received");
        Ok(redirect("/contact?sent=1"))
    }
    .await;
    or_back(result, "/contact")
}

async fn repair_request_page(
    session: Session,
    pool: web::Data<DbPool>,
    views: web::Data<Views>,
    query: web::Query<FormPageQuery>,
) -> AppResult<HttpResponse> {
    let client_id = session.require_client()?;
    let sites = pool.list_sites(Some(client_id)).await?;
    let selected = non_empty(query.site_id.clone())
        .and_then(|raw| Uuid::parse_str(&raw).ok())
        .filter(|id| sites.iter().any(|s| s.id == *id));
    let assets = match selected {
        Some(site_id) => pool.list_assets_for_site(site_id).await?,
        None => Vec::new(),
    };
    views.render(
        "repair_request",
        &page(
            Some(&session),
            "Request a repair",
            query.error.as_deref(),
            json!({
                "sites": sites,
                "site_id": selected,
                "assets": assets,
                "sent": query.sent.is_some(),
            }),
        ),
    )
}

async fn submit_repair_request(
    session: Session,
    pool: web::Data<DbPool>,
    hub: web::Data<NotificationHub>,
    form: web::Form<RepairRequestForm>,
) -> AppResult<HttpResponse> {
    let client_id = session.require_client()?;
    let form = form.into_inner();
    scope::ensure_site_access(&pool, &session, form.site_id).await?;
    let back = format!("/repair-requests?site_id={}", form.site_id);

    let result: AppResult<HttpResponse> = async {
        form.validate()?;
        let asset = match non_empty(form.asset_id.clone()) {
            Some(raw) => {
                let asset_id = Uuid::parse_str(&raw)?;
                if pool.site_id_for_asset(asset_id).await? != form.site_id {
                    return Err(AppError::InvalidInput(
                        "The unit does not belong to the selected site".to_string(),
                    ));
                }
                Some(pool.get_asset(asset_id).await?)
            }
            None => None,
        };

        let requester = pool
            .get_user(session.user_id)
            .await?
            .map(|u| u.display_name)
            .unwrap_or_else(|| session.username.clone());
        let description = form.description.trim().to_string();

        let stored = pool
            .insert_contact_message(NewContactMessage {
                kind: ContactKind::RepairRequest,
                name: requester,
                phone: None,
                email: None,
                message: description.clone(),
                site_id: Some(form.site_id),
                asset_id: asset.as_ref().map(|a| a.id),
                user_id: Some(session.user_id),
            })
            .await?;
        info!(message_id = %stored.id, site_id = %form.site_id, "Repair request raised");

        let client = pool.get_client(client_id).await?;
        let site = pool.get_site(form.site_id).await?;
        let event = NotificationEvent::RepairRequested {
            message_id: stored.id,
            client_name: client.name,
            site_name: site.name,
            asset_name: asset.map(|a| a.name),
            description,
        };
        hub.notify(&pool, event, &[Audience::AdminChannel]).await;

        Ok(redirect("/repair-requests?sent=1"))
    }
    .await;
    or_back(result, &back)
}

async fn list_messages(
    session: Session,
    pool: web::Data<DbPool>,
    views: web::Data<Views>,
    paging: web::Query<PaginationParams>,
) -> AppResult<HttpResponse> {
    session.require_admin()?;
    let (messages, total) = pool
        .list_contact_messages(paging.offset(), u64::from(paging.clamped_limit()))
        .await?;
    let messages: Vec<_> = messages
        .into_iter()
        .map(|m| {
            let is_repair = m.kind == ContactKind::RepairRequest.as_str();
            json!({ "message": m, "is_repair": is_repair })
        })
        .collect();
    views.render(
        "messages",
        &page(
            Some(&session),
            "Messages",
            None,
            json!({
                "messages": messages,
                "pagination": Pagination::new(paging.page(), paging.clamped_limit(), total),
            }),
        ),
    )
}

async fn mark_read(
    session: Session,
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    session.require_admin()?;
    pool.mark_message_read(path.into_inner()).await?;
    Ok(redirect("/messages"))
}

async fn delete_message(
    session: Session,
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    session.require_admin()?;
    pool.delete_contact_message(path.into_inner()).await?;
    Ok(redirect("/messages"))
}

async fn list_incidents(
    session: Session,
    pool: web::Data<DbPool>,
    views: web::Data<Views>,
    paging: web::Query<PaginationParams>,
) -> AppResult<HttpResponse> {
    session.require_admin()?;
    let (incidents, total) = pool
        .list_incidents(paging.offset(), u64::from(paging.clamped_limit()))
        .await?;
    views.render(
        "incidents",
        &page(
            Some(&session),
            "Security incidents",
            None,
            json!({
                "incidents": incidents,
                "pagination": Pagination::new(paging.page(), paging.clamped_limit(), total),
            }),
        ),
    )
}

/// Configure contact, repair request, inbox and incident routes.
pub fn configure_message_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/contact")
            .route(web::get().to(contact_page))
            .route(web::post().to(submit_contact)),
    )
    .service(
        web::resource("/repair-requests")
            .route(web::get().to(repair_request_page))
            .route(web::post().to(submit_repair_request)),
    )
    .service(web::resource("/messages").route(web::get().to(list_messages)))
    .service(web::resource("/messages/{id}/read").route(web::post().to(mark_read)))
    .service(web::resource("/messages/{id}/delete").route(web::post().to(delete_message)))
    .service(web::resource("/incidents").route(web::get().to(list_incidents)));
}
