//! Location hierarchy pages: clients, sites, buildings, floors, rooms and assets.
//!
//! Every role reads within its scope; only ADMIN writes.

use actix_web::{HttpResponse, web};
use serde_json::{Value, json};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::api::forms::{ErrorQuery, or_back, redirect};
use crate::api::scope;
use crate::auth::Session;
use crate::db::DbPool;
use crate::entity::{building, floor, room, site};
use crate::error::{AppError, AppResult};
use crate::models::location::Crumb;
use crate::models::{AssetForm, ClientForm, NamedLocationForm, SiteForm, UserRole};
use crate::views::{Views, page};

fn crumb(label: &str, href: String) -> Crumb {
    Crumb {
        label: label.to_string(),
        href,
    }
}

async fn site_crumbs(pool: &DbPool, site: &site::Model) -> AppResult<Vec<Crumb>> {
    let client = pool.get_client(site.client_id).await?;
    Ok(vec![
        crumb(&client.name, format!("/clients/{}", client.id)),
        crumb(&site.name, format!("/sites/{}", site.id)),
    ])
}

async fn building_crumbs(pool: &DbPool, building: &building::Model) -> AppResult<(Uuid, Vec<Crumb>)> {
    let site = pool.get_site(building.site_id).await?;
    let mut crumbs = site_crumbs(pool, &site).await?;
    crumbs.push(crumb(&building.name, format!("/buildings/{}", building.id)));
    Ok((site.id, crumbs))
}

async fn floor_crumbs(pool: &DbPool, floor: &floor::Model) -> AppResult<(Uuid, Vec<Crumb>)> {
    let building = pool.get_building(floor.building_id).await?;
    let (site_id, mut crumbs) = building_crumbs(pool, &building).await?;
    crumbs.push(crumb(&floor.name, format!("/floors/{}", floor.id)));
    Ok((site_id, crumbs))
}

async fn room_crumbs(pool: &DbPool, room: &room::Model) -> AppResult<(Uuid, Vec<Crumb>)> {
    let floor = pool.get_floor(room.floor_id).await?;
    let (site_id, mut crumbs) = floor_crumbs(pool, &floor).await?;
    crumbs.push(crumb(&room.name, format!("/rooms/{}", room.id)));
    Ok((site_id, crumbs))
}

/// Context of the shared site/building/floor page.
struct LocationPage<'a> {
    kind: &'a str,
    id: Uuid,
    name: &'a str,
    address: Option<&'a str>,
    base: &'a str,
    crumbs: Vec<Crumb>,
    child_label: &'a str,
    child_path: &'a str,
    children: Vec<(Uuid, String)>,
}

impl LocationPage<'_> {
    fn into_context(self) -> Value {
        let children: Vec<Value> = self
            .children
            .into_iter()
            .map(|(id, name)| json!({ "name": name, "href": format!("/{}/{}", self.child_path, id) }))
            .collect();
        json!({
            "id": self.id,
            "kind": self.kind,
            "name": self.name,
            "is_site": self.kind == "Site",
            "address": self.address,
            "crumbs": self.crumbs,
            "children": children,
            "child_label": self.child_label,
            "action": format!("/{}/{}", self.base, self.id),
        })
    }
}

// ----------------------------------------------------------------------
// Clients
// ----------------------------------------------------------------------

async fn list_clients(
    session: Session,
    pool: web::Data<DbPool>,
    views: web::Data<Views>,
    query: web::Query<ErrorQuery>,
) -> AppResult<HttpResponse> {
    if session.role == UserRole::Client {
        let client_id = session.require_client()?;
        return Ok(redirect(&format!("/clients/{}", client_id)));
    }
    let clients = pool.list_clients().await?;
    views.render(
        "clients",
        &page(
            Some(&session),
            "Clients",
            query.error.as_deref(),
            json!({ "clients": clients }),
        ),
    )
}

async fn create_client(
    session: Session,
    pool: web::Data<DbPool>,
    form: web::Form<ClientForm>,
) -> AppResult<HttpResponse> {
    session.require_admin()?;
    let result: AppResult<HttpResponse> = async {
        let form = form.into_inner();
        form.validate()?;
        let client = pool.insert_client(form).await?;
        info!(client_id = %client.id, name = %client.name, "Client created");
        Ok(redirect(&format!("/clients/{}", client.id)))
    }
    .await;
    or_back(result, "/clients")
}

async fn show_client(
    session: Session,
    pool: web::Data<DbPool>,
    views: web::Data<Views>,
    path: web::Path<Uuid>,
    query: web::Query<ErrorQuery>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    scope::ensure_client_access(&session, id)?;
    let client = pool.get_client(id).await?;
    let sites = pool.list_sites(Some(id)).await?;
    views.render(
        "client",
        &page(
            Some(&session),
            &client.name,
            query.error.as_deref(),
            json!({ "client": client, "sites": sites }),
        ),
    )
}

async fn update_client(
    session: Session,
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
    form: web::Form<ClientForm>,
) -> AppResult<HttpResponse> {
    session.require_admin()?;
    let id = path.into_inner();
    let back = format!("/clients/{}", id);
    let result: AppResult<HttpResponse> = async {
        let form = form.into_inner();
        form.validate()?;
        pool.update_client(id, form).await?;
        Ok(redirect(&back))
    }
    .await;
    or_back(result, &back)
}

async fn delete_client(
    session: Session,
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    session.require_admin()?;
    let id = path.into_inner();
    let result: AppResult<HttpResponse> = async {
        pool.delete_client(id).await?;
        info!(client_id = %id, by = %session.username, "Client deleted");
        Ok(redirect("/clients"))
    }
    .await;
    or_back(result, &format!("/clients/{}", id))
}

async fn create_site(
    session: Session,
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
    form: web::Form<SiteForm>,
) -> AppResult<HttpResponse> {
    session.require_admin()?;
    let client_id = path.into_inner();
    let result: AppResult<HttpResponse> = async {
        let form = form.into_inner();
        form.validate()?;
        let site = pool.insert_site(client_id, form).await?;
        Ok(redirect(&format!("/sites/{}", site.id)))
    }
    .await;
    or_back(result, &format!("/clients/{}", client_id))
}

// ----------------------------------------------------------------------
// Sites
// ----------------------------------------------------------------------

async fn show_site(
    session: Session,
    pool: web::Data<DbPool>,
    views: web::Data<Views>,
    path: web::Path<Uuid>,
    query: web::Query<ErrorQuery>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    scope::ensure_site_access(&pool, &session, id).await?;
    let site = pool.get_site(id).await?;
    let children = pool
        .list_buildings(id)
        .await?
        .into_iter()
        .map(|b| (b.id, b.name))
        .collect();
    let context = LocationPage {
        kind: "Site",
        id,
        name: &site.name,
        address: site.address.as_deref(),
        base: "sites",
        crumbs: site_crumbs(&pool, &site).await?,
        child_label: "Buildings",
        child_path: "buildings",
        children,
    }
    .into_context();
    views.render(
        "location",
        &page(Some(&session), &site.name, query.error.as_deref(), context),
    )
}

async fn update_site(
    session: Session,
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
    form: web::Form<SiteForm>,
) -> AppResult<HttpResponse> {
    session.require_admin()?;
    let id = path.into_inner();
    let back = format!("/sites/{}", id);
    let result: AppResult<HttpResponse> = async {
        let form = form.into_inner();
        form.validate()?;
        pool.update_site(id, form).await?;
        Ok(redirect(&back))
    }
    .await;
    or_back(result, &back)
}

async fn delete_site(
    session: Session,
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    session.require_admin()?;
    let id = path.into_inner();
    let site = pool.get_site(id).await?;
    let result: AppResult<HttpResponse> = async {
        pool.delete_site(id).await?;
        info!(site_id = %id, by = %session.username, "Site deleted");
        Ok(redirect(&format!("/clients/{}", site.client_id)))
    }
    .await;
    or_back(result, &format!("/sites/{}", id))
}

async fn create_building(
    session: Session,
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
    form: web::Form<NamedLocationForm>,
) -> AppResult<HttpResponse> {
    session.require_admin()?;
    let site_id = path.into_inner();
    let result: AppResult<HttpResponse> = async {
        let form = form.into_inner();
        form.validate()?;
        let building = pool.insert_building(site_id, form).await?;
        Ok(redirect(&format!("/buildings/{}", building.id)))
    }
    .await;
    or_back(result, &format!("/sites/{}", site_id))
}

// ----------------------------------------------------------------------
// Buildings
// ----------------------------------------------------------------------

async fn show_building(
    session: Session,
    pool: web::Data<DbPool>,
    views: web::Data<Views>,
    path: web::Path<Uuid>,
    query: web::Query<ErrorQuery>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    let building = pool.get_building(id).await?;
    scope::ensure_site_access(&pool, &session, building.site_id).await?;
    let (_, crumbs) = building_crumbs(&pool, &building).await?;
    let children = pool
        .list_floors(id)
        .await?
        .into_iter()
        .map(|f| (f.id, f.name))
        .collect();
    let context = LocationPage {
        kind: "Building",
        id,
        name: &building.name,
        address: None,
        base: "buildings",
        crumbs,
        child_label: "Floors",
        child_path: "floors",
        children,
    }
    .into_context();
    views.render(
        "location",
        &page(Some(&session), &building.name, query.error.as_deref(), context),
    )
}

async fn rename_building(
    session: Session,
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
    form: web::Form<NamedLocationForm>,
) -> AppResult<HttpResponse> {
    session.require_admin()?;
    let id = path.into_inner();
    let back = format!("/buildings/{}", id);
    let result: AppResult<HttpResponse> = async {
        form.validate()?;
        pool.rename_building(id, form.name.trim()).await?;
        Ok(redirect(&back))
    }
    .await;
    or_back(result, &back)
}

async fn delete_building(
    session: Session,
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    session.require_admin()?;
    let id = path.into_inner();
    let building = pool.get_building(id).await?;
    let result: AppResult<HttpResponse> = async {
        pool.delete_building(id).await?;
        Ok(redirect(&format!("/sites/{}", building.site_id)))
    }
    .await;
    or_back(result, &format!("/buildings/{}", id))
}

async fn create_floor(
    session: Session,
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
    form: web::Form<NamedLocationForm>,
) -> AppResult<HttpResponse> {
    session.require_admin()?;
    let building_id = path.into_inner();
    let result: AppResult<HttpResponse> = async {
        let form = form.into_inner();
        form.validate()?;
        let floor = pool.insert_floor(building_id, form).await?;
        Ok(redirect(&format!("/floors/{}", floor.id)))
    }
    .await;
    or_back(result, &format!("/buildings/{}", building_id))
}

// ----------------------------------------------------------------------
// Floors
// ----------------------------------------------------------------------

async fn show_floor(
    session: Session,
    pool: web::Data<DbPool>,
    views: web::Data<Views>,
    path: web::Path<Uuid>,
    query: web::Query<ErrorQuery>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    let floor = pool.get_floor(id).await?;
    let (site_id, crumbs) = floor_crumbs(&pool, &floor).await?;
    scope::ensure_site_access(&pool, &session, site_id).await?;
    let children = pool
        .list_rooms(id)
        .await?
        .into_iter()
        .map(|r| (r.id, r.name))
        .collect();
    let context = LocationPage {
        kind: "Floor",
        id,
        name: &floor.name,
        address: None,
        base: "floors",
        crumbs,
        child_label: "Rooms",
        child_path: "rooms",
        children,
    }
    .into_context();
    views.render(
        "location",
        &page(Some(&session), &floor.name, query.error.as_deref(), context),
    )
}

async fn rename_floor(
    session: Session,
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
    form: web::Form<NamedLocationForm>,
) -> AppResult<HttpResponse> {
    session.require_admin()?;
    let id = path.into_inner();
    let back = format!("/floors/{}", id);
    let result: AppResult<HttpResponse> = async {
        form.validate()?;
        pool.rename_floor(id, form.name.trim()).await?;
        Ok(redirect(&back))
    }
    .await;
    or_back(result, &back)
}

async fn delete_floor(
    session: Session,
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    session.require_admin()?;
    let id = path.into_inner();
    let floor = pool.get_floor(id).await?;
    let result: AppResult<HttpResponse> = async {
        pool.delete_floor(id).await?;
        Ok(redirect(&format!("/buildings/{}", floor.building_id)))
    }
    .await;
    or_back(result, &format!("/floors/{}", id))
}

async fn create_room(
    session: Session,
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
    form: web::Form<NamedLocationForm>,
) -> AppResult<HttpResponse> {
    session.require_admin()?;
    let floor_id = path.into_inner();
    let result: AppResult<HttpResponse> = async {
        let form = form.into_inner();
        form.validate()?;
        let room = pool.insert_room(floor_id, form).await?;
        Ok(redirect(&format!("/rooms/{}", room.id)))
    }
    .await;
    or_back(result, &format!("/floors/{}", floor_id))
}

// ----------------------------------------------------------------------
// Rooms
// ----------------------------------------------------------------------

async fn show_room(
    session: Session,
    pool: web::Data<DbPool>,
    views: web::Data<Views>,
    path: web::Path<Uuid>,
    query: web::Query<ErrorQuery>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    let room = pool.get_room(id).await?;
    let (site_id, crumbs) = room_crumbs(&pool, &room).await?;
    scope::ensure_site_access(&pool, &session, site_id).await?;
    let assets = pool.list_assets(id).await?;
    views.render(
        "room",
        &page(
            Some(&session),
            &room.name,
            query.error.as_deref(),
            json!({ "room": room, "crumbs": crumbs, "assets": assets }),
        ),
    )
}

async fn rename_room(
    session: Session,
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
    form: web::Form<NamedLocationForm>,
) -> AppResult<HttpResponse> {
    session.require_admin()?;
    let id = path.into_inner();
    let back = format!("/rooms/{}", id);
    let result: AppResult<HttpResponse> = async {
        form.validate()?;
        pool.rename_room(id, form.name.trim()).await?;
        Ok(redirect(&back))
    }
    .await;
    or_back(result, &back)
}

async fn delete_room(
    session: Session,
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    session.require_admin()?;
    let id = path.into_inner();
    let room = pool.get_room(id).await?;
    let result: AppResult<HttpResponse> = async {
        pool.delete_room(id).await?;
        Ok(redirect(&format!("/floors/{}", room.floor_id)))
    }
    .await;
    or_back(result, &format!("/rooms/{}", id))
}

async fn create_asset(
    session: Session,
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
    form: web::Form<AssetForm>,
) -> AppResult<HttpResponse> {
    session.require_admin()?;
    let room_id = path.into_inner();
    let result: AppResult<HttpResponse> = async {
        let form = form.into_inner();
        form.validate()?;
        form.capacity().map_err(AppError::InvalidInput)?;
        let asset = pool.insert_asset(room_id, form).await?;
        info!(asset_id = %asset.id, qr_code = %asset.qr_code, "Asset registered");
        Ok(redirect(&format!("/assets/{}", asset.id)))
    }
    .await;
    or_back(result, &format!("/rooms/{}", room_id))
}

// ----------------------------------------------------------------------
// Assets
// ----------------------------------------------------------------------

async fn show_asset(
    session: Session,
    pool: web::Data<DbPool>,
    views: web::Data<Views>,
    path: web::Path<Uuid>,
    query: web::Query<ErrorQuery>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    let detail = pool.get_asset_with_location(id).await?;
    scope::ensure_site_access(&pool, &session, detail.location.site_id).await?;
    let room = pool.get_room(detail.asset.room_id).await?;
    let (_, crumbs) = room_crumbs(&pool, &room).await?;
    views.render(
        "asset",
        &page(
            Some(&session),
            &detail.asset.name,
            query.error.as_deref(),
            json!({
                "asset": detail.asset,
                "location": detail.location,
                "summary": detail.location.summary(),
                "crumbs": crumbs,
            }),
        ),
    )
}

async fn update_asset(
    session: Session,
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
    form: web::Form<AssetForm>,
) -> AppResult<HttpResponse> {
    session.require_admin()?;
    let id = path.into_inner();
    let back = format!("/assets/{}", id);
    let result: AppResult<HttpResponse> = async {
        let form = form.into_inner();
        form.validate()?;
        form.capacity().map_err(AppError::InvalidInput)?;
        pool.update_asset(id, form).await?;
        Ok(redirect(&back))
    }
    .await;
    or_back(result, &back)
}

async fn delete_asset(
    session: Session,
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    session.require_admin()?;
    let id = path.into_inner();
    let asset = pool.get_asset(id).await?;
    let result: AppResult<HttpResponse> = async {
        pool.delete_asset(id).await?;
        info!(asset_id = %id, by = %session.username, "Asset deleted");
        Ok(redirect(&format!("/rooms/{}", asset.room_id)))
    }
    .await;
    or_back(result, &format!("/assets/{}", id))
}

/// Resolve a scanned QR code to its asset page.
async fn scan(
    session: Session,
    pool: web::Data<DbPool>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let code = path.into_inner();
    let asset = pool
        .find_asset_by_qr(code.trim())
        .await?
        .ok_or_else(|| AppError::NotFound("Asset".to_string()))?;
    let site_id = pool.site_id_for_asset(asset.id).await?;
    scope::ensure_site_access(&pool, &session, site_id).await?;
    Ok(redirect(&format!("/assets/{}", asset.id)))
}

/// Configure location hierarchy routes.
pub fn configure_location_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/clients")
            .route(web::get().to(list_clients))
            .route(web::post().to(create_client)),
    )
    .service(
        web::resource("/clients/{id}")
            .route(web::get().to(show_client))
            .route(web::post().to(update_client)),
    )
    .service(web::resource("/clients/{id}/delete").route(web::post().to(delete_client)))
    .service(web::resource("/clients/{id}/sites").route(web::post().to(create_site)))
    .service(
        web::resource("/sites/{id}")
            .route(web::get().to(show_site))
            .route(web::post().to(update_site)),
    )
    .service(web::resource("/sites/{id}/delete").route(web::post().to(delete_site)))
    .service(web::resource("/sites/{id}/children").route(web::post().to(create_building)))
    .service(
        web::resource("/buildings/{id}")
            .route(web::get().to(show_building))
            .route(web::post().to(rename_building)),
    )
    .service(web::resource("/buildings/{id}/delete").route(web::post().to(delete_building)))
    .service(web::resource("/buildings/{id}/children").route(web::post().to(create_floor)))
    .service(
        web::resource("/floors/{id}")
            .route(web::get().to(show_floor))
            .route(web::post().to(rename_floor)),
    )
    .service(web::resource("/floors/{id}/delete").route(web::post().to(delete_floor)))
    .service(web::resource("/floors/{id}/children").route(web::post().to(create_room)))
    .service(
        web::resource("/rooms/{id}")
            .route(web::get().to(show_room))
            .route(web::post().to(rename_room)),
    )
    .service(web::resource("/rooms/{id}/delete").route(web::post().to(delete_room)))
    .service(web::resource("/rooms/{id}/assets").route(web::post().to(create_asset)))
    .service(
        web::resource("/assets/{id}")
            .route(web::get().to(show_asset))
            .route(web::post().to(update_asset)),
    )
    .service(web::resource("/assets/{id}/delete").route(web::post().to(delete_asset)))
    .service(web::resource("/scan/{code}").route(web::get().to(scan)));
}
