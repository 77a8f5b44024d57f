//! Database queries for the location hierarchy.
//!
//! clients -> sites -> buildings -> floors -> rooms -> assets. Deletes rely on
//! ON DELETE CASCADE below the site. A site or client with work orders is
//! never deleted, and an asset still used by a job item blocks the delete.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, DbErr, EntityTrait, JoinType,
    QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set, SqlErr, TransactionTrait,
};
use serde::Serialize;
use uuid::Uuid;

use crate::entity::{asset, building, client, floor, room, site, work_order};
use crate::error::{AppError, AppResult};
use crate::models::{AssetForm, AssetLocation, ClientForm, NamedLocationForm, SiteForm, non_empty};

use super::DbPool;

/// Asset with the names of everything above it.
#[derive(Debug, Clone, Serialize)]
pub struct AssetWithLocation {
    pub asset: asset::Model,
    pub location: AssetLocation,
}

fn delete_error(what: &str, err: DbErr) -> AppError {
    match err.sql_err() {
        Some(SqlErr::ForeignKeyConstraintViolation(_)) => AppError::InvalidInput(format!(
            "This {} cannot be deleted while work orders still reference its units",
            what
        )),
        _ => AppError::from(err),
    }
}

/// Reject the delete while any work order points at one of `site_ids`.
///
/// The sites' FK is RESTRICT as well; this check names the blocking order.
async fn ensure_no_work_orders(
    txn: &DatabaseTransaction,
    what: &str,
    site_ids: Vec<Uuid>,
) -> AppResult<()> {
    if site_ids.is_empty() {
        return Ok(());
    }
    let blocking = work_order::Entity::find()
        .filter(work_order::Column::SiteId.is_in(site_ids))
        .order_by_asc(work_order::Column::Number)
        .one(txn)
        .await?;
    match blocking {
        Some(order) => Err(AppError::InvalidInput(format!(
            "This {} cannot be deleted while work order {} still references it",
            what, order.number
        ))),
        None => Ok(()),
    }
}

fn not_found_unless_deleted(what: &str, rows_affected: u64) -> AppResult<()> {
    if rows_affected == 0 {
        return Err(AppError::NotFound(what.to_string()));
    }
    Ok(())
}

impl DbPool {
    // ------------------------------------------------------------------
    // Clients
    // ------------------------------------------------------------------

    pub async fn list_clients(&self) -> AppResult<Vec<client::Model>> {
        Ok(client::Entity::find()
            .order_by_asc(client::Column::Name)
            .all(self.connection())
            .await?)
    }

    pub async fn get_client(&self, id: Uuid) -> AppResult<client::Model> {
        client::Entity::find_by_id(id)
            .one(self.connection())
            .await?
            .ok_or_else(|| AppError::NotFound("Client".to_string()))
    }

    pub async fn insert_client(&self, form: ClientForm) -> AppResult<client::Model> {
        let now = Utc::now();
        let model = client::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(form.name.trim().to_string()),
            contact_name: Set(non_empty(form.contact_name)),
            phone: Set(non_empty(form.phone)),
            email: Set(non_empty(form.email)),
            created_at: Set(now),
            updated_at: Set(now),
        };
        Ok(model.insert(self.connection()).await?)
    }

    pub async fn update_client(&self, id: Uuid, form: ClientForm) -> AppResult<client::Model> {
        let mut active: client::ActiveModel = self.get_client(id).await?.into();
        active.name = Set(form.name.trim().to_string());
        active.contact_name = Set(non_empty(form.contact_name));
        active.phone = Set(non_empty(form.phone));
        active.email = Set(non_empty(form.email));
        active.updated_at = Set(Utc::now());
        Ok(active.update(self.connection()).await?)
    }

    pub async fn delete_client(&self, id: Uuid) -> AppResult<()> {
        let txn = self.connection().begin().await?;

        let site_ids: Vec<Uuid> = site::Entity::find()
            .filter(site::Column::ClientId.eq(id))
            .all(&txn)
            .await?
            .into_iter()
            .map(|s| s.id)
            .collect();
        ensure_no_work_orders(&txn, "client", site_ids).await?;

        let result = client::Entity::delete_by_id(id)
            .exec(&txn)
            .await
            .map_err(|e| delete_error("client", e))?;
        not_found_unless_deleted("Client", result.rows_affected)?;
        txn.commit().await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Sites
    // ------------------------------------------------------------------

    /// Sites, optionally limited to one client.
    pub async fn list_sites(&self, client_id: Option<Uuid>) -> AppResult<Vec<site::Model>> {
        let mut query = site::Entity::find().order_by_asc(site::Column::Name);
        if let Some(client_id) = client_id {
            query = query.filter(site::Column::ClientId.eq(client_id));
        }
        Ok(query.all(self.connection()).await?)
    }

    pub async fn get_site(&self, id: Uuid) -> AppResult<site::Model> {
        site::Entity::find_by_id(id)
            .one(self.connection())
            .await?
            .ok_or_else(|| AppError::NotFound("Site".to_string()))
    }

    pub async fn insert_site(&self, client_id: Uuid, form: SiteForm) -> AppResult<site::Model> {
        // Surface a missing parent as 404 rather than a constraint error
        self.get_client(client_id).await?;

        let now = Utc::now();
        let model = site::ActiveModel {
            id: Set(Uuid::new_v4()),
            client_id: Set(client_id),
            name: Set(form.name.trim().to_string()),
            address: Set(non_empty(form.address)),
            created_at: Set(now),
            updated_at: Set(now),
        };
        Ok(model.insert(self.connection()).await?)
    }

    pub async fn update_site(&self, id: Uuid, form: SiteForm) -> AppResult<site::Model> {
        let mut active: site::ActiveModel = self.get_site(id).await?.into();
        active.name = Set(form.name.trim().to_string());
        active.address = Set(non_empty(form.address));
        active.updated_at = Set(Utc::now());
        Ok(active.update(self.connection()).await?)
    }

    pub async fn delete_site(&self, id: Uuid) -> AppResult<()> {
        let txn = self.connection().begin().await?;
        ensure_no_work_orders(&txn, "site", vec![id]).await?;

        let result = site::Entity::delete_by_id(id)
            .exec(&txn)
            .await
            .map_err(|e| delete_error("site", e))?;
        not_found_unless_deleted("Site", result.rows_affected)?;
        txn.commit().await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Buildings
    // ------------------------------------------------------------------

    pub async fn list_buildings(&self, site_id: Uuid) -> AppResult<Vec<building::Model>> {
        Ok(building::Entity::find()
            .filter(building::Column::SiteId.eq(site_id))
            .order_by_asc(building::Column::Name)
            .all(self.connection())
            .await?)
    }

    pub async fn get_building(&self, id: Uuid) -> AppResult<building::Model> {
        building::Entity::find_by_id(id)
            .one(self.connection())
            .await?
            .ok_or_else(|| AppError::NotFound("Building".to_string()))
    }

    pub async fn insert_building(
        &self,
        site_id: Uuid,
        form: NamedLocationForm,
    ) -> AppResult<building::Model> {
        self.get_site(site_id).await?;
        let model = building::ActiveModel {
            id: Set(Uuid::new_v4()),
            site_id: Set(site_id),
            name: Set(form.name.trim().to_string()),
            created_at: Set(Utc::now()),
        };
        Ok(model.insert(self.connection()).await?)
    }

    pub async fn rename_building(&self, id: Uuid, name: &str) -> AppResult<building::Model> {
        let mut active: building::ActiveModel = self.get_building(id).await?.into();
        active.name = Set(name.trim().to_string());
        Ok(active.update(self.connection()).await?)
    }

    pub async fn delete_building(&self, id: Uuid) -> AppResult<()> {
        let result = building::Entity::delete_by_id(id)
            .exec(self.connection())
            .await
            .map_err(|e| delete_error("building", e))?;
        not_found_unless_deleted("Building", result.rows_affected)
    }

    // ------------------------------------------------------------------
    // Floors
    // ------------------------------------------------------------------

    pub async fn list_floors(&self, building_id: Uuid) -> AppResult<Vec<floor::Model>> {
        Ok(floor::Entity::find()
            .filter(floor::Column::BuildingId.eq(building_id))
            .order_by_asc(floor::Column::Name)
            .all(self.connection())
            .await?)
    }

    pub async fn get_floor(&self, id: Uuid) -> AppResult<floor::Model> {
        floor::Entity::find_by_id(id)
            .one(self.connection())
            .await?
            .ok_or_else(|| AppError::NotFound("Floor".to_string()))
    }

    pub async fn insert_floor(
        &self,
        building_id: Uuid,
        form: NamedLocationForm,
    ) -> AppResult<floor::Model> {
        self.get_building(building_id).await?;
        let model = floor::ActiveModel {
            id: Set(Uuid::new_v4()),
            building_id: Set(building_id),
            name: Set(form.name.trim().to_string()),
            created_at: Set(Utc::now()),
        };
        Ok(model.insert(self.connection()).await?)
    }

    pub async fn rename_floor(&self, id: Uuid, name: &str) -> AppResult<floor::Model> {
        let mut active: floor::ActiveModel = self.get_floor(id).await?.into();
        active.name = Set(name.trim().to_string());
        Ok(active.update(self.connection()).await?)
    }

    pub async fn delete_floor(&self, id: Uuid) -> AppResult<()> {
        let result = floor::Entity::delete_by_id(id)
            .exec(self.connection())
            .await
            .map_err(|e| delete_error("floor", e))?;
        not_found_unless_deleted("Floor", result.rows_affected)
    }

    // ------------------------------------------------------------------
    // Rooms
    // ------------------------------------------------------------------

    pub async fn list_rooms(&self, floor_id: Uuid) -> AppResult<Vec<room::Model>> {
        Ok(room::Entity::find()
            .filter(room::Column::FloorId.eq(floor_id))
            .order_by_asc(room::Column::Name)
            .all(self.connection())
            .await?)
    }

    pub async fn get_room(&self, id: Uuid) -> AppResult<room::Model> {
        room::Entity::find_by_id(id)
            .one(self.connection())
            .await?
            .ok_or_else(|| AppError::NotFound("Room".to_string()))
    }

    pub async fn insert_room(&self, floor_id: Uuid, form: NamedLocationForm) -> AppResult<room::Model> {
        self.get_floor(floor_id).await?;
        let model = room::ActiveModel {
            id: Set(Uuid::new_v4()),
            floor_id: Set(floor_id),
            name: Set(form.name.trim().to_string()),
            created_at: Set(Utc::now()),
        };
        Ok(model.insert(self.connection()).await?)
    }

    pub async fn rename_room(&self, id: Uuid, name: &str) -> AppResult<room::Model> {
        let mut active: room::ActiveModel = self.get_room(id).await?.into();
        active.name = Set(name.trim().to_string());
        Ok(active.update(self.connection()).await?)
    }

    pub async fn delete_room(&self, id: Uuid) -> AppResult<()> {
        let result = room::Entity::delete_by_id(id)
            .exec(self.connection())
            .await
            .map_err(|e| delete_error("room", e))?;
        not_found_unless_deleted("Room", result.rows_affected)
    }

    // ------------------------------------------------------------------
    // Assets
    // ------------------------------------------------------------------

    pub async fn list_assets(&self, room_id: Uuid) -> AppResult<Vec<asset::Model>> {
        Ok(asset::Entity::find()
            .filter(asset::Column::RoomId.eq(room_id))
            .order_by_asc(asset::Column::Name)
            .all(self.connection())
            .await?)
    }

    /// Every asset located anywhere under `site_id`.
    pub async fn list_assets_for_site(&self, site_id: Uuid) -> AppResult<Vec<asset::Model>> {
        Ok(asset::Entity::find()
            .join(JoinType::InnerJoin, asset::Relation::Room.def())
            .join(JoinType::InnerJoin, room::Relation::Floor.def())
            .join(JoinType::InnerJoin, floor::Relation::Building.def())
            .filter(building::Column::SiteId.eq(site_id))
            .order_by_asc(asset::Column::Name)
            .all(self.connection())
            .await?)
    }

    pub async fn get_asset(&self, id: Uuid) -> AppResult<asset::Model> {
        asset::Entity::find_by_id(id)
            .one(self.connection())
            .await?
            .ok_or_else(|| AppError::NotFound("Asset".to_string()))
    }

    pub async fn find_asset_by_qr(&self, code: &str) -> AppResult<Option<asset::Model>> {
        Ok(asset::Entity::find()
            .filter(asset::Column::QrCode.eq(code.trim()))
            .one(self.connection())
            .await?)
    }

    pub async fn insert_asset(&self, room_id: Uuid, form: AssetForm) -> AppResult<asset::Model> {
        self.get_room(room_id).await?;
        let capacity = form.capacity().map_err(AppError::InvalidInput)?;
        let now = Utc::now();
        let model = asset::ActiveModel {
            id: Set(Uuid::new_v4()),
            room_id: Set(room_id),
            name: Set(form.name.trim().to_string()),
            brand: Set(non_empty(form.brand)),
            model_number: Set(non_empty(form.model_number)),
            serial_number: Set(non_empty(form.serial_number)),
            capacity_btu: Set(capacity),
            qr_code: Set(form.qr_code.trim().to_string()),
            notes: Set(non_empty(form.notes)),
            created_at: Set(now),
            updated_at: Set(now),
        };
        Ok(model.insert(self.connection()).await?)
    }

    pub async fn update_asset(&self, id: Uuid, form: AssetForm) -> AppResult<asset::Model> {
        let capacity = form.capacity().map_err(AppError::InvalidInput)?;
        let mut active: asset::ActiveModel = self.get_asset(id).await?.into();
        active.name = Set(form.name.trim().to_string());
        active.brand = Set(non_empty(form.brand));
        active.model_number = Set(non_empty(form.model_number));
        active.serial_number = Set(non_empty(form.serial_number));
        active.capacity_btu = Set(capacity);
        active.qr_code = Set(form.qr_code.trim().to_string());
        active.notes = Set(non_empty(form.notes));
        active.updated_at = Set(Utc::now());
        Ok(active.update(self.connection()).await?)
    }

    pub async fn delete_asset(&self, id: Uuid) -> AppResult<()> {
        let result = asset::Entity::delete_by_id(id)
            .exec(self.connection())
            .await
            .map_err(|e| delete_error("unit", e))?;
        not_found_unless_deleted("Asset", result.rows_affected)
    }

    /// Asset plus its room, floor, building, site and client names.
    pub async fn get_asset_with_location(&self, id: Uuid) -> AppResult<AssetWithLocation> {
        let asset = self.get_asset(id).await?;
        let room = self.get_room(asset.room_id).await?;
        let floor = self.get_floor(room.floor_id).await?;
        let building = self.get_building(floor.building_id).await?;
        let site = self.get_site(building.site_id).await?;
        let client = self.get_client(site.client_id).await?;

        Ok(AssetWithLocation {
            asset,
            location: AssetLocation {
                client_id: client.id,
                client_name: client.name,
                site_id: site.id,
                site_name: site.name,
                building_name: building.name,
                floor_name: floor.name,
                room_name: room.name,
            },
        })
    }

    /// Site that contains `asset_id`.
    pub async fn site_id_for_asset(&self, asset_id: Uuid) -> AppResult<Uuid> {
        let site_id: Option<Uuid> = asset::Entity::find_by_id(asset_id)
            .select_only()
            .column(building::Column::SiteId)
            .join(JoinType::InnerJoin, asset::Relation::Room.def())
            .join(JoinType::InnerJoin, room::Relation::Floor.def())
            .join(JoinType::InnerJoin, floor::Relation::Building.def())
            .into_tuple()
            .one(self.connection())
            .await?;

        site_id.ok_or_else(|| AppError::NotFound("Asset".to_string()))
    }
}
