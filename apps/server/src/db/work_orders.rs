//! Database queries for work orders.

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, SqlErr, TransactionTrait,
};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::entity::{asset, job_item, job_photo, site, user, work_order};
use crate::error::{AppError, AppResult};
use crate::models::work_order::WorkOrderRow;
use crate::models::{JobItemStatus, JobType, WorkOrderProgress, WorkOrderStatus};
use crate::services::numbering;

use super::DbPool;

/// Input for creating a work order with its job items.
#[derive(Debug, Clone)]
pub struct NewWorkOrder {
    pub site_id: Uuid,
    pub job_type: JobType,
    pub scheduled_date: NaiveDate,
    pub assigned_team: Option<String>,
    /// Empty means every asset of the site
    pub asset_ids: Vec<Uuid>,
    pub created_by: Uuid,
}

/// Filters for listing work orders.
#[derive(Debug, Clone, Default)]
pub struct WorkOrderListQuery {
    pub status: Option<WorkOrderStatus>,
    pub job_type: Option<JobType>,
    pub site_id: Option<Uuid>,
    /// Restrict to these sites (client scoping)
    pub site_ids: Option<Vec<Uuid>>,
    pub scheduled_on: Option<NaiveDate>,
    pub offset: u64,
    pub limit: Option<u64>,
}

/// Job item line on the work order page.
#[derive(Debug, Clone, Serialize)]
pub struct JobItemLine {
    pub item: job_item::Model,
    pub status: JobItemStatus,
    pub asset_name: String,
    pub asset_qr_code: String,
    pub technician_name: Option<String>,
}

/// Work order with site, items and progress.
#[derive(Debug, Clone, Serialize)]
pub struct WorkOrderDetail {
    pub work_order: work_order::Model,
    pub job_type: JobType,
    pub status: WorkOrderStatus,
    pub site: site::Model,
    pub items: Vec<JobItemLine>,
    pub progress: WorkOrderProgress,
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

fn parse_job_type(raw: &str) -> JobType {
    JobType::parse(raw).unwrap_or(JobType::Pm)
}

fn parse_status(raw: &str) -> WorkOrderStatus {
    WorkOrderStatus::parse(raw).unwrap_or(WorkOrderStatus::Open)
}

impl DbPool {
    /// Create a numbered work order and one job item per asset.
    ///
    /// Numbering and inserts share one transaction. If a concurrent request
    /// claims the same number first, the unique index rejects the insert and
    /// the whole transaction is retried with a fresh scan.
    pub async fn create_work_order(
        &self,
        number_base: &str,
        new: NewWorkOrder,
    ) -> AppResult<work_order::Model> {
        let site_assets = self.list_assets_for_site(new.site_id).await?;
        let asset_ids: Vec<Uuid> = if new.asset_ids.is_empty() {
            site_assets.iter().map(|a| a.id).collect()
        } else {
            if let Some(stray) = new
                .asset_ids
                .iter()
                .find(|id| !site_assets.iter().any(|a| a.id == **id))
            {
                return Err(AppError::InvalidInput(format!(
                    "Unit {} does not belong to the selected site",
                    stray
                )));
            }
            new.asset_ids.clone()
        };
        if asset_ids.is_empty() {
            return Err(AppError::InvalidInput(
                "The selected site has no units to service".to_string(),
            ));
        }

        let prefix = numbering::prefix_for(number_base, new.scheduled_date);
        let mut attempt = 1;
        loop {
            match self.try_create_work_order(&prefix, &new, &asset_ids).await {
                Ok(created) => {
                    info!(
                        number = %created.number,
                        items = asset_ids.len(),
                        "Work order created"
                    );
                    return Ok(created);
                }
                Err(e) if is_unique_violation(&e) && attempt < numbering::MAX_ATTEMPTS => {
                    warn!(attempt, "Work order number taken concurrently, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn try_create_work_order(
        &self,
        prefix: &str,
        new: &NewWorkOrder,
        asset_ids: &[Uuid],
    ) -> Result<work_order::Model, DbErr> {
        let txn = self.connection().begin().await?;

        let existing: Vec<String> = work_order::Entity::find()
            .select_only()
            .column(work_order::Column::Number)
            .filter(work_order::Column::Number.starts_with(prefix))
            .into_tuple()
            .all(&txn)
            .await?;
        let number = numbering::next_number(prefix, existing.iter().map(String::as_str));

        let now = Utc::now();
        let work_order_id = Uuid::new_v4();
        let created = work_order::ActiveModel {
            id: Set(work_order_id),
            number: Set(number),
            job_type: Set(new.job_type.as_str().to_string()),
            scheduled_date: Set(new.scheduled_date),
            status: Set(WorkOrderStatus::Open.as_str().to_string()),
            site_id: Set(new.site_id),
            assigned_team: Set(new.assigned_team.clone()),
            approval_token_hash: Set(None),
            approved_at: Set(None),
            approved_by: Set(None),
            created_by: Set(Some(new.created_by)),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let items = asset_ids.iter().map(|asset_id| job_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            work_order_id: Set(work_order_id),
            asset_id: Set(*asset_id),
            technician_id: Set(None),
            status: Set(JobItemStatus::Pending.as_str().to_string()),
            start_time: Set(None),
            end_time: Set(None),
            tech_note: Set(None),
            checklist: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        });
        job_item::Entity::insert_many(items).exec(&txn).await?;

        txn.commit().await?;
        Ok(created)
    }

    pub async fn get_work_order(&self, id: Uuid) -> AppResult<work_order::Model> {
        work_order::Entity::find_by_id(id)
            .one(self.connection())
            .await?
            .ok_or_else(|| AppError::NotFound("Work order".to_string()))
    }

    pub async fn update_work_order(
        &self,
        id: Uuid,
        job_type: JobType,
        scheduled_date: NaiveDate,
        assigned_team: Option<String>,
    ) -> AppResult<work_order::Model> {
        let mut active: work_order::ActiveModel = self.get_work_order(id).await?.into();
        active.job_type = Set(job_type.as_str().to_string());
        active.scheduled_date = Set(scheduled_date);
        active.assigned_team = Set(assigned_team);
        active.updated_at = Set(Utc::now());
        Ok(active.update(self.connection()).await?)
    }

    /// Manual status change. Job item progress never calls this.
    pub async fn set_work_order_status(
        &self,
        id: Uuid,
        status: WorkOrderStatus,
    ) -> AppResult<work_order::Model> {
        let mut active: work_order::ActiveModel = self.get_work_order(id).await?.into();
        active.status = Set(status.as_str().to_string());
        active.updated_at = Set(Utc::now());
        Ok(active.update(self.connection()).await?)
    }

    /// Attach another asset of the same site as a PENDING job item.
    pub async fn add_job_item(&self, work_order_id: Uuid, asset_id: Uuid) -> AppResult<job_item::Model> {
        let order = self.get_work_order(work_order_id).await?;
        if self.site_id_for_asset(asset_id).await? != order.site_id {
            return Err(AppError::InvalidInput(
                "The unit does not belong to this work order's site".to_string(),
            ));
        }

        let now = Utc::now();
        job_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            work_order_id: Set(work_order_id),
            asset_id: Set(asset_id),
            technician_id: Set(None),
            status: Set(JobItemStatus::Pending.as_str().to_string()),
            start_time: Set(None),
            end_time: Set(None),
            tech_note: Set(None),
            checklist: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.connection())
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::InvalidInput("This unit is already part of the work order".to_string())
            } else {
                AppError::from(e)
            }
        })
    }

    /// Delete a work order with its job items and photo rows.
    ///
    /// Rejected when any job item is DONE. Job items are locked for the
    /// duration so no item can become DONE mid-delete. Returns the storage
    /// keys of the removed photos.
    pub async fn delete_work_order(&self, id: Uuid) -> AppResult<Vec<String>> {
        let txn = self.connection().begin().await?;

        work_order::Entity::find_by_id(id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("Work order".to_string()))?;

        let items = job_item::Entity::find()
            .filter(job_item::Column::WorkOrderId.eq(id))
            .lock_exclusive()
            .all(&txn)
            .await?;

        if items
            .iter()
            .any(|item| item.status == JobItemStatus::Done.as_str())
        {
            return Err(AppError::InvalidInput(
                "Work orders with completed jobs cannot be deleted".to_string(),
            ));
        }

        let item_ids: Vec<Uuid> = items.iter().map(|item| item.id).collect();
        let photo_keys: Vec<String> = if item_ids.is_empty() {
            Vec::new()
        } else {
            let keys = job_photo::Entity::find()
                .select_only()
                .column(job_photo::Column::S3Key)
                .filter(job_photo::Column::JobItemId.is_in(item_ids.clone()))
                .into_tuple()
                .all(&txn)
                .await?;
            job_photo::Entity::delete_many()
                .filter(job_photo::Column::JobItemId.is_in(item_ids.clone()))
                .exec(&txn)
                .await?;
            job_item::Entity::delete_many()
                .filter(job_item::Column::Id.is_in(item_ids))
                .exec(&txn)
                .await?;
            keys
        };

        work_order::Entity::delete_by_id(id).exec(&txn).await?;
        txn.commit().await?;

        info!(work_order_id = %id, photos = photo_keys.len(), "Work order deleted");
        Ok(photo_keys)
    }

    /// Completion roll-up for one work order.
    pub async fn work_order_progress(&self, id: Uuid) -> AppResult<WorkOrderProgress> {
        let statuses: Vec<String> = job_item::Entity::find()
            .select_only()
            .column(job_item::Column::Status)
            .filter(job_item::Column::WorkOrderId.eq(id))
            .into_tuple()
            .all(self.connection())
            .await?;

        let parsed: Vec<JobItemStatus> = statuses
            .iter()
            .filter_map(|s| JobItemStatus::parse(s))
            .collect();
        Ok(WorkOrderProgress::from_statuses(&parsed))
    }

    /// Completion roll-up for many work orders at once.
    async fn progress_by_work_order(
        &self,
        ids: &[Uuid],
    ) -> AppResult<HashMap<Uuid, WorkOrderProgress>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows: Vec<(Uuid, String)> = job_item::Entity::find()
            .select_only()
            .column(job_item::Column::WorkOrderId)
            .column(job_item::Column::Status)
            .filter(job_item::Column::WorkOrderId.is_in(ids.to_vec()))
            .into_tuple()
            .all(self.connection())
            .await?;

        let mut grouped: HashMap<Uuid, Vec<JobItemStatus>> = HashMap::new();
        for (work_order_id, status) in rows {
            if let Some(status) = JobItemStatus::parse(&status) {
                grouped.entry(work_order_id).or_default().push(status);
            }
        }
        Ok(ids
            .iter()
            .map(|id| {
                let statuses = grouped.get(id).map(Vec::as_slice).unwrap_or(&[]);
                (*id, WorkOrderProgress::from_statuses(statuses))
            })
            .collect())
    }

    /// Filtered, newest-first list with progress and site names.
    pub async fn list_work_orders(
        &self,
        query: &WorkOrderListQuery,
    ) -> AppResult<(Vec<WorkOrderRow>, u64)> {
        let mut select = work_order::Entity::find();
        if let Some(status) = query.status {
            select = select.filter(work_order::Column::Status.eq(status.as_str()));
        }
        if let Some(job_type) = query.job_type {
            select = select.filter(work_order::Column::JobType.eq(job_type.as_str()));
        }
        if let Some(site_id) = query.site_id {
            select = select.filter(work_order::Column::SiteId.eq(site_id));
        }
        if let Some(ref site_ids) = query.site_ids {
            select = select.filter(work_order::Column::SiteId.is_in(site_ids.clone()));
        }
        if let Some(date) = query.scheduled_on {
            select = select.filter(work_order::Column::ScheduledDate.eq(date));
        }

        let total = select.clone().count(self.connection()).await?;

        let mut select = select
            .order_by_desc(work_order::Column::ScheduledDate)
            .order_by_desc(work_order::Column::Number)
            .offset(query.offset);
        if let Some(limit) = query.limit {
            select = select.limit(limit);
        }
        let orders = select.all(self.connection()).await?;

        let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
        let progress = self.progress_by_work_order(&ids).await?;

        let site_ids: Vec<Uuid> = orders.iter().map(|o| o.site_id).collect();
        let site_names: HashMap<Uuid, String> = if site_ids.is_empty() {
            HashMap::new()
        } else {
            site::Entity::find()
                .filter(site::Column::Id.is_in(site_ids))
                .all(self.connection())
                .await?
                .into_iter()
                .map(|s| (s.id, s.name))
                .collect()
        };

        let rows = orders
            .into_iter()
            .map(|o| WorkOrderRow {
                id: o.id,
                job_type: parse_job_type(&o.job_type),
                status: parse_status(&o.status),
                site_name: site_names.get(&o.site_id).cloned().unwrap_or_default(),
                progress: progress
                    .get(&o.id)
                    .copied()
                    .unwrap_or(WorkOrderProgress { done: 0, total: 0 }),
                number: o.number,
                scheduled_date: o.scheduled_date,
                site_id: o.site_id,
                assigned_team: o.assigned_team,
                approved_at: o.approved_at,
            })
            .collect();

        Ok((rows, total))
    }

    /// Work order page data.
    pub async fn get_work_order_detail(&self, id: Uuid) -> AppResult<WorkOrderDetail> {
        let order = self.get_work_order(id).await?;
        let site = self.get_site(order.site_id).await?;

        let items = job_item::Entity::find()
            .filter(job_item::Column::WorkOrderId.eq(id))
            .find_also_related(asset::Entity)
            .order_by_asc(job_item::Column::CreatedAt)
            .all(self.connection())
            .await?;

        let technician_ids: Vec<Uuid> = items.iter().filter_map(|(i, _)| i.technician_id).collect();
        let technicians: HashMap<Uuid, String> = if technician_ids.is_empty() {
            HashMap::new()
        } else {
            user::Entity::find()
                .filter(user::Column::Id.is_in(technician_ids))
                .all(self.connection())
                .await?
                .into_iter()
                .map(|u| (u.id, u.display_name))
                .collect()
        };

        let lines: Vec<JobItemLine> = items
            .into_iter()
            .map(|(item, asset)| JobItemLine {
                status: JobItemStatus::parse(&item.status).unwrap_or(JobItemStatus::Pending),
                asset_name: asset.as_ref().map(|a| a.name.clone()).unwrap_or_default(),
                asset_qr_code: asset.map(|a| a.qr_code).unwrap_or_default(),
                technician_name: item.technician_id.and_then(|t| technicians.get(&t).cloned()),
                item,
            })
            .collect();

        let statuses: Vec<JobItemStatus> = lines.iter().map(|l| l.status).collect();
        Ok(WorkOrderDetail {
            job_type: parse_job_type(&order.job_type),
            status: parse_status(&order.status),
            progress: WorkOrderProgress::from_statuses(&statuses),
            work_order: order,
            site,
            items: lines,
        })
    }

    /// Store the digest of a new sign-off token, replacing any earlier one.
    pub async fn set_approval_token(&self, id: Uuid, token_hash: String) -> AppResult<()> {
        let mut active: work_order::ActiveModel = self.get_work_order(id).await?.into();
        active.approval_token_hash = Set(Some(token_hash));
        active.updated_at = Set(Utc::now());
        active.update(self.connection()).await?;
        Ok(())
    }

    pub async fn find_work_order_by_approval(
        &self,
        token_hash: &str,
    ) -> AppResult<work_order::Model> {
        work_order::Entity::find()
            .filter(work_order::Column::ApprovalTokenHash.eq(token_hash))
            .one(self.connection())
            .await?
            .ok_or_else(|| AppError::NotFound("Approval link".to_string()))
    }

    /// Stamp the client sign-off once; later confirmations are rejected.
    pub async fn approve_work_order(&self, id: Uuid, approved_by: Uuid) -> AppResult<()> {
        let now = Utc::now();
        let result = work_order::Entity::update_many()
            .col_expr(
                work_order::Column::ApprovedAt,
                sea_orm::sea_query::Expr::value(now),
            )
            .col_expr(
                work_order::Column::ApprovedBy,
                sea_orm::sea_query::Expr::value(approved_by),
            )
            .filter(work_order::Column::Id.eq(id))
            .filter(work_order::Column::ApprovedAt.is_null())
            .exec(self.connection())
            .await?;

        if result.rows_affected == 0 {
            return Err(AppError::InvalidInput(
                "This work order has already been approved".to_string(),
            ));
        }
        Ok(())
    }

    /// Work order counts per status, for the admin dashboard.
    pub async fn count_work_orders_by_status(&self) -> AppResult<Vec<(WorkOrderStatus, u64)>> {
        let mut counts = Vec::with_capacity(WorkOrderStatus::ALL.len());
        for status in WorkOrderStatus::ALL {
            let count = work_order::Entity::find()
                .filter(work_order::Column::Status.eq(status.as_str()))
                .count(self.connection())
                .await?;
            counts.push((status, count));
        }
        Ok(counts)
    }
}
