//! Database queries for job items and their photos.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseTransaction, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::Serialize;
use uuid::Uuid;

use crate::entity::{asset, job_item, job_photo, work_order};
use crate::error::{AppError, AppResult};
use crate::models::{
    JobItemStatus, PhotoEvidence, PhotoType, User, WorkOrderProgress, WorkOrderStatus,
};
use crate::services::job_lifecycle::{self, Actor, JobItemSnapshot, TransitionPlan};

use super::{AssetWithLocation, DbPool};

/// Job page data.
#[derive(Debug, Clone, Serialize)]
pub struct JobItemDetail {
    pub item: job_item::Model,
    pub status: JobItemStatus,
    pub work_order: work_order::Model,
    pub asset: AssetWithLocation,
    pub technician: Option<User>,
    pub photos: Vec<job_photo::Model>,
}

/// Photo row to insert after the object is stored.
#[derive(Debug, Clone)]
pub struct NewPhoto {
    pub id: Uuid,
    pub job_item_id: Uuid,
    pub photo_type: PhotoType,
    pub s3_key: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub uploaded_by: Uuid,
}

/// Row of the technician dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct TechnicianTask {
    pub job_item_id: Uuid,
    pub status: JobItemStatus,
    pub assigned_to_me: bool,
    pub asset_name: String,
    pub work_order_id: Uuid,
    pub work_order_number: String,
    pub scheduled_date: NaiveDate,
}

/// An accepted status change as written.
#[derive(Debug, Clone)]
pub struct AppliedTransition {
    pub plan: TransitionPlan,
    pub item: job_item::Model,
    /// Set when this change made the last job of the work order DONE
    pub completed_order: Option<WorkOrderProgress>,
}

/// Stored status of a job item; an unknown value is a data error.
pub fn job_item_status(item: &job_item::Model) -> AppResult<JobItemStatus> {
    JobItemStatus::parse(&item.status).ok_or_else(|| {
        AppError::Database(format!("Unknown job item status '{}'", item.status))
    })
}

fn snapshot(item: &job_item::Model) -> AppResult<JobItemSnapshot> {
    Ok(JobItemSnapshot {
        status: job_item_status(item)?,
        technician_id: item.technician_id,
        start_time: item.start_time,
    })
}

async fn lock_job_item(txn: &DatabaseTransaction, id: Uuid) -> AppResult<job_item::Model> {
    job_item::Entity::find_by_id(id)
        .lock_exclusive()
        .one(txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Job".to_string()))
}

async fn lock_work_order(txn: &DatabaseTransaction, id: Uuid) -> AppResult<work_order::Model> {
    work_order::Entity::find_by_id(id)
        .lock_exclusive()
        .one(txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Work order".to_string()))
}

async fn progress_in(txn: &DatabaseTransaction, work_order_id: Uuid) -> AppResult<WorkOrderProgress> {
    let statuses: Vec<String> = job_item::Entity::find()
        .select_only()
        .column(job_item::Column::Status)
        .filter(job_item::Column::WorkOrderId.eq(work_order_id))
        .into_tuple()
        .all(txn)
        .await?;
    let parsed: Vec<JobItemStatus> = statuses
        .iter()
        .filter_map(|s| JobItemStatus::parse(s))
        .collect();
    Ok(WorkOrderProgress::from_statuses(&parsed))
}

async fn photo_evidence(txn: &DatabaseTransaction, job_item_id: Uuid) -> AppResult<PhotoEvidence> {
    let types: Vec<String> = job_photo::Entity::find()
        .select_only()
        .column(job_photo::Column::PhotoType)
        .filter(job_photo::Column::JobItemId.eq(job_item_id))
        .into_tuple()
        .all(txn)
        .await?;
    let parsed: Vec<PhotoType> = types.iter().filter_map(|t| PhotoType::parse(t)).collect();
    Ok(PhotoEvidence::from_types(&parsed))
}

impl DbPool {
    pub async fn get_job_item(&self, id: Uuid) -> AppResult<job_item::Model> {
        job_item::Entity::find_by_id(id)
            .one(self.connection())
            .await?
            .ok_or_else(|| AppError::NotFound("Job".to_string()))
    }

    pub async fn get_job_item_detail(&self, id: Uuid) -> AppResult<JobItemDetail> {
        let item = self.get_job_item(id).await?;
        let work_order = self.get_work_order(item.work_order_id).await?;
        let asset = self.get_asset_with_location(item.asset_id).await?;
        let technician = match item.technician_id {
            Some(tech) => self.get_user(tech).await?,
            None => None,
        };
        let photos = job_photo::Entity::find()
            .filter(job_photo::Column::JobItemId.eq(id))
            .order_by_asc(job_photo::Column::CreatedAt)
            .all(self.connection())
            .await?;

        Ok(JobItemDetail {
            status: snapshot(&item)?.status,
            item,
            work_order,
            asset,
            technician,
            photos,
        })
    }

    /// Apply a status change under row locks.
    ///
    /// The work order row is locked before the job item (the same order
    /// `delete_work_order` uses), so completions of one work order are
    /// serialized and exactly one of them sees the order finish. Photo
    /// evidence is read inside the transaction, so a photo deleted
    /// concurrently cannot slip past the DONE check.
    pub async fn transition_job_item(
        &self,
        id: Uuid,
        actor: &Actor,
        target: JobItemStatus,
        now: DateTime<Utc>,
    ) -> AppResult<AppliedTransition> {
        let work_order_id = self.get_job_item(id).await?.work_order_id;

        let txn = self.connection().begin().await?;
        lock_work_order(&txn, work_order_id).await?;
        let item = lock_job_item(&txn, id).await?;
        let evidence = photo_evidence(&txn, id).await?;
        let plan = job_lifecycle::plan_transition(actor, &snapshot(&item)?, target, &evidence, now)?;

        let mut active: job_item::ActiveModel = item.into();
        active.status = Set(plan.to.as_str().to_string());
        if let Some(technician) = plan.assign_technician {
            active.technician_id = Set(Some(technician));
        }
        active.start_time = Set(plan.start_time);
        if plan.end_time.is_some() {
            active.end_time = Set(plan.end_time);
        }
        active.updated_at = Set(now);
        let updated = active.update(&txn).await?;

        let completed_order = if plan.to == JobItemStatus::Done {
            Some(progress_in(&txn, work_order_id).await?).filter(|p| p.is_fully_complete())
        } else {
            None
        };

        txn.commit().await?;
        Ok(AppliedTransition {
            plan,
            item: updated,
            completed_order,
        })
    }

    /// Assign a technician; DONE items keep their assignee.
    pub async fn assign_technician(&self, id: Uuid, technician_id: Uuid) -> AppResult<job_item::Model> {
        let item = self.get_job_item(id).await?;
        if snapshot(&item)?.status == JobItemStatus::Done {
            return Err(AppError::InvalidInput(
                "A DONE job cannot be reassigned".to_string(),
            ));
        }

        let mut active: job_item::ActiveModel = item.into();
        active.technician_id = Set(Some(technician_id));
        active.updated_at = Set(Utc::now());
        Ok(active.update(self.connection()).await?)
    }

    pub async fn update_tech_note(&self, id: Uuid, note: Option<String>) -> AppResult<()> {
        let mut active: job_item::ActiveModel = self.get_job_item(id).await?.into();
        active.tech_note = Set(note);
        active.updated_at = Set(Utc::now());
        active.update(self.connection()).await?;
        Ok(())
    }

    /// Overwrite the checklist document.
    pub async fn save_checklist(&self, id: Uuid, document: serde_json::Value) -> AppResult<()> {
        let mut active: job_item::ActiveModel = self.get_job_item(id).await?.into();
        active.checklist = Set(Some(document));
        active.updated_at = Set(Utc::now());
        active.update(self.connection()).await?;
        Ok(())
    }

    /// Record an uploaded photo.
    ///
    /// Ownership and the DONE check are repeated under the job item lock, so an
    /// upload racing a DONE transition is rejected.
    pub async fn insert_photo(&self, photo: NewPhoto, actor: &Actor) -> AppResult<job_photo::Model> {
        let txn = self.connection().begin().await?;
        let item = lock_job_item(&txn, photo.job_item_id).await?;
        let state = snapshot(&item)?;
        job_lifecycle::authorize_mutation(actor, state.technician_id)?;
        if !job_lifecycle::photos_are_mutable(state.status) {
            return Err(AppError::InvalidInput(
                "Photos of a DONE job cannot be changed".to_string(),
            ));
        }

        let model = job_photo::ActiveModel {
            id: Set(photo.id),
            job_item_id: Set(photo.job_item_id),
            photo_type: Set(photo.photo_type.as_str().to_string()),
            s3_key: Set(photo.s3_key),
            content_type: Set(photo.content_type),
            size_bytes: Set(photo.size_bytes),
            uploaded_by: Set(Some(photo.uploaded_by)),
            created_at: Set(Utc::now()),
        };
        let inserted = model.insert(&txn).await?;
        txn.commit().await?;
        Ok(inserted)
    }

    pub async fn get_photo(&self, id: Uuid) -> AppResult<job_photo::Model> {
        job_photo::Entity::find_by_id(id)
            .one(self.connection())
            .await?
            .ok_or_else(|| AppError::NotFound("Photo".to_string()))
    }

    /// Photo whose stored object lives at `key`.
    pub async fn find_photo_by_key(&self, key: &str) -> AppResult<Option<job_photo::Model>> {
        Ok(job_photo::Entity::find()
            .filter(job_photo::Column::S3Key.eq(key))
            .one(self.connection())
            .await?)
    }

    /// Delete a photo row unless its job item is DONE. Returns the storage key.
    pub async fn delete_photo(&self, photo_id: Uuid, actor: &Actor) -> AppResult<String> {
        let photo = self.get_photo(photo_id).await?;

        let txn = self.connection().begin().await?;
        let item = lock_job_item(&txn, photo.job_item_id).await?;
        let state = snapshot(&item)?;
        job_lifecycle::authorize_mutation(actor, state.technician_id)?;
        if !job_lifecycle::photos_are_mutable(state.status) {
            return Err(AppError::InvalidInput(
                "Photos of a DONE job cannot be deleted".to_string(),
            ));
        }

        job_photo::Entity::delete_by_id(photo_id).exec(&txn).await?;
        txn.commit().await?;
        Ok(photo.s3_key)
    }

    /// Open work for a technician: their unfinished items plus unassigned PENDING ones.
    pub async fn technician_tasks(&self, technician_id: Uuid) -> AppResult<Vec<TechnicianTask>> {
        let rows = job_item::Entity::find()
            .filter(
                Condition::any()
                    .add(
                        Condition::all()
                            .add(job_item::Column::TechnicianId.eq(technician_id))
                            .add(job_item::Column::Status.ne(JobItemStatus::Done.as_str())),
                    )
                    .add(
                        Condition::all()
                            .add(job_item::Column::TechnicianId.is_null())
                            .add(job_item::Column::Status.eq(JobItemStatus::Pending.as_str())),
                    ),
            )
            .find_also_related(work_order::Entity)
            .order_by_asc(job_item::Column::CreatedAt)
            .all(self.connection())
            .await?;

        let asset_ids: Vec<Uuid> = rows.iter().map(|(item, _)| item.asset_id).collect();
        let asset_names: std::collections::HashMap<Uuid, String> = if asset_ids.is_empty() {
            Default::default()
        } else {
            asset::Entity::find()
                .filter(asset::Column::Id.is_in(asset_ids))
                .all(self.connection())
                .await?
                .into_iter()
                .map(|a| (a.id, a.name))
                .collect()
        };

        let mut tasks: Vec<TechnicianTask> = rows
            .into_iter()
            .filter_map(|(item, order)| {
                let order = order?;
                // Cancelled orders drop off the board
                if order.status == WorkOrderStatus::Cancelled.as_str() {
                    return None;
                }
                Some(TechnicianTask {
                    job_item_id: item.id,
                    status: JobItemStatus::parse(&item.status)?,
                    assigned_to_me: item.technician_id == Some(technician_id),
                    asset_name: asset_names.get(&item.asset_id).cloned().unwrap_or_default(),
                    work_order_id: order.id,
                    work_order_number: order.number,
                    scheduled_date: order.scheduled_date,
                })
            })
            .collect();
        tasks.sort_by(|a, b| {
            b.assigned_to_me
                .cmp(&a.assigned_to_me)
                .then(a.scheduled_date.cmp(&b.scheduled_date))
        });
        Ok(tasks)
    }

    /// Job items not yet DONE in a work order.
    pub async fn unfinished_job_items(&self, work_order_id: Uuid) -> AppResult<u64> {
        let progress = self.work_order_progress(work_order_id).await?;
        Ok(progress.total - progress.done)
    }
}
