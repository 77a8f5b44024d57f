//! Database queries for checklist templates.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use uuid::Uuid;

use crate::entity::checklist_template::{self as template, ActiveModel, Entity as Template};
use crate::error::{AppError, AppResult};
use crate::models::{ChecklistTemplate, JobType};

use super::DbPool;

fn model_to_template(m: template::Model) -> ChecklistTemplate {
    ChecklistTemplate {
        id: m.id,
        job_type: JobType::parse(&m.job_type).unwrap_or(JobType::Pm),
        items: serde_json::from_value(m.items).unwrap_or_default(),
        name: m.name,
        created_at: m.created_at,
    }
}

impl DbPool {
    pub async fn list_checklist_templates(&self) -> AppResult<Vec<ChecklistTemplate>> {
        let templates = Template::find()
            .order_by_asc(template::Column::JobType)
            .order_by_asc(template::Column::Name)
            .all(self.connection())
            .await?;
        Ok(templates.into_iter().map(model_to_template).collect())
    }

    pub async fn get_checklist_template(&self, id: Uuid) -> AppResult<ChecklistTemplate> {
        Template::find_by_id(id)
            .one(self.connection())
            .await?
            .map(model_to_template)
            .ok_or_else(|| AppError::NotFound("Checklist template".to_string()))
    }

    /// First template (by name) for a job type, used to pre-fill empty checklists.
    pub async fn checklist_template_for(&self, job_type: JobType) -> AppResult<Option<ChecklistTemplate>> {
        Ok(Template::find()
            .filter(template::Column::JobType.eq(job_type.as_str()))
            .order_by_asc(template::Column::Name)
            .one(self.connection())
            .await?
            .map(model_to_template))
    }

    pub async fn insert_checklist_template(
        &self,
        name: &str,
        job_type: JobType,
        items: Vec<String>,
    ) -> AppResult<ChecklistTemplate> {
        let now = Utc::now();
        let model = ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.trim().to_string()),
            job_type: Set(job_type.as_str().to_string()),
            items: Set(serde_json::to_value(items)?),
            created_at: Set(now),
            updated_at: Set(now),
        };
        Ok(model_to_template(model.insert(self.connection()).await?))
    }

    pub async fn update_checklist_template(
        &self,
        id: Uuid,
        name: &str,
        job_type: JobType,
        items: Vec<String>,
    ) -> AppResult<ChecklistTemplate> {
        let existing = Template::find_by_id(id)
            .one(self.connection())
            .await?
            .ok_or_else(|| AppError::NotFound("Checklist template".to_string()))?;

        let mut active: ActiveModel = existing.into();
        active.name = Set(name.trim().to_string());
        active.job_type = Set(job_type.as_str().to_string());
        active.items = Set(serde_json::to_value(items)?);
        active.updated_at = Set(Utc::now());
        Ok(model_to_template(active.update(self.connection()).await?))
    }

    pub async fn delete_checklist_template(&self, id: Uuid) -> AppResult<()> {
        let result = Template::delete_by_id(id).exec(self.connection()).await?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound("Checklist template".to_string()));
        }
        Ok(())
    }
}
