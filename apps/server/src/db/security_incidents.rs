//! Database queries for security incidents.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, EntityTrait, PaginatorTrait, QueryOrder, QuerySelect, Set};
use tracing::warn;
use uuid::Uuid;

use crate::entity::security_incident::{self as incident, ActiveModel, Entity as Incident};
use crate::error::AppResult;
use crate::models::IncidentKind;

use super::DbPool;

impl DbPool {
    /// Record an incident. Failures are logged, never returned.
    pub async fn record_incident(
        &self,
        kind: IncidentKind,
        username: Option<&str>,
        ip_address: Option<&str>,
        path: Option<&str>,
        detail: &str,
    ) {
        let model = ActiveModel {
            id: Set(Uuid::new_v4()),
            kind: Set(kind.as_str().to_string()),
            username: Set(username.map(str::to_string)),
            ip_address: Set(ip_address.map(str::to_string)),
            path: Set(path.map(str::to_string)),
            detail: Set(detail.to_string()),
            created_at: Set(Utc::now()),
        };
        if let Err(e) = model.insert(self.connection()).await {
            warn!(kind = %kind, "Failed to record security incident: {}", e);
        }
    }

    pub async fn list_incidents(
        &self,
        offset: u64,
        limit: u64,
    ) -> AppResult<(Vec<incident::Model>, u64)> {
        let total = Incident::find().count(self.connection()).await?;
        let incidents = Incident::find()
            .order_by_desc(incident::Column::CreatedAt)
            .offset(offset)
            .limit(limit)
            .all(self.connection())
            .await?;
        Ok((incidents, total))
    }
}
