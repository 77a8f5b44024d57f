//! Database queries for contact messages and repair requests.

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use crate::entity::contact_message::{self as message, ActiveModel, Entity as Message};
use crate::error::{AppError, AppResult};
use crate::models::ContactKind;

use super::DbPool;

/// Fields of a new contact message.
#[derive(Debug, Clone)]
pub struct NewContactMessage {
    pub kind: ContactKind,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub message: String,
    pub site_id: Option<Uuid>,
    pub asset_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
}

impl DbPool {
    pub async fn insert_contact_message(&self, new: NewContactMessage) -> AppResult<message::Model> {
        let model = ActiveModel {
            id: Set(Uuid::new_v4()),
            kind: Set(new.kind.as_str().to_string()),
            name: Set(new.name),
            phone: Set(new.phone),
            email: Set(new.email),
            message: Set(new.message),
            site_id: Set(new.site_id),
            asset_id: Set(new.asset_id),
            user_id: Set(new.user_id),
            is_read: Set(false),
            created_at: Set(Utc::now()),
        };
        Ok(model.insert(self.connection()).await?)
    }

    /// Newest first, unread messages on top.
    pub async fn list_contact_messages(
        &self,
        offset: u64,
        limit: u64,
    ) -> AppResult<(Vec<message::Model>, u64)> {
        let total = Message::find().count(self.connection()).await?;
        let messages = Message::find()
            .order_by_asc(message::Column::IsRead)
            .order_by_desc(message::Column::CreatedAt)
            .offset(offset)
            .limit(limit)
            .all(self.connection())
            .await?;
        Ok((messages, total))
    }

    pub async fn count_unread_messages(&self) -> AppResult<u64> {
        Ok(Message::find()
            .filter(message::Column::IsRead.eq(false))
            .count(self.connection())
            .await?)
    }

    pub async fn mark_message_read(&self, id: Uuid) -> AppResult<()> {
        let result = Message::update_many()
            .col_expr(message::Column::IsRead, Expr::value(true))
            .filter(message::Column::Id.eq(id))
            .exec(self.connection())
            .await?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound("Message".to_string()));
        }
        Ok(())
    }

    pub async fn delete_contact_message(&self, id: Uuid) -> AppResult<()> {
        let result = Message::delete_by_id(id).exec(self.connection()).await?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound("Message".to_string()));
        }
        Ok(())
    }
}
