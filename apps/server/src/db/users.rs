//! Database queries for users.

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, JoinType, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, RelationTrait, Set,
};
use uuid::Uuid;

use crate::entity::{site, user::{self, ActiveModel, Entity as UserEntity}};
use crate::error::{AppError, AppResult};
use crate::models::{User, UserRole};

use super::DbPool;

/// User together with the stored password hash; only used by login.
pub struct StoredUser {
    pub user: User,
    pub password_hash: String,
}

/// Fields written when creating a user.
pub struct NewUser<'a> {
    pub username: &'a str,
    pub display_name: &'a str,
    pub password_hash: String,
    pub role: UserRole,
    pub client_id: Option<Uuid>,
    pub chat_user_id: Option<String>,
}

impl DbPool {
    /// Find an active user by username, including the password hash.
    pub async fn find_user_for_login(&self, username: &str) -> AppResult<Option<StoredUser>> {
        let found = UserEntity::find()
            .filter(user::Column::Username.eq(username))
            .filter(user::Column::DeletedAt.is_null())
            .one(self.connection())
            .await?;

        Ok(found.map(|m| StoredUser {
            password_hash: m.password_hash.clone(),
            user: model_to_user(m),
        }))
    }

    pub async fn get_user(&self, id: Uuid) -> AppResult<Option<User>> {
        let found = UserEntity::find_by_id(id)
            .filter(user::Column::DeletedAt.is_null())
            .one(self.connection())
            .await?;

        Ok(found.map(model_to_user))
    }

    /// Active users ordered by role then username.
    pub async fn list_users(&self) -> AppResult<Vec<User>> {
        let users = UserEntity::find()
            .filter(user::Column::DeletedAt.is_null())
            .order_by_asc(user::Column::Role)
            .order_by_asc(user::Column::Username)
            .all(self.connection())
            .await?;

        Ok(users.into_iter().map(model_to_user).collect())
    }

    /// Active technicians, for assignment dropdowns.
    pub async fn list_technicians(&self) -> AppResult<Vec<User>> {
        let users = UserEntity::find()
            .filter(user::Column::DeletedAt.is_null())
            .filter(user::Column::Role.eq(UserRole::Technician.as_str()))
            .order_by_asc(user::Column::DisplayName)
            .all(self.connection())
            .await?;

        Ok(users.into_iter().map(model_to_user).collect())
    }

    pub async fn insert_user(&self, new: NewUser<'_>) -> AppResult<User> {
        let now = Utc::now();
        let model = ActiveModel {
            id: Set(Uuid::new_v4()),
            username: Set(new.username.to_string()),
            display_name: Set(new.display_name.to_string()),
            password_hash: Set(new.password_hash),
            role: Set(new.role.as_str().to_string()),
            client_id: Set(new.client_id),
            chat_user_id: Set(new.chat_user_id),
            last_login_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(None),
        };

        let inserted = model.insert(self.connection()).await?;
        Ok(model_to_user(inserted))
    }

    /// Update profile fields; `password_hash` of `None` keeps the current password.
    pub async fn update_user(
        &self,
        id: Uuid,
        display_name: &str,
        role: UserRole,
        password_hash: Option<String>,
        client_id: Option<Uuid>,
        chat_user_id: Option<String>,
    ) -> AppResult<User> {
        let existing = self.active_user_model(id).await?;

        let mut active: ActiveModel = existing.into();
        active.display_name = Set(display_name.to_string());
        active.role = Set(role.as_str().to_string());
        active.client_id = Set(client_id);
        active.chat_user_id = Set(chat_user_id);
        if let Some(hash) = password_hash {
            active.password_hash = Set(hash);
        }
        active.updated_at = Set(Utc::now());

        let updated = active.update(self.connection()).await?;
        Ok(model_to_user(updated))
    }

    /// Soft delete: the row stays for audit columns that reference it.
    pub async fn soft_delete_user(&self, id: Uuid) -> AppResult<()> {
        let existing = self.active_user_model(id).await?;

        let mut active: ActiveModel = existing.into();
        active.deleted_at = Set(Some(Utc::now()));
        active.update(self.connection()).await?;
        Ok(())
    }

    pub async fn record_login(&self, id: Uuid) -> AppResult<()> {
        UserEntity::update_many()
            .col_expr(user::Column::LastLoginAt, Expr::value(Utc::now()))
            .filter(user::Column::Id.eq(id))
            .exec(self.connection())
            .await?;
        Ok(())
    }

    pub async fn admin_exists(&self) -> AppResult<bool> {
        let count = UserEntity::find()
            .filter(user::Column::Role.eq(UserRole::Admin.as_str()))
            .filter(user::Column::DeletedAt.is_null())
            .count(self.connection())
            .await?;
        Ok(count > 0)
    }

    /// Chat ids of the CLIENT users whose organisation owns `site_id`.
    pub async fn client_chat_ids_for_site(&self, site_id: Uuid) -> AppResult<Vec<String>> {
        let ids: Vec<Option<String>> = UserEntity::find()
            .select_only()
            .column(user::Column::ChatUserId)
            .join(JoinType::InnerJoin, user::Relation::Client.def())
            .join(
                JoinType::InnerJoin,
                crate::entity::client::Relation::Site.def(),
            )
            .filter(site::Column::Id.eq(site_id))
            .filter(user::Column::Role.eq(UserRole::Client.as_str()))
            .filter(user::Column::DeletedAt.is_null())
            .filter(user::Column::ChatUserId.is_not_null())
            .into_tuple()
            .all(self.connection())
            .await?;

        Ok(ids.into_iter().flatten().collect())
    }

    pub async fn user_chat_id(&self, id: Uuid) -> AppResult<Option<String>> {
        Ok(self.get_user(id).await?.and_then(|u| u.chat_user_id))
    }

    async fn active_user_model(&self, id: Uuid) -> AppResult<user::Model> {
        UserEntity::find_by_id(id)
            .filter(user::Column::DeletedAt.is_null())
            .one(self.connection())
            .await?
            .ok_or_else(|| AppError::NotFound("User".to_string()))
    }
}

fn model_to_user(m: user::Model) -> User {
    User {
        id: m.id,
        username: m.username,
        display_name: m.display_name,
        role: UserRole::parse(&m.role).unwrap_or(UserRole::Client),
        client_id: m.client_id,
        chat_user_id: m.chat_user_id,
        last_login_at: m.last_login_at,
        created_at: m.created_at,
    }
}
