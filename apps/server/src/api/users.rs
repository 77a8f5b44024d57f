//! User administration pages (ADMIN).

use actix_web::{HttpResponse, web};
use serde_json::json;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::api::forms::{ErrorQuery, or_back, redirect};
use crate::auth::{Session, password};
use crate::db::{DbPool, NewUser};
use crate::error::{AppError, AppResult};
use crate::models::user::{CreateUserForm, UpdateUserForm};
use crate::models::{UserRole, non_empty};
use crate::views::{Views, page};

/// Parse the role and client fields; only CLIENT users carry a client.
fn resolve_membership(role: &str, client_id: Option<String>) -> AppResult<(UserRole, Option<Uuid>)> {
    let role = UserRole::parse(role)
        .ok_or_else(|| AppError::InvalidInput(format!("Unknown role '{}'", role)))?;
    match (role, non_empty(client_id)) {
        (UserRole::Client, Some(raw)) => Ok((role, Some(Uuid::parse_str(&raw)?))),
        (UserRole::Client, None) => Err(AppError::InvalidInput(
            "A client user must belong to a client".to_string(),
        )),
        _ => Ok((role, None)),
    }
}

async fn list_users(
    session: Session,
    pool: web::Data<DbPool>,
    views: web::Data<Views>,
    query: web::Query<ErrorQuery>,
) -> AppResult<HttpResponse> {
    session.require_admin()?;
    let users = pool.list_users().await?;
    let clients = pool.list_clients().await?;
    views.render(
        "users",
        &page(
            Some(&session),
            "Users",
            query.error.as_deref(),
            json!({ "users": users, "clients": clients, "roles": UserRole::ALL }),
        ),
    )
}

async fn create_user(
    session: Session,
    pool: web::Data<DbPool>,
    form: web::Form<CreateUserForm>,
) -> AppResult<HttpResponse> {
    session.require_admin()?;
    let result: AppResult<HttpResponse> = async {
        let form = form.into_inner();
        form.validate()?;
        let (role, client_id) = resolve_membership(&form.role, form.client_id)?;
        let user = pool
            .insert_user(NewUser {
                username: form.username.trim(),
                display_name: form.display_name.trim(),
                password_hash: password::hash_password(&form.password)?,
                role,
                client_id,
                chat_user_id: non_empty(form.chat_user_id),
            })
            .await?;
        info!(by = %session.username, username = %user.username, role = %user.role, "User created");
        Ok(redirect("/users"))
    }
    .await;
    or_back(result, "/users")
}

async fn edit_user(
    session: Session,
    pool: web::Data<DbPool>,
    views: web::Data<Views>,
    path: web::Path<Uuid>,
    query: web::Query<ErrorQuery>,
) -> AppResult<HttpResponse> {
    session.require_admin()?;
    let user = pool
        .get_user(path.into_inner())
        .await?
        .ok_or_else(|| AppError::NotFound("User".to_string()))?;
    let clients = pool.list_clients().await?;
    views.render(
        "user_edit",
        &page(
            Some(&session),
            &user.display_name,
            query.error.as_deref(),
            json!({ "user": user, "clients": clients, "roles": UserRole::ALL }),
        ),
    )
}

async fn update_user(
    session: Session,
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
    form: web::Form<UpdateUserForm>,
) -> AppResult<HttpResponse> {
    session.require_admin()?;
    let id = path.into_inner();
    let back = format!("/users/{}", id);
    let result: AppResult<HttpResponse> = async {
        let form = form.into_inner();
        form.validate()?;
        let (role, client_id) = resolve_membership(&form.role, form.client_id)?;
        if id == session.user_id && role != UserRole::Admin {
            return Err(AppError::InvalidInput(
                "You cannot remove your own admin role".to_string(),
            ));
        }
        let password_hash = match non_empty(form.password) {
            Some(raw) if raw.len() < 8 => {
                return Err(AppError::InvalidInput(
                    "password must be at least 8 characters".to_string(),
                ));
            }
            Some(raw) => Some(password::hash_password(&raw)?),
            None => None,
        };
        pool.update_user(
            id,
            form.display_name.trim(),
            role,
            password_hash,
            client_id,
            non_empty(form.chat_user_id),
        )
        .await?;
        Ok(redirect("/users"))
    }
    .await;
    or_back(result, &back)
}

async fn delete_user(
    session: Session,
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    session.require_admin()?;
    let id = path.into_inner();
    let result: AppResult<HttpResponse> = async {
        if id == session.user_id {
            return Err(AppError::InvalidInput(
                "You cannot delete your own account".to_string(),
            ));
        }
        pool.soft_delete_user(id).await?;
        info!(by = %session.username, user_id = %id, "User deleted");
        Ok(redirect("/users"))
    }
    .await;
    or_back(result, "/users")
}

/// Configure user administration routes.
pub fn configure_user_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/users")
            .route(web::get().to(list_users))
            .route(web::post().to(create_user)),
    )
    .service(
        web::resource("/users/{id}")
            .route(web::get().to(edit_user))
            .route(web::post().to(update_user)),
    )
    .service(web::resource("/users/{id}/delete").route(web::post().to(delete_user)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_role_requires_client() {
        assert!(resolve_membership("CLIENT", None).is_err());
        assert!(resolve_membership("CLIENT", Some("  ".to_string())).is_err());
        let id = Uuid::new_v4();
        assert_eq!(
            resolve_membership("client", Some(id.to_string())).unwrap(),
            (UserRole::Client, Some(id))
        );
    }

    #[test]
    fn test_staff_roles_drop_client() {
        let id = Uuid::new_v4();
        assert_eq!(
            resolve_membership("TECHNICIAN", Some(id.to_string())).unwrap(),
            (UserRole::Technician, None)
        );
        assert!(resolve_membership("OWNER", None).is_err());
    }
}
