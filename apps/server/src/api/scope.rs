//! Per-role visibility of sites.
//!
//! Staff see every site; CLIENT users only the sites of their own client.

use uuid::Uuid;

use crate::auth::Session;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};

/// Site ids visible to the session; `None` means unrestricted.
pub async fn visible_sites(pool: &DbPool, session: &Session) -> AppResult<Option<Vec<Uuid>>> {
    if session.role.is_staff() {
        return Ok(None);
    }
    let client_id = session.require_client()?;
    let sites = pool.list_sites(Some(client_id)).await?;
    Ok(Some(sites.into_iter().map(|s| s.id).collect()))
}

/// Reject a CLIENT user reaching into another client's site.
pub async fn ensure_site_access(pool: &DbPool, session: &Session, site_id: Uuid) -> AppResult<()> {
    if session.role.is_staff() {
        return Ok(());
    }
    let client_id = session.require_client()?;
    let site = pool.get_site(site_id).await?;
    if site.client_id == client_id {
        Ok(())
    } else {
        Err(AppError::unauthorized(format!(
            "{} requested site {} of another client",
            session.username, site_id
        )))
    }
}

/// Reject a CLIENT user reaching into another client.
pub fn ensure_client_access(session: &Session, client_id: Uuid) -> AppResult<()> {
    if session.role.is_staff() || session.client_id == Some(client_id) {
        Ok(())
    } else {
        Err(AppError::unauthorized(format!(
            "{} requested client {}",
            session.username, client_id
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRole;

    fn session(role: UserRole, client_id: Option<Uuid>) -> Session {
        Session {
            user_id: Uuid::new_v4(),
            username: "u".to_string(),
            role,
            client_id,
        }
    }

    #[test]
    fn test_client_access() {
        let own = Uuid::new_v4();
        let other = Uuid::new_v4();
        assert!(ensure_client_access(&session(UserRole::Client, Some(own)), own).is_ok());
        assert!(ensure_client_access(&session(UserRole::Client, Some(own)), other).is_err());
        assert!(ensure_client_access(&session(UserRole::Technician, None), other).is_ok());
    }
}
