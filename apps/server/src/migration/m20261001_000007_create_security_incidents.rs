//! Migration: Create security_incidents table.
//!
//! Append-only log of failed logins and denied requests.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE TABLE security_incidents (
                    id UUID PRIMARY KEY,
                    kind VARCHAR(30) NOT NULL,
                    username VARCHAR(100),
                    ip_address VARCHAR(64),
                    path VARCHAR(500),
                    detail TEXT NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );

                CREATE INDEX idx_security_incidents_created_at
                    ON security_incidents(created_at DESC);
                "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("DROP TABLE IF EXISTS security_incidents CASCADE;")
            .await?;

        Ok(())
    }
}
