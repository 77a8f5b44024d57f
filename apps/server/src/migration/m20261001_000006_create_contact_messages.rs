//! Migration: Create contact_messages table.

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
                CREATE TABLE contact_messages (
                    id UUID PRIMARY KEY,
                    kind VARCHAR(20) NOT NULL
                        CHECK (kind IN ('contact', 'repair_request')),
                    name VARCHAR(255) NOT NULL,
                    phone VARCHAR(50),
                    email VARCHAR(255),
                    message TEXT NOT NULL,
                    site_id UUID REFERENCES sites(id) ON DELETE SET NULL,
                    asset_id UUID REFERENCES assets(id) ON DELETE SET NULL,
                    user_id UUID REFERENCES users(id) ON DELETE SET NULL,
                    is_read BOOLEAN NOT NULL DEFAULT FALSE,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );

                CREATE INDEX idx_contact_messages_unread
                    ON contact_messages(created_at DESC)
                    WHERE is_read = FALSE;
                "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("DROP TABLE IF EXISTS contact_messages CASCADE;")
            .await?;

        Ok(())
    }
}
