//! Migration: Create checklist_templates table.

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
                CREATE TABLE checklist_templates (
                    id UUID PRIMARY KEY,
                    name VARCHAR(255) NOT NULL,
                    job_type VARCHAR(20) NOT NULL
                        CHECK (job_type IN ('PM', 'CM', 'INSTALL')),
                    items JSONB NOT NULL DEFAULT '[]'::jsonb,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );

                CREATE INDEX idx_checklist_templates_job_type ON checklist_templates(job_type);

                CREATE TRIGGER update_checklist_templates_updated_at
                    BEFORE UPDATE ON checklist_templates
                    FOR EACH ROW
                    EXECUTE FUNCTION update_updated_at_column();
                "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("DROP TABLE IF EXISTS checklist_templates CASCADE;")
            .await?;

        Ok(())
    }
}
