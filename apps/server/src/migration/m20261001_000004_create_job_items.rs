//! Migration: Create job_items and job_photos tables.
//!
//! Assets referenced by job items cannot be deleted (ON DELETE RESTRICT).

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
                CREATE TABLE job_items (
                    id UUID PRIMARY KEY,
                    work_order_id UUID NOT NULL REFERENCES work_orders(id) ON DELETE CASCADE,
                    asset_id UUID NOT NULL REFERENCES assets(id) ON DELETE RESTRICT,
                    technician_id UUID REFERENCES users(id) ON DELETE SET NULL,
                    status VARCHAR(20) NOT NULL DEFAULT 'PENDING'
                        CHECK (status IN ('PENDING', 'IN_PROGRESS', 'DONE', 'ISSUE_FOUND')),
                    start_time TIMESTAMPTZ,
                    end_time TIMESTAMPTZ,
                    tech_note TEXT,
                    checklist JSONB,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

                    UNIQUE (work_order_id, asset_id)
                );

                CREATE INDEX idx_job_items_work_order_id ON job_items(work_order_id);
                CREATE INDEX idx_job_items_technician_status ON job_items(technician_id, status);

                CREATE TABLE job_photos (
                    id UUID PRIMARY KEY,
                    job_item_id UUID NOT NULL REFERENCES job_items(id) ON DELETE CASCADE,
                    photo_type VARCHAR(10) NOT NULL
                        CHECK (photo_type IN ('BEFORE', 'AFTER', 'DEFECT', 'METER')),
                    s3_key VARCHAR(500) NOT NULL,
                    content_type VARCHAR(100) NOT NULL,
                    size_bytes BIGINT NOT NULL,
                    uploaded_by UUID REFERENCES users(id) ON DELETE SET NULL,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );

                CREATE INDEX idx_job_photos_job_item_id ON job_photos(job_item_id);

                CREATE TRIGGER update_job_items_updated_at
                    BEFORE UPDATE ON job_items
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
            .execute_unprepared(
                r#"
                DROP TABLE IF EXISTS job_photos CASCADE;
                DROP TRIGGER IF EXISTS update_job_items_updated_at ON job_items;
                DROP TABLE IF EXISTS job_items CASCADE;
                "#,
            )
            .await?;

        Ok(())
    }
}
