//! Migration: Create work_orders table.
//!
//! The unique index on number backs the retry loop of the numbering service.
//! A site with work orders cannot be deleted (ON DELETE RESTRICT); work orders
//! are removed through their own delete, which keeps completed ones.

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
                CREATE TABLE work_orders (
                    id UUID PRIMARY KEY,
                    number VARCHAR(50) NOT NULL,
                    job_type VARCHAR(20) NOT NULL
                        CHECK (job_type IN ('PM', 'CM', 'INSTALL')),
                    scheduled_date DATE NOT NULL,
                    status VARCHAR(20) NOT NULL DEFAULT 'OPEN'
                        CHECK (status IN ('OPEN', 'IN_PROGRESS', 'COMPLETED', 'CANCELLED')),
                    site_id UUID NOT NULL REFERENCES sites(id) ON DELETE RESTRICT,
                    assigned_team VARCHAR(255),
                    approval_token_hash VARCHAR(64),
                    approved_at TIMESTAMPTZ,
                    approved_by UUID REFERENCES users(id) ON DELETE SET NULL,
                    created_by UUID REFERENCES users(id) ON DELETE SET NULL,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );

                CREATE UNIQUE INDEX idx_work_orders_number ON work_orders(number);
                CREATE INDEX idx_work_orders_site_id ON work_orders(site_id);
                CREATE INDEX idx_work_orders_status ON work_orders(status);
                CREATE INDEX idx_work_orders_scheduled_date ON work_orders(scheduled_date);
                CREATE UNIQUE INDEX idx_work_orders_approval_token
                    ON work_orders(approval_token_hash)
                    WHERE approval_token_hash IS NOT NULL;

                CREATE TRIGGER update_work_orders_updated_at
                    BEFORE UPDATE ON work_orders
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
                DROP TRIGGER IF EXISTS update_work_orders_updated_at ON work_orders;
                DROP TABLE IF EXISTS work_orders CASCADE;
                "#,
            )
            .await?;

        Ok(())
    }
}
