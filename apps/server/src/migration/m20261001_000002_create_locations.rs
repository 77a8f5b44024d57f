//! Migration: Create the location hierarchy below clients.
//!
//! sites -> buildings -> floors -> rooms -> assets, each cascading from its parent.

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
                CREATE TABLE sites (
                    id UUID PRIMARY KEY,
                    client_id UUID NOT NULL REFERENCES clients(id) ON DELETE CASCADE,
                    name VARCHAR(255) NOT NULL,
                    address TEXT,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );
                CREATE INDEX idx_sites_client_id ON sites(client_id);

                CREATE TABLE buildings (
                    id UUID PRIMARY KEY,
                    site_id UUID NOT NULL REFERENCES sites(id) ON DELETE CASCADE,
                    name VARCHAR(255) NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );
                CREATE INDEX idx_buildings_site_id ON buildings(site_id);

                CREATE TABLE floors (
                    id UUID PRIMARY KEY,
                    building_id UUID NOT NULL REFERENCES buildings(id) ON DELETE CASCADE,
                    name VARCHAR(255) NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );
                CREATE INDEX idx_floors_building_id ON floors(building_id);

                CREATE TABLE rooms (
                    id UUID PRIMARY KEY,
                    floor_id UUID NOT NULL REFERENCES floors(id) ON DELETE CASCADE,
                    name VARCHAR(255) NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );
                CREATE INDEX idx_rooms_floor_id ON rooms(floor_id);

                CREATE TABLE assets (
                    id UUID PRIMARY KEY,
                    room_id UUID NOT NULL REFERENCES rooms(id) ON DELETE CASCADE,
                    name VARCHAR(255) NOT NULL,
                    brand VARCHAR(100),
                    model_number VARCHAR(100),
                    serial_number VARCHAR(100),
                    capacity_btu INTEGER CHECK (capacity_btu IS NULL OR capacity_btu > 0),
                    qr_code VARCHAR(100) NOT NULL,
                    notes TEXT,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );
                CREATE INDEX idx_assets_room_id ON assets(room_id);
                CREATE UNIQUE INDEX idx_assets_qr_code ON assets(qr_code);

                CREATE TRIGGER update_sites_updated_at
                    BEFORE UPDATE ON sites
                    FOR EACH ROW
                    EXECUTE FUNCTION update_updated_at_column();

                CREATE TRIGGER update_assets_updated_at
                    BEFORE UPDATE ON assets
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
                DROP TABLE IF EXISTS assets CASCADE;
                DROP TABLE IF EXISTS rooms CASCADE;
                DROP TABLE IF EXISTS floors CASCADE;
                DROP TABLE IF EXISTS buildings CASCADE;
                DROP TABLE IF EXISTS sites CASCADE;
                "#,
            )
            .await?;

        Ok(())
    }
}
