//! Migration: Create clients and users tables.
//!
//! Users log in with a password; CLIENT users point at their client organisation.

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
                CREATE OR REPLACE FUNCTION update_updated_at_column()
                RETURNS TRIGGER AS $$
                BEGIN
                    NEW.updated_at = NOW();
                    RETURN NEW;
                END;
                $$ LANGUAGE plpgsql;

                CREATE TABLE clients (
                    id UUID PRIMARY KEY,
                    name VARCHAR(255) NOT NULL,
                    contact_name VARCHAR(255),
                    phone VARCHAR(50),
                    email VARCHAR(255),
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );

                CREATE TABLE users (
                    id UUID PRIMARY KEY,
                    username VARCHAR(100) NOT NULL,
                    display_name VARCHAR(255) NOT NULL,
                    password_hash VARCHAR(255) NOT NULL,
                    role VARCHAR(20) NOT NULL
                        CHECK (role IN ('ADMIN', 'TECHNICIAN', 'CLIENT')),
                    client_id UUID REFERENCES clients(id) ON DELETE SET NULL,
                    chat_user_id VARCHAR(100),
                    last_login_at TIMESTAMPTZ,

                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    deleted_at TIMESTAMPTZ
                );

                -- Usernames are unique among active users
                CREATE UNIQUE INDEX idx_users_username_active
                    ON users(username)
                    WHERE deleted_at IS NULL;

                CREATE INDEX idx_users_client_id
                    ON users(client_id)
                    WHERE deleted_at IS NULL;

                CREATE TRIGGER update_clients_updated_at
                    BEFORE UPDATE ON clients
                    FOR EACH ROW
                    EXECUTE FUNCTION update_updated_at_column();

                CREATE TRIGGER update_users_updated_at
                    BEFORE UPDATE ON users
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
                DROP TRIGGER IF EXISTS update_users_updated_at ON users;
                DROP TRIGGER IF EXISTS update_clients_updated_at ON clients;
                DROP TABLE IF EXISTS users CASCADE;
                DROP TABLE IF EXISTS clients CASCADE;
                DROP FUNCTION IF EXISTS update_updated_at_column();
                "#,
            )
            .await?;

        Ok(())
    }
}
