//! Database module providing connection management, migrations, and queries.
//!
//! Queries are grouped per aggregate as `impl DbPool` blocks.

mod checklist_templates;
mod contact_messages;
mod job_items;
mod locations;
mod security_incidents;
mod users;
mod work_orders;

pub use contact_messages::NewContactMessage;
pub use job_items::{AppliedTransition, JobItemDetail, NewPhoto, TechnicianTask, job_item_status};
pub use locations::AssetWithLocation;
pub use users::{NewUser, StoredUser};
pub use work_orders::{JobItemLine, NewWorkOrder, WorkOrderDetail, WorkOrderListQuery};

use std::time::Duration;

use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use tracing::info;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::migration::Migrator;

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct DbPool {
    conn: DatabaseConnection,
}

impl DbPool {
    /// Create a new database pool from configuration.
    pub async fn new(config: &Config) -> AppResult<Self> {
        let mut options = ConnectOptions::new(config.database_url.clone());
        options
            .max_connections(config.db_max_connections)
            .min_connections(1)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .sqlx_logging(false);

        let conn = Database::connect(options)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to database: {}", e)))?;

        info!(
            "Database pool ready (max {} connections)",
            config.db_max_connections
        );

        Ok(Self { conn })
    }

    /// Wrap an existing connection, e.g. a mock connection in tests.
    pub fn from_connection(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Get access to the connection for executing queries.
    pub fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    /// Apply pending migrations.
    pub async fn run_migrations(&self) -> AppResult<()> {
        Migrator::up(&self.conn, None)
            .await
            .map_err(|e| AppError::Database(format!("Failed to run migrations: {}", e)))
    }

    /// Round-trip a trivial statement; used by the readiness check.
    pub async fn ping(&self) -> AppResult<()> {
        self.conn
            .execute_unprepared("SELECT 1")
            .await
            .map(|_| ())
            .map_err(|e| AppError::Database(format!("Database ping failed: {}", e)))
    }
}
