//! SeaORM database migrations.

pub use sea_orm_migration::prelude::*;

mod m20261001_000001_create_clients_and_users;
mod m20261001_000002_create_locations;
mod m20261001_000003_create_work_orders;
mod m20261001_000004_create_job_items;
mod m20261001_000005_create_checklist_templates;
mod m20261001_000006_create_contact_messages;
mod m20261001_000007_create_security_incidents;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20261001_000001_create_clients_and_users::Migration),
            Box::new(m20261001_000002_create_locations::Migration),
            Box::new(m20261001_000003_create_work_orders::Migration),
            Box::new(m20261001_000004_create_job_items::Migration),
            Box::new(m20261001_000005_create_checklist_templates::Migration),
            Box::new(m20261001_000006_create_contact_messages::Migration),
            Box::new(m20261001_000007_create_security_incidents::Migration),
        ]
    }
}
