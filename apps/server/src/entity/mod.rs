//! SeaORM entity definitions for PostgreSQL database.

pub mod asset;
pub mod building;
pub mod checklist_template;
pub mod client;
pub mod contact_message;
pub mod floor;
pub mod job_item;
pub mod job_photo;
pub mod room;
pub mod security_incident;
pub mod site;
pub mod user;
pub mod work_order;
