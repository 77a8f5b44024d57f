//! Domain services: job lifecycle rules, checklist evaluation, numbering,
//! exports, notifications and photo storage.

pub mod checklist;
pub mod export;
pub mod job_lifecycle;
pub mod notifier;
pub mod numbering;
pub mod storage;

pub use notifier::NotificationHub;
pub use storage::Storage;
