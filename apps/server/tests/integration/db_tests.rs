//! Query-level rules that need the database: DONE protection, lock-guarded
//! transitions and location deletes. Writes are checked in the statement log.

use std::collections::BTreeMap;

use chrono::{NaiveDate, Utc};
use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Value};
use uuid::Uuid;

use acs_lib::db::{DbPool, NewPhoto};
use acs_lib::entity::{job_item, site, work_order};
use acs_lib::error::AppError;
use acs_lib::models::{JobItemStatus, PhotoType, UserRole, WorkOrderProgress};
use acs_lib::services::job_lifecycle::{Actor, MISSING_PHOTOS_MESSAGE};

fn order(site_id: Uuid) -> work_order::Model {
    let now = Utc::now();
    work_order::Model {
        id: Uuid::new_v4(),
        number: "WO-202610-0007".to_string(),
        job_type: "PM".to_string(),
        scheduled_date: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
        status: "IN_PROGRESS".to_string(),
        site_id,
        assigned_team: None,
        approval_token_hash: None,
        approved_at: None,
        approved_by: None,
        created_by: None,
        created_at: now,
        updated_at: now,
    }
}

fn item(work_order_id: Uuid, status: JobItemStatus, technician_id: Option<Uuid>) -> job_item::Model {
    let now = Utc::now();
    job_item::Model {
        id: Uuid::new_v4(),
        work_order_id,
        asset_id: Uuid::new_v4(),
        technician_id,
        status: status.as_str().to_string(),
        start_time: (status != JobItemStatus::Pending).then_some(now),
        end_time: None,
        tech_note: None,
        checklist: None,
        created_at: now,
        updated_at: now,
    }
}

fn site_row(client_id: Uuid) -> site::Model {
    let now = Utc::now();
    site::Model {
        id: Uuid::new_v4(),
        client_id,
        name: "Central Plaza".to_string(),
        address: None,
        created_at: now,
        updated_at: now,
    }
}

/// Single-column rows, as `into_tuple` reads them.
fn column(name: &'static str, values: &[&str]) -> Vec<BTreeMap<&'static str, Value>> {
    values
        .iter()
        .map(|v| BTreeMap::from([(name, Value::from(*v))]))
        .collect()
}

fn exec_ok() -> MockExecResult {
    MockExecResult {
        last_insert_id: 0,
        rows_affected: 1,
    }
}

fn technician(id: Uuid) -> Actor {
    Actor {
        user_id: id,
        role: UserRole::Technician,
    }
}

/// Everything the mock connection was asked to run.
fn statement_log(pool: &DbPool) -> String {
    format!("{:?}", pool.connection().clone().into_transaction_log())
}

fn assert_no_writes(log: &str) {
    assert!(!log.contains(" SET "), "unexpected UPDATE: {}", log);
    assert!(!log.contains("DELETE FROM"), "unexpected DELETE: {}", log);
    assert!(!log.contains("INSERT INTO"), "unexpected INSERT: {}", log);
}

// ----------------------------------------------------------------------
// Work order delete
// ----------------------------------------------------------------------

#[actix_rt::test]
async fn test_work_order_with_done_job_is_not_deleted() {
    let wo = order(Uuid::new_v4());
    let items = vec![
        item(wo.id, JobItemStatus::Done, Some(Uuid::new_v4())),
        item(wo.id, JobItemStatus::Pending, None),
    ];
    let pool = DbPool::from_connection(
        MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![wo.clone()]])
            .append_query_results([items])
            .into_connection(),
    );

    let err = pool.delete_work_order(wo.id).await.unwrap_err();

    assert!(matches!(err, AppError::InvalidInput(ref m) if m.contains("completed jobs")));
    assert_no_writes(&statement_log(&pool));
}

#[actix_rt::test]
async fn test_work_order_delete_removes_jobs_and_photos() {
    let wo = order(Uuid::new_v4());
    let items = vec![
        item(wo.id, JobItemStatus::Pending, None),
        item(wo.id, JobItemStatus::IssueFound, Some(Uuid::new_v4())),
    ];
    let pool = DbPool::from_connection(
        MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![wo.clone()]])
            .append_query_results([items])
            .append_query_results([column("s3_key", &["photos/a.jpg", "photos/b.jpg"])])
            .append_exec_results([exec_ok(), exec_ok(), exec_ok()])
            .into_connection(),
    );

    let keys = pool.delete_work_order(wo.id).await.unwrap();

    assert_eq!(keys, vec!["photos/a.jpg", "photos/b.jpg"]);
    let log = statement_log(&pool);
    assert_eq!(log.matches("DELETE FROM").count(), 3);
    assert!(log.contains("job_photos"));
}

// ----------------------------------------------------------------------
// Job item transitions
// ----------------------------------------------------------------------

#[actix_rt::test]
async fn test_transition_by_other_technician_writes_nothing() {
    let wo = order(Uuid::new_v4());
    let job = item(wo.id, JobItemStatus::InProgress, Some(Uuid::new_v4()));
    let pool = DbPool::from_connection(
        MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![job.clone()]])
            .append_query_results([vec![wo]])
            .append_query_results([vec![job.clone()]])
            .append_query_results([column("photo_type", &[])])
            .into_connection(),
    );

    let err = pool
        .transition_job_item(job.id, &technician(Uuid::new_v4()), JobItemStatus::IssueFound, Utc::now())
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Unauthorized(_)));
    assert_no_writes(&statement_log(&pool));
}

#[actix_rt::test]
async fn test_done_without_after_photo_writes_nothing() {
    let tech = Uuid::new_v4();
    let wo = order(Uuid::new_v4());
    let job = item(wo.id, JobItemStatus::InProgress, Some(tech));
    let pool = DbPool::from_connection(
        MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![job.clone()]])
            .append_query_results([vec![wo]])
            .append_query_results([vec![job.clone()]])
            .append_query_results([column("photo_type", &["BEFORE", "BEFORE"])])
            .into_connection(),
    );

    let err = pool
        .transition_job_item(job.id, &technician(tech), JobItemStatus::Done, Utc::now())
        .await
        .unwrap_err();

    match err {
        AppError::InvalidInput(message) => {
            assert_eq!(message, MISSING_PHOTOS_MESSAGE);
            assert!(message.contains("BEFORE") && message.contains("AFTER"));
        }
        other => panic!("expected InvalidInput, got {:?}", other),
    }
    assert_no_writes(&statement_log(&pool));
}

#[actix_rt::test]
async fn test_last_done_job_reports_the_completed_order() {
    let tech = Uuid::new_v4();
    let wo = order(Uuid::new_v4());
    let job = item(wo.id, JobItemStatus::InProgress, Some(tech));
    let mut stored = job.clone();
    stored.status = JobItemStatus::Done.as_str().to_string();
    stored.end_time = Some(Utc::now());

    let pool = DbPool::from_connection(
        MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![job.clone()]])
            .append_query_results([vec![wo]])
            .append_query_results([vec![job.clone()]])
            .append_query_results([column("photo_type", &["BEFORE", "AFTER"])])
            .append_query_results([vec![stored]])
            .append_query_results([column("status", &["DONE", "DONE"])])
            .into_connection(),
    );

    let applied = pool
        .transition_job_item(job.id, &technician(tech), JobItemStatus::Done, Utc::now())
        .await
        .unwrap();

    assert_eq!(applied.plan.to, JobItemStatus::Done);
    assert!(applied.plan.end_time.is_some());
    assert_eq!(
        applied.completed_order,
        Some(WorkOrderProgress { done: 2, total: 2 })
    );

    let log = statement_log(&pool);
    assert!(log.contains("FOR UPDATE"));
    assert!(log.contains(" SET "));
}

#[actix_rt::test]
async fn test_done_with_open_siblings_does_not_complete_the_order() {
    let tech = Uuid::new_v4();
    let wo = order(Uuid::new_v4());
    let job = item(wo.id, JobItemStatus::InProgress, Some(tech));
    let mut stored = job.clone();
    stored.status = JobItemStatus::Done.as_str().to_string();

    let pool = DbPool::from_connection(
        MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![job.clone()]])
            .append_query_results([vec![wo]])
            .append_query_results([vec![job.clone()]])
            .append_query_results([column("photo_type", &["BEFORE", "AFTER"])])
            .append_query_results([vec![stored]])
            .append_query_results([column("status", &["DONE", "PENDING"])])
            .into_connection(),
    );

    let applied = pool
        .transition_job_item(job.id, &technician(tech), JobItemStatus::Done, Utc::now())
        .await
        .unwrap();

    assert_eq!(applied.completed_order, None);
}

// ----------------------------------------------------------------------
// Photos
// ----------------------------------------------------------------------

#[actix_rt::test]
async fn test_photo_for_done_job_is_not_recorded() {
    let tech = Uuid::new_v4();
    let job = item(Uuid::new_v4(), JobItemStatus::Done, Some(tech));
    let pool = DbPool::from_connection(
        MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![job.clone()]])
            .into_connection(),
    );

    let photo = NewPhoto {
        id: Uuid::new_v4(),
        job_item_id: job.id,
        photo_type: PhotoType::After,
        s3_key: format!("jobs/{}/after.jpg", job.id),
        content_type: "image/jpeg".to_string(),
        size_bytes: 2048,
        uploaded_by: tech,
    };
    let err = pool.insert_photo(photo, &technician(tech)).await.unwrap_err();

    assert!(matches!(err, AppError::InvalidInput(ref m) if m.contains("DONE")));
    assert_no_writes(&statement_log(&pool));
}

// ----------------------------------------------------------------------
// Location deletes
// ----------------------------------------------------------------------

#[actix_rt::test]
async fn test_site_with_work_orders_is_not_deleted() {
    let site_id = Uuid::new_v4();
    let pool = DbPool::from_connection(
        MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![order(site_id)]])
            .into_connection(),
    );

    let err = pool.delete_site(site_id).await.unwrap_err();

    match err {
        AppError::InvalidInput(message) => {
            assert!(message.contains("cannot be deleted"));
            assert!(message.contains("WO-202610-0007"));
        }
        other => panic!("expected InvalidInput, got {:?}", other),
    }
    assert_no_writes(&statement_log(&pool));
}

#[actix_rt::test]
async fn test_client_with_work_orders_is_not_deleted() {
    let client_id = Uuid::new_v4();
    let site = site_row(client_id);
    let pool = DbPool::from_connection(
        MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![site.clone()]])
            .append_query_results([vec![order(site.id)]])
            .into_connection(),
    );

    let err = pool.delete_client(client_id).await.unwrap_err();

    assert!(matches!(err, AppError::InvalidInput(ref m) if m.starts_with("This client cannot be deleted")));
    assert_no_writes(&statement_log(&pool));
}

#[actix_rt::test]
async fn test_site_without_work_orders_is_deleted() {
    let site_id = Uuid::new_v4();
    let pool = DbPool::from_connection(
        MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<work_order::Model>::new()])
            .append_exec_results([exec_ok()])
            .into_connection(),
    );

    pool.delete_site(site_id).await.unwrap();

    assert_eq!(statement_log(&pool).matches("DELETE FROM").count(), 1);
}
