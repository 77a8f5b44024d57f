//! JSON endpoints under /api/v1.

use actix_web::http::StatusCode;
use actix_web::test;
use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
use serde_json::Value;
use uuid::Uuid;

use acs_lib::config::Environment;
use acs_lib::entity::work_order;
use acs_lib::models::UserRole;

use super::helpers::*;

#[actix_rt::test]
async fn test_health_is_public() {
    let app = init_app(test_state(empty_db(), Environment::Development)).await;

    let req = test::TestRequest::get().uri("/api/v1/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "healthy");
}

#[actix_rt::test]
async fn test_ready_reports_database() {
    let conn = MockDatabase::new(DatabaseBackend::Postgres)
        .append_exec_results([MockExecResult {
            last_insert_id: 0,
            rows_affected: 1,
        }])
        .into_connection();
    let app = init_app(test_state(conn, Environment::Development)).await;

    let req = test::TestRequest::get().uri("/api/v1/ready").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    // Bucket reachability depends on the host; only the database decides the code
    let body: Value = test::read_body_json(resp).await;
    assert_ne!(body["status"], "not_ready");
    assert_eq!(body["database"], true);
    assert_eq!(body["messaging"], false);
    assert_eq!(body["admin_channel"], false);
}

#[actix_rt::test]
async fn test_ready_fails_without_database() {
    let app = init_app(test_state(empty_db(), Environment::Development)).await;

    let req = test::TestRequest::get().uri("/api/v1/ready").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "not_ready");
    assert_eq!(body["database"], false);
}

#[actix_rt::test]
async fn test_progress_requires_session() {
    let app = init_app(test_state(empty_db(), Environment::Development)).await;

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/work-orders/{}/progress", Uuid::new_v4()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "UNAUTHORIZED");
}

#[actix_rt::test]
async fn test_progress_of_unknown_work_order_is_404() {
    let admin = user(UserRole::Admin, None);
    let conn = session_db(&admin)
        .append_query_results([Vec::<work_order::Model>::new()])
        .into_connection();
    let state = test_state(conn, Environment::Development);
    let cookie = session_cookie(&state, &admin);
    let app = init_app(state).await;

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/work-orders/{}/progress", Uuid::new_v4()))
        .cookie(cookie)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "NOT_FOUND");
}
