//! Role gates, session revocation and the setup endpoint.

use actix_web::http::StatusCode;
use actix_web::test;
use uuid::Uuid;

use acs_lib::config::Environment;
use acs_lib::entity::user as user_entity;
use acs_lib::models::UserRole;

use super::helpers::*;

#[actix_rt::test]
async fn test_technician_cannot_open_user_admin() {
    let technician = user(UserRole::Technician, None);
    let state = test_state(session_db(&technician).into_connection(), Environment::Development);
    let cookie = session_cookie(&state, &technician);
    let app = init_app(state).await;

    let req = test::TestRequest::get().uri("/users").cookie(cookie).to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_rt::test]
async fn test_client_cannot_create_work_orders() {
    let client = user(UserRole::Client, Some(Uuid::new_v4()));
    let state = test_state(session_db(&client).into_connection(), Environment::Development);
    let cookie = session_cookie(&state, &client);
    let app = init_app(state).await;

    let req = test::TestRequest::get()
        .uri("/work-orders/new")
        .cookie(cookie)
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_rt::test]
async fn test_client_cannot_open_another_clients_page() {
    let client = user(UserRole::Client, Some(Uuid::new_v4()));
    let state = test_state(session_db(&client).into_connection(), Environment::Development);
    let cookie = session_cookie(&state, &client);
    let app = init_app(state).await;

    let req = test::TestRequest::get()
        .uri(&format!("/clients/{}", Uuid::new_v4()))
        .cookie(cookie)
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_rt::test]
async fn test_client_clients_list_redirects_to_own_client() {
    let client_id = Uuid::new_v4();
    let client = user(UserRole::Client, Some(client_id));
    let state = test_state(session_db(&client).into_connection(), Environment::Development);
    let cookie = session_cookie(&state, &client);
    let app = init_app(state).await;

    let req = test::TestRequest::get().uri("/clients").cookie(cookie).to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), Some(format!("/clients/{}", client_id)));
}

#[actix_rt::test]
async fn test_tampered_cookie_is_treated_as_logged_out() {
    let state = test_state(empty_db(), Environment::Development);
    let mut cookie = session_cookie(&state, &user(UserRole::Admin, None));
    cookie.set_value(format!("{}x", cookie.value()));
    let app = init_app(state).await;

    let req = test::TestRequest::get().uri("/users").cookie(cookie).to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp).as_deref(), Some("/login"));
}

#[actix_rt::test]
async fn test_removed_user_loses_access_immediately() {
    // The lookup filters soft-deleted rows, so it comes back empty
    let conn = sea_orm::MockDatabase::new(sea_orm::DatabaseBackend::Postgres)
        .append_query_results([Vec::<user_entity::Model>::new()])
        .into_connection();
    let state = test_state(conn, Environment::Development);
    let cookie = session_cookie(&state, &user(UserRole::Technician, None));
    let app = init_app(state).await;

    let req = test::TestRequest::get().uri("/").cookie(cookie).to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp).as_deref(), Some("/login"));
}

#[actix_rt::test]
async fn test_role_change_applies_to_an_existing_session() {
    let admin = user(UserRole::Admin, None);
    let mut demoted = admin.clone();
    demoted.role = UserRole::Technician;

    let state = test_state(session_db(&demoted).into_connection(), Environment::Development);
    // Cookie still claims ADMIN
    let cookie = session_cookie(&state, &admin);
    let app = init_app(state).await;

    let req = test::TestRequest::get().uri("/users").cookie(cookie).to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_rt::test]
async fn test_setup_requires_bearer_in_production() {
    let app = init_app(test_state(empty_db(), Environment::Production)).await;

    let req = test::TestRequest::post()
        .uri("/setup")
        .set_form([("username", "admin"), ("password", "correct-horse")])
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}
