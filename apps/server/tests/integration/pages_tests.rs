//! Server-rendered pages.

use actix_web::http::StatusCode;
use actix_web::test;

use acs_lib::config::Environment;
use acs_lib::models::UserRole;

use super::helpers::*;

#[actix_rt::test]
async fn test_dashboard_redirects_to_login_without_session() {
    let app = init_app(test_state(empty_db(), Environment::Development)).await;

    let req = test::TestRequest::get().uri("/").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp).as_deref(), Some("/login"));
}

#[actix_rt::test]
async fn test_login_page_renders() {
    let app = init_app(test_state(empty_db(), Environment::Development)).await;

    let req = test::TestRequest::get().uri("/login").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body = test::read_body(resp).await;
    let html = String::from_utf8_lossy(&body);
    assert!(html.contains("Sign in"));
    assert!(html.contains("action=\"/login\""));
}

#[actix_rt::test]
async fn test_login_page_shows_error_from_query() {
    let app = init_app(test_state(empty_db(), Environment::Development)).await;

    let req = test::TestRequest::get()
        .uri("/login?error=Invalid%20username%20or%20password")
        .to_request();
    let resp = test::call_service(&app, req).await;
    let body = test::read_body(resp).await;

    assert!(String::from_utf8_lossy(&body).contains("Invalid username or password"));
}

#[actix_rt::test]
async fn test_logged_in_user_skips_login_page() {
    let technician = user(UserRole::Technician, None);
    let state = test_state(session_db(&technician).into_connection(), Environment::Development);
    let cookie = session_cookie(&state, &technician);
    let app = init_app(state).await;

    let req = test::TestRequest::get().uri("/login").cookie(cookie).to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp).as_deref(), Some("/"));
}

#[actix_rt::test]
async fn test_contact_page_is_public() {
    let app = init_app(test_state(empty_db(), Environment::Development)).await;

    let req = test::TestRequest::get().uri("/contact?sent=1").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body = test::read_body(resp).await;
    assert!(String::from_utf8_lossy(&body).contains("We will get back to you"));
}

#[actix_rt::test]
async fn test_logout_clears_cookie() {
    let app = init_app(test_state(empty_db(), Environment::Development)).await;

    let req = test::TestRequest::post().uri("/logout").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp).as_deref(), Some("/login"));
    let cleared = resp
        .response()
        .cookies()
        .find(|c| c.name() == acs_lib::config::SESSION_COOKIE)
        .expect("session cookie is cleared");
    assert_eq!(cleared.value(), "");
}
