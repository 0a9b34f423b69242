//! API integration tests, driving the router over the in-process store

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use library_server::{
    api,
    config::{AppConfig, StaffAccountConfig},
    repository::Repository,
    AppState,
};

const STAFF_EMAIL: &str = "staff@library.test";
const STAFF_PASSWORD: &str = "s3cret";

async fn app() -> Router {
    let mut config = AppConfig::default();
    config.database.url = "memory://".to_string();
    let staff = StaffAccountConfig {
        name: "Librarian".to_string(),
        email: STAFF_EMAIL.to_string(),
        password: STAFF_PASSWORD.to_string(),
    };
    config.auth.staff_account = Some(staff.clone());

    let state = AppState::new(config, Repository::in_memory());
    tokio_test::assert_ok!(state.services.auth.ensure_staff_account(&staff).await);
    api::router(state)
}

async fn send(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Vec<u8>) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

fn json_body(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes).expect("response is not JSON")
}

async fn login(app: &Router, email: &str, password: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": email, "password": password })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    json_body(&body)["jwt"].as_str().unwrap().to_string()
}

async fn customer(app: &Router, email: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/auth/signup",
        None,
        Some(json!({ "name": "Reader", "email": email, "password": "hunter2" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_empty());
    login(app, email, "hunter2").await
}

#[tokio::test]
async fn test_health_check() {
    let app = app().await;

    let (status, body) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["status"], "healthy");

    let (status, body) = send(&app, "GET", "/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["status"], "ready");
}

#[tokio::test]
async fn test_lending_scenario() {
    let app = app().await;
    let staff = login(&app, STAFF_EMAIL, STAFF_PASSWORD).await;
    let reader = customer(&app, "reader@example.com").await;

    let (status, body) = send(
        &app,
        "POST",
        "/books",
        Some(&staff),
        Some(json!({ "title": "Foo", "author": "Bar", "copies": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body.is_empty());

    let (status, body) = send(&app, "GET", "/books?title=foo&author=bar", Some(&reader), None).await;
    assert_eq!(status, StatusCode::OK);
    let books = json_body(&body);
    assert_eq!(books.as_array().unwrap().len(), 2);
    assert!(books[0].get("issued_to").is_none());
    let book_id = books[0]["book_id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        "POST",
        "/transactions/issue",
        Some(&reader),
        Some(json!({ "book_id": book_id, "issue_for": "7 days" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let transaction_id = json_body(&body)["transaction_id"].as_str().unwrap().to_string();

    // Staff see the holder, customers only the remaining copy
    let (_, body) = send(&app, "GET", "/books", Some(&staff), None).await;
    let staff_view = json_body(&body);
    let held = staff_view
        .as_array()
        .unwrap()
        .iter()
        .find(|b| b["book_id"] == book_id.as_str())
        .unwrap();
    assert_eq!(held["issued_to"], "reader@example.com");

    let (_, body) = send(&app, "GET", "/books", Some(&reader), None).await;
    assert_eq!(json_body(&body).as_array().unwrap().len(), 1);

    // Second issue of the same copy
    let (status, body) = send(
        &app,
        "POST",
        "/transactions/issue",
        Some(&reader),
        Some(json!({ "book_id": book_id, "issue_for": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(&body)["message"], "book not available");

    let (status, body) = send(&app, "GET", &format!("/transactions/{}", transaction_id), Some(&reader), None).await;
    assert_eq!(status, StatusCode::OK);
    let found = json_body(&body);
    assert_eq!(found.as_array().unwrap().len(), 1);
    assert_eq!(found[0]["book_name"], "Foo");
    assert_eq!(found[0]["returned_at"], "not returned yet");

    let (status, body) = send(
        &app,
        "POST",
        "/transactions/return",
        Some(&reader),
        Some(json!({ "book_id": book_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_empty());

    let (_, body) = send(&app, "GET", "/books", Some(&reader), None).await;
    assert_eq!(json_body(&body).as_array().unwrap().len(), 2);

    let (status, body) = send(&app, "GET", "/transactions?returned=true", Some(&reader), None).await;
    assert_eq!(status, StatusCode::OK);
    let history = json_body(&body);
    assert_eq!(history.as_array().unwrap().len(), 1);
    assert_ne!(history[0]["returned_at"], "not returned yet");

    let (status, body) = send(&app, "GET", "/transactions/overdue", Some(&staff), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body), json!([]));
}

#[tokio::test]
async fn test_missing_credentials_have_empty_body() {
    let app = app().await;

    let (status, body) = send(&app, "GET", "/books", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.is_empty());

    let request = Request::builder()
        .uri("/transactions")
        .header(header::AUTHORIZATION, "Basic Zm9vOmJhcg==")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_bad_token_is_explained() {
    let app = app().await;

    let (status, body) = send(&app, "GET", "/books", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(&body)["message"], "invalid token");
}

#[tokio::test]
async fn test_role_gates() {
    let app = app().await;
    let staff = login(&app, STAFF_EMAIL, STAFF_PASSWORD).await;
    let reader = customer(&app, "reader@example.com").await;

    let (status, body) = send(
        &app,
        "POST",
        "/books",
        Some(&reader),
        Some(json!({ "title": "Foo", "author": "Bar", "copies": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(&body)["message"], "customer cant add books");

    let (status, body) = send(
        &app,
        "POST",
        "/transactions/issue",
        Some(&staff),
        Some(json!({ "book_id": uuid::Uuid::new_v4().to_string() })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(&body)["message"], "staff cant issue book");
}

#[tokio::test]
async fn test_invalid_input_is_bad_request() {
    let app = app().await;
    let reader = customer(&app, "reader@example.com").await;

    let request = Request::builder()
        .method("POST")
        .uri("/transactions/issue")
        .header(header::AUTHORIZATION, format!("Bearer {}", reader))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        "POST",
        "/transactions/issue",
        Some(&reader),
        Some(json!({ "book_id": "not-a-uuid" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json_body(&body)["message"], "invalid book id");

    let (status, _) = send(&app, "GET", "/transactions?startTime=yesterday", Some(&reader), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "GET", "/transactions/42", Some(&reader), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_signup_and_login_failures() {
    let app = app().await;
    customer(&app, "reader@example.com").await;

    let (status, body) = send(
        &app,
        "POST",
        "/auth/signup",
        None,
        Some(json!({ "name": "Again", "email": "reader@example.com", "password": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(&body)["message"], "email already registered");

    let (status, body) = send(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": "reader@example.com", "password": "wrong" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(&body)["message"], "invalid password");

    let (status, body) = send(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": "nobody@example.com", "password": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(&body)["message"], "user not found");
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = app().await;

    let (status, body) = send(&app, "GET", "/api-docs/openapi.json", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json_body(&body)["paths"]["/transactions/issue"].is_object());
}
