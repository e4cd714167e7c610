mod common;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use common::*;
use pustaka::api;
use pustaka::auth::create_jwt;
use pustaka::models::{Role, user};
use serde_json::{Value, json};
use tower::util::ServiceExt; // for `oneshot`

fn token_for(account: &user::Model) -> String {
    create_jwt(account.id, &account.username, account.role).unwrap()
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token));
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

fn assert_error(body: &Value, code: &str) {
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], code);
    assert!(
        body["message"].as_str().is_some_and(|m| !m.is_empty()),
        "missing message in {}",
        body
    );
}

#[tokio::test]
async fn test_unknown_ids_return_404() {
    let db = setup_test_db().await;
    let admin = create_user(&db, "admin", Role::Admin, 2020).await;
    let app = api::api_router(db);
    let token = token_for(&admin);

    for uri in ["/admin/loans/999", "/admin/books/999", "/admin/users/999"] {
        let (status, body) = send(&app, "GET", uri, &token, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
        assert_error(&body, "NOT_FOUND");
    }

    let (status, body) = send(&app, "POST", "/admin/loans/999/return", &token, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "loan not found");
}

#[tokio::test]
async fn test_unavailable_book_returns_422() {
    let db = setup_test_db().await;
    let student = create_user(&db, "siti", Role::Student, 2024).await;
    let book_id = create_book(&db, "Habis", 0).await;
    let app = api::api_router(db);

    let (status, body) = send(
        &app,
        "POST",
        "/bookshelves/loans",
        &token_for(&student),
        Some(json!({ "book_id": book_id })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_error(&body, "BOOK_UNAVAILABLE");
}

#[tokio::test]
async fn test_duplicate_request_returns_422() {
    let db = setup_test_db().await;
    let student = create_user(&db, "siti", Role::Student, 2024).await;
    let book_id = create_book(&db, "Laskar Pelangi", 3).await;
    let app = api::api_router(db.clone());
    let token = token_for(&student);

    let request = json!({ "book_id": book_id });
    let (status, _) = send(&app, "POST", "/bookshelves/loans", &token, Some(request.clone())).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, "POST", "/bookshelves/loans", &token, Some(request)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_error(&body, "DUPLICATE_LOAN");
    assert_eq!(load_book(&db, book_id).await.available_copies, 2);
}

#[tokio::test]
async fn test_invalid_transitions_return_422() {
    let db = setup_test_db().await;
    let admin = create_user(&db, "admin", Role::Admin, 2020).await;
    let student = create_user(&db, "siti", Role::Student, 2024).await;
    let book_id = create_book(&db, "Bumi Manusia", 1).await;
    let app = api::api_router(db);
    let token = token_for(&admin);

    let (_, body) = send(
        &app,
        "POST",
        "/bookshelves/loans",
        &token_for(&student),
        Some(json!({ "book_id": book_id })),
    )
    .await;
    let loan_id = body["loan"]["id"].as_i64().unwrap();

    // a pending request has not left the desk yet
    let (status, body) = send(
        &app,
        "POST",
        &format!("/admin/loans/{}/return", loan_id),
        &token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_error(&body, "INVALID_TRANSITION");
    assert_eq!(body["message"], "cannot return a loan that is pending_pickup");
}

#[tokio::test]
async fn test_validation_errors_return_422() {
    let db = setup_test_db().await;
    let admin = create_user(&db, "admin", Role::Admin, 2020).await;
    let student = create_user(&db, "siti", Role::Student, 2024).await;
    let book_id = create_book(&db, "Atlas", 1).await;
    let app = api::api_router(db);
    let token = token_for(&admin);

    let today = chrono::Utc::now().date_naive().to_string();
    let (status, body) = send(
        &app,
        "POST",
        "/admin/loans",
        &token,
        Some(json!({ "user_id": student.id, "book_id": book_id, "due_date": today })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_error(&body, "VALIDATION_FAILED");

    let (status, body) = send(
        &app,
        "POST",
        "/admin/books",
        &token,
        Some(json!({ "title": "   ", "total_copies": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["message"], "title is required");

    let (status, body) = send(
        &app,
        "POST",
        "/admin/users",
        &token,
        Some(json!({
            "name": "Pendek",
            "username": "pendek",
            "password": "123",
            "role": "student",
            "enrollment_year": 2024
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_error(&body, "VALIDATION_FAILED");
}

#[tokio::test]
async fn test_taken_username_returns_422() {
    let db = setup_test_db().await;
    let admin = create_user(&db, "admin", Role::Admin, 2020).await;
    create_user(&db, "budi", Role::Student, 2024).await;
    let app = api::api_router(db);

    let (status, body) = send(
        &app,
        "POST",
        "/admin/users",
        &token_for(&admin),
        Some(json!({
            "name": "Budi Lain",
            "username": "budi",
            "password": "password123",
            "role": "student",
            "enrollment_year": 2024
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_error(&body, "CONFLICT");
    assert_eq!(body["message"], "username is already taken");
}

#[tokio::test]
async fn test_admin_cannot_delete_self() {
    let db = setup_test_db().await;
    let admin = create_user(&db, "admin", Role::Admin, 2020).await;
    let app = api::api_router(db);

    let (status, body) = send(
        &app,
        "DELETE",
        &format!("/admin/users/{}", admin.id),
        &token_for(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_error(&body, "VALIDATION_FAILED");
}
