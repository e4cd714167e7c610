mod common;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use common::*;
use pustaka::api;
use pustaka::auth::{create_jwt, hash_password};
use pustaka::infrastructure::AppState;
use pustaka::infrastructure::storage::LocalCoverStorage;
use pustaka::models::{Role, user};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::util::ServiceExt; // for `oneshot`

fn app(db: &DatabaseConnection) -> Router {
    let covers = std::env::temp_dir().join(format!("pustaka-covers-{}", std::process::id()));
    let state = AppState::new(db.clone()).with_covers(Arc::new(LocalCoverStorage::new(covers)));
    api::api_router_with_state(state)
}

fn token_for(account: &user::Model) -> String {
    create_jwt(account.id, &account.username, account.role).unwrap()
}

async fn call(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
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
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn raw(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

fn multipart(field: &str, filename: &str, content_type: &str, data: &[u8]) -> (String, Vec<u8>) {
    let boundary = "pustaka-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    (format!("multipart/form-data; boundary={}", boundary), body)
}

#[tokio::test]
async fn test_health_check() {
    let db = setup_test_db().await;
    let (status, body) = call(&app(&db), "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "pustaka");
    assert_eq!(body["database"], "ok");
}

#[tokio::test]
async fn test_login_and_me() {
    let db = setup_test_db().await;
    let account = create_user(&db, "budi", Role::Student, 2024).await;
    let mut active: user::ActiveModel = account.clone().into();
    active.password_hash = Set(hash_password("rahasia123").unwrap());
    active.update(&db).await.unwrap();
    let app = app(&db);

    let (status, _) = call(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "username": "budi", "password": "wrong-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = call(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "username": "budi", "password": "rahasia123" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["member_code"], "2024001");
    assert!(body["user"].get("password_hash").is_none());
    let token = body["token"].as_str().unwrap().to_string();

    let (status, body) = call(&app, "GET", "/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["username"], "budi");
    assert_eq!(body["user"]["role"], "student");
}

#[tokio::test]
async fn test_catalog_hides_deleted_books() {
    let db = setup_test_db().await;
    let admin = create_user(&db, "admin", Role::Admin, 2020).await;
    let app = app(&db);
    let token = token_for(&admin);

    let (status, body) = call(
        &app,
        "POST",
        "/admin/books",
        Some(&token),
        Some(json!({ "title": "Laskar Pelangi", "author": "Andrea Hirata", "total_copies": 2, "category": "fiksi, novel" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["book"]["available_copies"], 2);
    assert_eq!(body["book"]["categories"], json!(["fiksi", "novel"]));
    let book_id = body["book"]["id"].as_i64().unwrap();
    create_book(&db, "Bumi Manusia", 1).await;

    let (status, body) = call(&app, "GET", "/catalog?query=pelangi", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["books"]["total"], 1);
    assert_eq!(body["books"]["items"][0]["title"], "Laskar Pelangi");

    let (status, _) = call(
        &app,
        "DELETE",
        &format!("/admin/books/{}", book_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = call(&app, "GET", "/catalog", None, None).await;
    assert_eq!(body["books"]["total"], 1);
    let (status, _) = call(&app, "GET", &format!("/catalog/{}", book_id), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // still visible to the desk, and restorable
    let (_, body) = call(&app, "GET", "/admin/books?trashed=only", Some(&token), None).await;
    assert_eq!(body["books"]["total"], 1);
    let (status, body) = call(
        &app,
        "POST",
        &format!("/admin/books/{}/restore", book_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["book"]["deleted_at"].is_null());
}

#[tokio::test]
async fn test_loan_flow_over_http() {
    let db = setup_test_db().await;
    let admin = create_user(&db, "admin", Role::Admin, 2020).await;
    let student = create_user(&db, "siti", Role::Student, 2024).await;
    let book_id = create_book(&db, "Negeri 5 Menara", 1).await;
    let app = app(&db);
    let admin_token = token_for(&admin);
    let student_token = token_for(&student);

    let (status, body) = call(
        &app,
        "POST",
        "/bookshelves/loans",
        Some(&student_token),
        Some(json!({ "book_id": book_id })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["loan"]["status"], "pending_pickup");
    let loan_id = body["loan"]["id"].as_i64().unwrap();

    let (_, body) = call(&app, "GET", "/admin/loans/pending", Some(&admin_token), None).await;
    assert_eq!(body["loans"]["total"], 1);
    assert_eq!(body["loans"]["items"][0]["borrower_name"], "siti test");

    let due = (chrono::Utc::now().date_naive() + chrono::Duration::days(7)).to_string();
    let (status, body) = call(
        &app,
        "POST",
        &format!("/admin/loans/{}/approve", loan_id),
        Some(&admin_token),
        Some(json!({ "due_date": due })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["loan"]["status"], "borrowed");

    let (_, body) = call(&app, "GET", "/bookshelves", Some(&student_token), None).await;
    assert_eq!(body["active_loans"].as_array().unwrap().len(), 1);
    assert_eq!(body["active_loans"][0]["book_title"], "Negeri 5 Menara");

    let (_, body) = call(&app, "GET", "/admin/loans/active", Some(&admin_token), None).await;
    assert_eq!(body["loans"]["total"], 1);

    let (status, body) = call(
        &app,
        "POST",
        &format!("/admin/loans/{}/return", loan_id),
        Some(&admin_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["loan"]["status"], "returned");
    assert_eq!(body["loan"]["fine_amount"], 0);
    assert_eq!(load_book(&db, book_id).await.available_copies, 1);

    let (_, body) = call(&app, "GET", "/my/loans", Some(&student_token), None).await;
    assert_eq!(body["loans"]["total"], 1);
    assert_eq!(body["loans"]["items"][0]["status"], "returned");

    let (status, body) = call(&app, "GET", "/admin/dashboard", Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stats"]["total_titles"], 1);
    assert_eq!(body["stats"]["loans"]["returned"], 1);
    assert_eq!(body["stats"]["top_books"][0]["title"], "Negeri 5 Menara");
    assert_eq!(body["stats"]["members"]["student"], 1);
}

#[tokio::test]
async fn test_member_cancels_own_request() {
    let db = setup_test_db().await;
    let student = create_user(&db, "siti", Role::Student, 2024).await;
    let book_id = create_book(&db, "Atlas", 2).await;
    let app = app(&db);
    let token = token_for(&student);

    let (_, body) = call(
        &app,
        "POST",
        "/bookshelves/loans",
        Some(&token),
        Some(json!({ "book_id": book_id })),
    )
    .await;
    let loan_id = body["loan"]["id"].as_i64().unwrap();
    assert_eq!(load_book(&db, book_id).await.available_copies, 1);

    let (status, _) = call(
        &app,
        "DELETE",
        &format!("/bookshelves/loans/{}", loan_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(load_book(&db, book_id).await.available_copies, 2);
    assert!(load_loan(&db, loan_id as i32).await.is_none());
}

#[tokio::test]
async fn test_direct_loan_and_overdue_check() {
    let db = setup_test_db().await;
    let admin = create_user(&db, "admin", Role::Admin, 2020).await;
    let teacher = create_user(&db, "ratna", Role::Teacher, 2018).await;
    let book_id = create_book(&db, "Fisika Dasar", 3).await;
    let app = app(&db);
    let token = token_for(&admin);

    let due = (chrono::Utc::now().date_naive() + chrono::Duration::days(14)).to_string();
    let (status, body) = call(
        &app,
        "POST",
        "/admin/loans",
        Some(&token),
        Some(json!({ "user_id": teacher.id, "book_id": book_id, "due_date": due })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["loan"]["status"], "borrowed");
    assert_eq!(load_book(&db, book_id).await.available_copies, 2);

    let (status, body) = call(&app, "POST", "/admin/loans/check-overdue", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["updated"], 0);
}

#[tokio::test]
async fn test_bulk_stock_and_reconcile() {
    let db = setup_test_db().await;
    let admin = create_user(&db, "admin", Role::Admin, 2020).await;
    let student = create_user(&db, "siti", Role::Student, 2024).await;
    let a = create_book(&db, "A", 2).await;
    let b = create_book(&db, "B", 2).await;
    let app = app(&db);
    let token = token_for(&admin);

    call(
        &app,
        "POST",
        "/bookshelves/loans",
        Some(&token_for(&student)),
        Some(json!({ "book_id": a })),
    )
    .await;

    let (_, body) = call(&app, "GET", "/admin/books/ids", Some(&token), None).await;
    assert_eq!(body["ids"], json!([a, b]));

    let (status, body) = call(
        &app,
        "POST",
        "/admin/books/bulk-stock",
        Some(&token),
        Some(json!({ "book_ids": [a, b], "total_copies": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["updated"], 2);
    assert_eq!(load_book(&db, a).await.available_copies, 5);

    let (_, body) = call(&app, "POST", "/admin/books/reconcile", Some(&token), None).await;
    assert_eq!(body["changed"], 1);
    assert_eq!(load_book(&db, a).await.available_copies, 4);

    let (status, body) = call(
        &app,
        "POST",
        "/admin/books/bulk-delete",
        Some(&token),
        Some(json!({ "book_ids": [b] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], 1);
}

#[tokio::test]
async fn test_books_csv_import_and_export() {
    let db = setup_test_db().await;
    let admin = create_user(&db, "admin", Role::Admin, 2020).await;
    let app = app(&db);
    let token = token_for(&admin);

    let csv = "judul,penulis,eksemplar,ketersediaan\nSang Pemimpi,Andrea Hirata,3,\n,Anonim,1,1\n";
    let (content_type, body) = multipart("file", "buku.csv", "text/csv", csv.as_bytes());
    let request = Request::builder()
        .method("POST")
        .uri("/admin/books/import")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(body))
        .unwrap();
    let (status, bytes) = raw(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    let summary: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(summary["imported"], 1);
    assert_eq!(summary["skipped"][0]["line"], 3);

    let request = Request::builder()
        .uri("/admin/books/export")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let (status, bytes) = raw(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(bytes).unwrap();
    assert!(text.starts_with("title,author,publisher"));
    assert!(text.contains("Sang Pemimpi,Andrea Hirata"));
    assert!(text.contains(",3,3,"));
}

#[tokio::test]
async fn test_cover_upload_validation() {
    let db = setup_test_db().await;
    let admin = create_user(&db, "admin", Role::Admin, 2020).await;
    let book_id = create_book(&db, "Sang Pemimpi", 1).await;
    let app = app(&db);
    let token = token_for(&admin);

    let upload = |content_type: &str, data: &[u8]| {
        let (ct, body) = multipart("cover", "cover.bin", content_type, data);
        Request::builder()
            .method("POST")
            .uri(format!("/admin/books/{}/cover", book_id))
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, ct)
            .body(Body::from(body))
            .unwrap()
    };

    let (status, _) = raw(&app, upload("application/pdf", b"%PDF-1.4")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let too_big = vec![0u8; 2048 * 1024 + 1];
    let (status, _) = raw(&app, upload("image/png", &too_big)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, bytes) = raw(&app, upload("image/png", b"\x89PNG fake")).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    let url = body["book"]["cover_url"].as_str().unwrap();
    assert!(url.starts_with("/storage/covers/sang-pemimpi-"));
    assert!(url.ends_with(".png"));
}

#[tokio::test]
async fn test_seed_is_idempotent() {
    let db = setup_test_db().await;

    assert!(pustaka::seed::seed_demo_data(&db).await.unwrap());
    assert!(!pustaka::seed::seed_demo_data(&db).await.unwrap());

    let admin = pustaka::infrastructure::SeaOrmUserRepository::new(db.clone());
    let admin = pustaka::domain::UserRepository::find_by_username(&admin, "admin")
        .await
        .unwrap()
        .unwrap();
    let (status, body) = call(&app(&db), "GET", "/admin/dashboard", Some(&token_for(&admin)), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stats"]["total_titles"], 6);
    assert_eq!(body["stats"]["loans"]["pending_pickup"], 1);
    assert_eq!(body["stats"]["loans"]["borrowed"], 2);
    assert_eq!(body["stats"]["members"]["student"], 2);
    // 23 copies, three of them reserved or out
    assert_eq!(body["stats"]["total_copies"], 23);
    assert_eq!(body["stats"]["available_copies"], 20);
}

#[tokio::test]
async fn test_loans_csv_export() {
    let db = setup_test_db().await;
    let admin = create_user(&db, "admin", Role::Admin, 2020).await;
    let student = create_user(&db, "siti", Role::Student, 2024).await;
    let book_id = create_book(&db, "Matematika, Kelas X", 2).await;
    let app = app(&db);

    let (status, _) = call(
        &app,
        "POST",
        "/bookshelves/loans",
        Some(&token_for(&student)),
        Some(json!({ "book_id": book_id })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let request = Request::builder()
        .uri("/admin/loans/export")
        .header(header::AUTHORIZATION, format!("Bearer {}", token_for(&admin)))
        .body(Body::empty())
        .unwrap();
    let (status, bytes) = raw(&app, request).await;
    assert_eq!(status, StatusCode::OK);

    let text = String::from_utf8(bytes).unwrap();
    let mut lines = text.lines();
    assert_eq!(
        lines.next(),
        Some(
            "id,book_title,borrower,member_code,status,request_date,approval_date,due_date,return_date,fine_amount"
        )
    );
    let row = lines.next().unwrap();
    assert!(row.contains("\"Matematika, Kelas X\",siti test,2024001,pending_pickup"));
    assert!(row.ends_with(",,,,0"));
    assert!(lines.next().is_none());
}
