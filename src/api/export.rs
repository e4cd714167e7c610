//! CSV import and export

use axum::{
    Json,
    extract::{Multipart, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::IntoResponse,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde_json::json;

use crate::api::books::bad_multipart;
use crate::api::error::ApiResult;
use crate::auth::AdminUser;
use crate::domain::DomainError;
use crate::infrastructure::AppState;
use crate::services::{book_service, report_service};

fn csv_attachment(prefix: &str, body: Vec<u8>) -> impl IntoResponse {
    let filename = format!("{}_{}.csv", prefix, Utc::now().format("%Y-%m-%d"));

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/csv; charset=utf-8"),
    );
    if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename)) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    (StatusCode::OK, headers, body)
}

#[utoipa::path(
    get,
    path = "/api/admin/books/export",
    responses((status = 200, description = "Catalog as CSV", content_type = "text/csv")),
    security(("bearer" = []))
)]
pub async fn export_books(
    _admin: AdminUser,
    State(db): State<DatabaseConnection>,
) -> ApiResult<impl IntoResponse> {
    let body = book_service::export_books_csv(&db).await?;
    Ok(csv_attachment("books", body))
}

#[utoipa::path(
    get,
    path = "/api/admin/loans/export",
    responses((status = 200, description = "All loans as CSV", content_type = "text/csv")),
    security(("bearer" = []))
)]
pub async fn export_loans(
    _admin: AdminUser,
    State(db): State<DatabaseConnection>,
) -> ApiResult<impl IntoResponse> {
    let body = report_service::export_loans_csv(&db, Utc::now()).await?;
    Ok(csv_attachment("loans", body))
}

/// Multipart upload of a CSV file in the `file` field.
pub async fn import_books(
    _admin: AdminUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        if field.name() != Some("file") {
            continue;
        }
        let bytes = field.bytes().await.map_err(bad_multipart)?;
        let summary = book_service::import_books_csv(state.book_repo.as_ref(), &bytes).await?;

        return Ok(Json(json!({
            "success": true,
            "message": format!("{} books imported", summary.imported),
            "imported": summary.imported,
            "skipped": summary.skipped
        })));
    }

    Err(DomainError::Validation("a CSV file is required".to_string()).into())
}
