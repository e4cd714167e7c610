use axum::{Json, extract::State, response::IntoResponse};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::api::error::ApiResult;
use crate::auth::AdminUser;
use crate::domain::DomainError;
use crate::infrastructure::AppState;

#[derive(Deserialize, ToSchema)]
pub struct BulkDeleteRequest {
    pub book_ids: Vec<i32>,
}

#[derive(Deserialize, ToSchema)]
pub struct BulkStockRequest {
    pub book_ids: Vec<i32>,
    pub total_copies: i32,
}

fn require_selection(ids: &[i32]) -> Result<(), DomainError> {
    if ids.is_empty() {
        return Err(DomainError::Validation(
            "select at least one book".to_string(),
        ));
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/api/admin/books/bulk-delete",
    request_body = BulkDeleteRequest,
    responses(
        (status = 200, description = "Selected books moved to trash"),
        (status = 422, description = "Empty selection")
    ),
    security(("bearer" = []))
)]
pub async fn bulk_delete(
    _admin: AdminUser,
    State(state): State<AppState>,
    Json(payload): Json<BulkDeleteRequest>,
) -> ApiResult<impl IntoResponse> {
    require_selection(&payload.book_ids)?;
    let deleted = state.book_repo.soft_delete_many(&payload.book_ids).await?;
    tracing::info!(deleted, requested = payload.book_ids.len(), "bulk delete");

    Ok(Json(json!({
        "success": true,
        "message": format!("{} books deleted", deleted),
        "deleted": deleted
    })))
}

/// Sets the owned count of every selected book. Availability is reset to
/// the same number, as after a physical stock-take.
#[utoipa::path(
    post,
    path = "/api/admin/books/bulk-stock",
    request_body = BulkStockRequest,
    responses(
        (status = 200, description = "Stock updated"),
        (status = 422, description = "Empty selection or negative count")
    ),
    security(("bearer" = []))
)]
pub async fn bulk_stock(
    _admin: AdminUser,
    State(state): State<AppState>,
    Json(payload): Json<BulkStockRequest>,
) -> ApiResult<impl IntoResponse> {
    require_selection(&payload.book_ids)?;
    let updated = state
        .book_repo
        .update_stock_many(&payload.book_ids, payload.total_copies)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": format!("Stock updated for {} books", updated),
        "updated": updated
    })))
}
