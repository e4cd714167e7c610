use axum::{Json, extract::State, response::IntoResponse};
use chrono::Utc;
use serde_json::json;

use crate::api::error::ApiResult;
use crate::auth::AdminUser;
use crate::infrastructure::AppState;
use crate::services::report_service::{self, DashboardStats};

#[utoipa::path(
    get,
    path = "/api/admin/dashboard",
    responses((status = 200, description = "Collection and circulation figures", body = DashboardStats)),
    security(("bearer" = []))
)]
pub async fn dashboard(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> ApiResult<impl IntoResponse> {
    let stats =
        report_service::dashboard(state.db(), Utc::now(), state.loans.fine_per_day).await?;
    Ok(Json(json!({ "success": true, "stats": stats })))
}
