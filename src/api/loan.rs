//! Circulation desk: administrator-side loan handling

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{NaiveDate, Utc};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::api::error::ApiResult;
use crate::auth::AdminUser;
use crate::infrastructure::AppState;
use crate::models::{LoanStatus, LoanView};
use crate::services::loan_service::{self, LoanFilter};
use crate::utils::start_of_day;

#[derive(Deserialize, ToSchema)]
pub struct ApproveLoanRequest {
    /// Calendar day the copy is due back; must be after today
    pub due_date: NaiveDate,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateLoanRequest {
    pub user_id: i32,
    pub book_id: i32,
    pub due_date: NaiveDate,
}

#[utoipa::path(
    get,
    path = "/api/admin/loans",
    params(
        ("status" = Option<LoanStatus>, Query, description = "Only loans in this state"),
        ("user_id" = Option<i32>, Query, description = "Only this borrower"),
        ("page" = Option<u64>, Query, description = "1-based page, 10 per page")
    ),
    responses((status = 200, description = "Loans, newest first")),
    security(("bearer" = []))
)]
pub async fn list_loans(
    _admin: AdminUser,
    State(db): State<DatabaseConnection>,
    Query(filter): Query<LoanFilter>,
) -> ApiResult<impl IntoResponse> {
    let page = loan_service::list_loans(&db, filter, Utc::now()).await?;
    Ok(Json(json!({ "success": true, "loans": page })))
}

/// Requests waiting for pickup
pub async fn list_pending(
    _admin: AdminUser,
    State(db): State<DatabaseConnection>,
    Query(mut filter): Query<LoanFilter>,
) -> ApiResult<impl IntoResponse> {
    filter.statuses = Some(vec![LoanStatus::PendingPickup]);
    let page = loan_service::list_loans(&db, filter, Utc::now()).await?;
    Ok(Json(json!({ "success": true, "loans": page })))
}

/// Copies currently out, late or not
pub async fn list_active(
    _admin: AdminUser,
    State(db): State<DatabaseConnection>,
    Query(mut filter): Query<LoanFilter>,
) -> ApiResult<impl IntoResponse> {
    filter.statuses = Some(vec![LoanStatus::Borrowed, LoanStatus::Overdue]);
    let page = loan_service::list_loans(&db, filter, Utc::now()).await?;
    Ok(Json(json!({ "success": true, "loans": page })))
}

#[utoipa::path(
    get,
    path = "/api/admin/loans/{id}",
    params(("id" = i32, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Loan detail", body = LoanView),
        (status = 404, description = "Loan not found")
    ),
    security(("bearer" = []))
)]
pub async fn get_loan(
    _admin: AdminUser,
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    let loan = loan_service::get_loan(&db, id, Utc::now()).await?;
    Ok(Json(json!({ "success": true, "loan": loan })))
}

#[utoipa::path(
    post,
    path = "/api/admin/loans",
    request_body = CreateLoanRequest,
    responses(
        (status = 201, description = "Copy handed over"),
        (status = 422, description = "Unavailable, duplicate or bad due date")
    ),
    security(("bearer" = []))
)]
pub async fn create_loan(
    AdminUser(admin): AdminUser,
    State(db): State<DatabaseConnection>,
    Json(payload): Json<CreateLoanRequest>,
) -> ApiResult<impl IntoResponse> {
    let loan = loan_service::create_direct_loan(
        &db,
        admin.id,
        payload.user_id,
        payload.book_id,
        start_of_day(payload.due_date),
        Utc::now(),
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Loan created successfully",
            "loan": loan
        })),
    ))
}

#[utoipa::path(
    post,
    path = "/api/admin/loans/{id}/approve",
    params(("id" = i32, Path, description = "Loan ID")),
    request_body = ApproveLoanRequest,
    responses(
        (status = 200, description = "Loan approved"),
        (status = 422, description = "Loan is not pending or due date not after today")
    ),
    security(("bearer" = []))
)]
pub async fn approve_loan(
    AdminUser(admin): AdminUser,
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
    Json(payload): Json<ApproveLoanRequest>,
) -> ApiResult<impl IntoResponse> {
    let loan = loan_service::approve_loan(
        &db,
        id,
        admin.id,
        start_of_day(payload.due_date),
        Utc::now(),
    )
    .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Loan approved",
        "loan": loan
    })))
}

#[utoipa::path(
    post,
    path = "/api/admin/loans/{id}/return",
    params(("id" = i32, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Copy returned, fine computed"),
        (status = 422, description = "Loan is not out")
    ),
    security(("bearer" = []))
)]
pub async fn return_loan(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    let loan =
        loan_service::return_loan(state.db(), id, Utc::now(), state.loans.fine_per_day).await?;
    let message = if loan.fine_amount > 0 {
        format!("Book returned with a fine of {}", loan.fine_amount)
    } else {
        "Book returned".to_string()
    };

    Ok(Json(json!({
        "success": true,
        "message": message,
        "loan": loan
    })))
}

#[utoipa::path(
    post,
    path = "/api/admin/loans/{id}/reject",
    params(("id" = i32, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Request rejected and removed"),
        (status = 422, description = "Loan is not pending")
    ),
    security(("bearer" = []))
)]
pub async fn reject_loan(
    _admin: AdminUser,
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    loan_service::reject_loan(&db, id, Utc::now()).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Loan request rejected"
    })))
}

#[utoipa::path(
    post,
    path = "/api/admin/loans/check-overdue",
    responses((status = 200, description = "Number of loans marked overdue")),
    security(("bearer" = []))
)]
pub async fn check_overdue(
    _admin: AdminUser,
    State(db): State<DatabaseConnection>,
) -> ApiResult<impl IntoResponse> {
    let updated = loan_service::sweep_overdue(&db, Utc::now()).await?;
    Ok(Json(json!({
        "success": true,
        "message": format!("{} loans marked as overdue", updated),
        "updated": updated
    })))
}

pub async fn reconcile(
    _admin: AdminUser,
    State(db): State<DatabaseConnection>,
) -> ApiResult<impl IntoResponse> {
    let changed = loan_service::reconcile_availability(&db).await?;
    Ok(Json(json!({
        "success": true,
        "message": format!("Availability corrected for {} books", changed),
        "changed": changed
    })))
}
