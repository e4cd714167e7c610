//! Member side: a teacher's or student's own loans

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::api::error::ApiResult;
use crate::auth::Member;
use crate::services::loan_service::{self, Bookshelf, LoanFilter};

#[derive(Deserialize, ToSchema)]
pub struct RequestLoanRequest {
    pub book_id: i32,
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[utoipa::path(
    get,
    path = "/api/bookshelves",
    responses((status = 200, description = "Active loans and returned history")),
    security(("bearer" = []))
)]
pub async fn bookshelf(
    Member(member): Member,
    State(db): State<DatabaseConnection>,
) -> ApiResult<impl IntoResponse> {
    let Bookshelf {
        active_loans,
        loan_history,
    } = loan_service::bookshelf(&db, member.id, Utc::now()).await?;

    Ok(Json(json!({
        "success": true,
        "active_loans": active_loans,
        "loan_history": loan_history
    })))
}

pub async fn my_loans(
    Member(member): Member,
    State(db): State<DatabaseConnection>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<impl IntoResponse> {
    let filter = LoanFilter {
        user_id: Some(member.id),
        page: query.page,
        per_page: query.per_page,
        ..Default::default()
    };
    let page = loan_service::list_loans(&db, filter, Utc::now()).await?;
    Ok(Json(json!({ "success": true, "loans": page })))
}

#[utoipa::path(
    post,
    path = "/api/bookshelves/loans",
    request_body = RequestLoanRequest,
    responses(
        (status = 201, description = "Request placed, copy reserved"),
        (status = 403, description = "Administrators cannot borrow"),
        (status = 422, description = "No copy left or request already open")
    ),
    security(("bearer" = []))
)]
pub async fn request_loan(
    Member(member): Member,
    State(db): State<DatabaseConnection>,
    Json(payload): Json<RequestLoanRequest>,
) -> ApiResult<impl IntoResponse> {
    let loan = loan_service::request_loan(&db, member.id, payload.book_id, Utc::now()).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Loan request submitted. Please pick the book up at the library.",
            "loan": loan
        })),
    ))
}

#[utoipa::path(
    delete,
    path = "/api/bookshelves/loans/{id}",
    params(("id" = i32, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Request cancelled"),
        (status = 403, description = "Not your request"),
        (status = 422, description = "Loan is no longer pending")
    ),
    security(("bearer" = []))
)]
pub async fn cancel_loan(
    Member(member): Member,
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    loan_service::cancel_loan(&db, id, member.id, Utc::now()).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Loan request cancelled"
    })))
}
