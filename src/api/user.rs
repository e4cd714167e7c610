use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;

use crate::api::error::ApiResult;
use crate::auth::{AdminUser, hash_password};
use crate::domain::{DomainError, NewUser, UserFilter, UserUpdate};
use crate::infrastructure::AppState;
use crate::models::User;

#[utoipa::path(
    get,
    path = "/api/admin/users",
    params(
        ("query" = Option<String>, Query, description = "Name, username or member code"),
        ("role" = Option<crate::models::Role>, Query, description = "Role filter"),
        ("page" = Option<u64>, Query, description = "1-based page")
    ),
    responses((status = 200, description = "One page of accounts")),
    security(("bearer" = []))
)]
pub async fn list_users(
    _admin: AdminUser,
    State(state): State<AppState>,
    Query(filter): Query<UserFilter>,
) -> ApiResult<impl IntoResponse> {
    let page = state.user_repo.find_all(filter).await?;
    Ok(Json(json!({ "success": true, "users": page })))
}

pub async fn get_user(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    let account = state
        .user_repo
        .find_by_id(id)
        .await?
        .ok_or(DomainError::NotFound("user"))?;
    Ok(Json(json!({ "success": true, "user": User::from(account) })))
}

#[utoipa::path(
    post,
    path = "/api/admin/users",
    request_body = NewUser,
    responses(
        (status = 201, description = "Account created with a fresh member code", body = User),
        (status = 422, description = "Invalid input or username taken")
    ),
    security(("bearer" = []))
)]
pub async fn create_user(
    _admin: AdminUser,
    State(state): State<AppState>,
    Json(input): Json<NewUser>,
) -> ApiResult<impl IntoResponse> {
    input.validate()?;
    let password_hash = hash_password(&input.password).map_err(DomainError::Internal)?;
    let account = state.user_repo.create(input, password_hash).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "User created successfully",
            "user": account
        })),
    ))
}

#[utoipa::path(
    put,
    path = "/api/admin/users/{id}",
    params(("id" = i32, Path, description = "User ID")),
    request_body = UserUpdate,
    responses(
        (status = 200, description = "Account updated", body = User),
        (status = 404, description = "User not found"),
        (status = 422, description = "Invalid input or username taken")
    ),
    security(("bearer" = []))
)]
pub async fn update_user(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(input): Json<UserUpdate>,
) -> ApiResult<impl IntoResponse> {
    input.validate()?;
    let password_hash = match input.new_password() {
        Some(password) => Some(hash_password(password).map_err(DomainError::Internal)?),
        None => None,
    };
    let account = state.user_repo.update(id, input, password_hash).await?;

    Ok(Json(json!({
        "success": true,
        "message": "User updated successfully",
        "user": account
    })))
}

pub async fn delete_user(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    if admin.id == id {
        return Err(DomainError::Validation("you cannot delete your own account".to_string()).into());
    }
    state.user_repo.soft_delete(id).await?;
    tracing::info!(user_id = id, by = admin.id, "user moved to trash");
    Ok(Json(json!({
        "success": true,
        "message": "User deleted successfully"
    })))
}

pub async fn restore_user(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    let account = state.user_repo.restore(id).await?;
    Ok(Json(json!({
        "success": true,
        "message": "User restored successfully",
        "user": account
    })))
}
