use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

use crate::api::error::{ApiError, ApiResult};
use crate::auth::{CurrentUser, create_jwt, verify_password};
use crate::domain::DomainError;
use crate::infrastructure::AppState;
use crate::models::User;

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    success: bool,
    token: String,
    user: User,
}

fn invalid_credentials() -> ApiError {
    ApiError(DomainError::Unauthorized("Invalid credentials".to_string()))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = LoginResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    tracing::info!(username = %payload.username, "login attempt");

    let Some(account) = state.user_repo.find_by_username(&payload.username).await? else {
        tracing::warn!(username = %payload.username, "login for unknown or removed account");
        return Err(invalid_credentials());
    };

    match verify_password(&payload.password, &account.password_hash) {
        Ok(true) => {
            let token = create_jwt(account.id, &account.username, account.role)
                .map_err(DomainError::Internal)?;
            tracing::info!(user_id = account.id, "login succeeded");
            Ok((
                StatusCode::OK,
                Json(LoginResponse {
                    success: true,
                    token,
                    user: User::from(account),
                }),
            ))
        }
        _ => {
            tracing::warn!(user_id = account.id, "password verification failed");
            Err(invalid_credentials())
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "The signed-in account", body = User),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer" = []))
)]
pub async fn get_me(CurrentUser(account): CurrentUser) -> impl IntoResponse {
    Json(json!({
        "success": true,
        "user": User::from(account),
    }))
}
