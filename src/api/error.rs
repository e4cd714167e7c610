use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::domain::DomainError;

/// HTTP face of a `DomainError`
#[derive(Debug)]
pub struct ApiError(pub DomainError);

pub type ApiResult<T> = Result<T, ApiError>;

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        ApiError(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            DomainError::NotFound(_) => StatusCode::NOT_FOUND,
            DomainError::Forbidden(_) => StatusCode::FORBIDDEN,
            DomainError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            DomainError::Conflict(_) => StatusCode::UNPROCESSABLE_ENTITY,
            e if e.is_business_rule() => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match &self.0 {
            DomainError::Validation(_) => "VALIDATION_FAILED",
            DomainError::NotFound(_) => "NOT_FOUND",
            DomainError::BookUnavailable => "BOOK_UNAVAILABLE",
            DomainError::DuplicateLoan => "DUPLICATE_LOAN",
            DomainError::InvalidTransition { .. } => "INVALID_TRANSITION",
            DomainError::Forbidden(_) => "FORBIDDEN",
            DomainError::Unauthorized(_) => "UNAUTHORIZED",
            DomainError::Conflict(_) => "CONFLICT",
            DomainError::Database(_) | DomainError::Storage(_) | DomainError::Internal(_) => {
                "INTERNAL_ERROR"
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if self.0.is_infrastructure() {
            tracing::error!(error = %self.0, "request failed");
            "Something went wrong, please try again later".to_string()
        } else {
            tracing::debug!(error = %self.0, status = status.as_u16(), "request rejected");
            self.0.to_string()
        };

        (
            status,
            Json(json!({
                "success": false,
                "message": message,
                "code": self.code(),
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LoanStatus;

    #[test]
    fn business_rules_map_to_422() {
        for e in [
            DomainError::BookUnavailable,
            DomainError::DuplicateLoan,
            DomainError::Validation("bad".into()),
            DomainError::InvalidTransition {
                action: "approve",
                status: LoanStatus::Borrowed,
            },
        ] {
            assert_eq!(ApiError(e).status(), StatusCode::UNPROCESSABLE_ENTITY);
        }
    }

    #[test]
    fn infrastructure_errors_are_500() {
        assert_eq!(
            ApiError(DomainError::Database("disk I/O error".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError(DomainError::NotFound("loan")).status(),
            StatusCode::NOT_FOUND
        );
    }
}
