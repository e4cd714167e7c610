//! Domain error types
//!
//! These errors are framework-agnostic and represent business-level failures.

use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

use crate::models::LoanStatus;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed or missing input
    #[error("{0}")]
    Validation(String),

    /// Stale or unknown id
    #[error("{0} not found")]
    NotFound(&'static str),

    /// No copy left to reserve
    #[error("book is not available for borrowing")]
    BookUnavailable,

    /// The borrower already holds an active loan for this book
    #[error("an active loan or request already exists for this book")]
    DuplicateLoan,

    /// Loan is in the wrong state for the requested transition
    #[error("cannot {action} a loan that is {status}")]
    InvalidTransition {
        action: &'static str,
        status: LoanStatus,
    },

    /// Caller lacks the role or ownership for the operation
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Unauthorized(String),

    /// Unique constraint on a user-supplied field
    #[error("{0}")]
    Conflict(String),

    /// Database/persistence error
    #[error("database error: {0}")]
    Database(String),

    /// File storage error
    #[error("storage error: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl DomainError {
    /// Business-rule failures the caller can act on (HTTP 422).
    pub fn is_business_rule(&self) -> bool {
        matches!(
            self,
            DomainError::Validation(_)
                | DomainError::BookUnavailable
                | DomainError::DuplicateLoan
                | DomainError::InvalidTransition { .. }
        )
    }

    /// Infrastructure failures; details stay in the logs.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            DomainError::Database(_) | DomainError::Storage(_) | DomainError::Internal(_)
        )
    }
}

// Conversion from SeaORM errors (used in infrastructure layer)
impl From<DbErr> for DomainError {
    fn from(e: DbErr) -> Self {
        match e.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) => DomainError::Conflict(detail),
            _ => DomainError::Database(e.to_string()),
        }
    }
}

impl From<std::io::Error> for DomainError {
    fn from(e: std::io::Error) -> Self {
        DomainError::Storage(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_user_facing() {
        assert_eq!(DomainError::NotFound("loan").to_string(), "loan not found");
        assert_eq!(
            DomainError::InvalidTransition {
                action: "approve",
                status: LoanStatus::Returned,
            }
            .to_string(),
            "cannot approve a loan that is returned"
        );
    }

    #[test]
    fn classification() {
        assert!(DomainError::BookUnavailable.is_business_rule());
        assert!(DomainError::DuplicateLoan.is_business_rule());
        assert!(!DomainError::NotFound("book").is_business_rule());
        assert!(DomainError::Database("locked".into()).is_infrastructure());
        assert!(!DomainError::Forbidden("no".into()).is_infrastructure());
    }
}
