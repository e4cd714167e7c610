//! Repository trait definitions
//!
//! These traits define the contract for data access.
//! Implementations live in the infrastructure layer.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::DomainError;
use crate::models::book::{self, Book, CoverType};
use crate::models::user::{self, Role, User};

pub const DEFAULT_PER_PAGE: u64 = 10;
pub const MAX_PER_PAGE: u64 = 100;

/// One page of a listing. `page` is 1-based.
#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub last_page: u64,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, total: u64, page: u64, per_page: u64) -> Self {
        let last_page = total.div_ceil(per_page.max(1)).max(1);
        Self {
            items,
            total,
            page,
            per_page,
            last_page,
        }
    }
}

/// Normalizes user-supplied paging to `(page >= 1, 1 <= per_page <= MAX_PER_PAGE)`.
pub fn page_params(page: Option<u64>, per_page: Option<u64>) -> (u64, u64) {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE);
    (page, per_page)
}

/// Which rows a listing sees with respect to soft deletion
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Trashed {
    #[default]
    Without,
    With,
    Only,
}

/// Filter criteria for book queries
#[derive(Debug, Default, Clone, Deserialize)]
pub struct BookFilter {
    /// Substring over title, author, publisher, isbn and category
    pub query: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub only_available: bool,
    #[serde(default)]
    pub trashed: Trashed,
    /// `title_asc`, `title_desc`, `recent`, `year_desc`
    pub sort: Option<String>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

/// Input for creating or updating a book
#[derive(Debug, Default, Clone, Deserialize, ToSchema)]
pub struct BookInput {
    pub title: String,
    pub author: Option<String>,
    pub publisher: Option<String>,
    pub publication_year: Option<i32>,
    pub isbn: Option<String>,
    pub call_number: Option<String>,
    pub collection_origin: Option<String>,
    pub publication_city: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub total_copies: Option<i32>,
    /// Defaults to `total_copies` on create
    pub available_copies: Option<i32>,
    pub cover: Option<String>,
    pub cover_type: Option<CoverType>,
}

impl BookInput {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.title.trim().is_empty() {
            return Err(DomainError::Validation("title is required".to_string()));
        }
        if let Some(year) = self.publication_year
            && !(1000..=9999).contains(&year)
        {
            return Err(DomainError::Validation(
                "publication_year must be a four-digit year".to_string(),
            ));
        }
        if self.total_copies.is_some_and(|n| n < 0) {
            return Err(DomainError::Validation(
                "total_copies cannot be negative".to_string(),
            ));
        }
        if let Some(available) = self.available_copies {
            let total = self.total_copies.unwrap_or(available);
            if available < 0 || available > total {
                return Err(DomainError::Validation(
                    "available_copies must be between 0 and total_copies".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Repository trait for Book entity
#[async_trait]
pub trait BookRepository: Send + Sync {
    /// Find all books matching the filter criteria with pagination support
    async fn find_all(&self, filter: BookFilter) -> Result<Paginated<Book>, DomainError>;

    /// Find a single book by ID, soft-deleted rows included
    async fn find_by_id(&self, id: i32) -> Result<Option<book::Model>, DomainError>;

    /// Ids of every book that is not soft-deleted
    async fn all_ids(&self) -> Result<Vec<i32>, DomainError>;

    async fn create(&self, input: BookInput) -> Result<Book, DomainError>;

    async fn update(&self, id: i32, input: BookInput) -> Result<Book, DomainError>;

    async fn set_cover(
        &self,
        id: i32,
        cover: Option<String>,
        cover_type: CoverType,
    ) -> Result<Book, DomainError>;

    async fn soft_delete(&self, id: i32) -> Result<(), DomainError>;

    async fn restore(&self, id: i32) -> Result<Book, DomainError>;

    async fn soft_delete_many(&self, ids: &[i32]) -> Result<u64, DomainError>;

    /// Sets `total_copies` and resets `available_copies` to the same value
    async fn update_stock_many(&self, ids: &[i32], total_copies: i32)
    -> Result<u64, DomainError>;
}

/// Filter criteria for user queries
#[derive(Debug, Default, Clone, Deserialize)]
pub struct UserFilter {
    /// Substring over name, username and member code
    pub query: Option<String>,
    pub role: Option<Role>,
    #[serde(default)]
    pub trashed: Trashed,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewUser {
    pub name: String,
    pub username: String,
    pub password: String,
    pub role: Role,
    pub enrollment_year: i32,
    pub gender: Option<String>,
    pub major: Option<String>,
    pub phone: Option<String>,
    pub photo: Option<String>,
}

/// Partial update; `None` leaves the field unchanged
#[derive(Debug, Default, Clone, Deserialize, ToSchema)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
    pub enrollment_year: Option<i32>,
    pub gender: Option<String>,
    pub major: Option<String>,
    pub phone: Option<String>,
    pub photo: Option<String>,
}

pub const MIN_PASSWORD_LEN: usize = 8;

fn validate_enrollment_year(year: i32) -> Result<(), DomainError> {
    if (1900..=9999).contains(&year) {
        Ok(())
    } else {
        Err(DomainError::Validation(
            "enrollment_year must be a four-digit year".to_string(),
        ))
    }
}

fn validate_password(password: &str) -> Result<(), DomainError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(DomainError::Validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

impl NewUser {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() || self.name.chars().count() > 255 {
            return Err(DomainError::Validation(
                "name is required (max 255 characters)".to_string(),
            ));
        }
        if self.username.trim().is_empty() || self.username.chars().count() > 255 {
            return Err(DomainError::Validation(
                "username is required (max 255 characters)".to_string(),
            ));
        }
        validate_password(&self.password)?;
        validate_enrollment_year(self.enrollment_year)
    }
}

impl UserUpdate {
    /// The replacement password; blank means "keep the current one".
    pub fn new_password(&self) -> Option<&str> {
        self.password.as_deref().filter(|p| !p.is_empty())
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if let Some(name) = &self.name
            && name.trim().is_empty()
        {
            return Err(DomainError::Validation("name cannot be empty".to_string()));
        }
        if let Some(username) = &self.username
            && username.trim().is_empty()
        {
            return Err(DomainError::Validation(
                "username cannot be empty".to_string(),
            ));
        }
        if let Some(password) = self.new_password() {
            validate_password(password)?;
        }
        if let Some(year) = self.enrollment_year {
            validate_enrollment_year(year)?;
        }
        Ok(())
    }
}

/// Repository trait for User entity
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_all(&self, filter: UserFilter) -> Result<Paginated<User>, DomainError>;

    /// Find a user by ID, soft-deleted rows included
    async fn find_by_id(&self, id: i32) -> Result<Option<user::Model>, DomainError>;

    /// Active (not soft-deleted) account with this login handle
    async fn find_by_username(&self, username: &str) -> Result<Option<user::Model>, DomainError>;

    /// Inserts the account and allocates its member code in one transaction.
    /// `password_hash` is already hashed.
    async fn create(&self, input: NewUser, password_hash: String) -> Result<User, DomainError>;

    async fn update(
        &self,
        id: i32,
        input: UserUpdate,
        password_hash: Option<String>,
    ) -> Result<User, DomainError>;

    async fn soft_delete(&self, id: i32) -> Result<(), DomainError>;

    async fn restore(&self, id: i32) -> Result<User, DomainError>;
}
