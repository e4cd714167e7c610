use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Where `cover` points to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(8))")]
#[serde(rename_all = "lowercase")]
pub enum CoverType {
    /// Path inside the cover storage directory
    #[default]
    #[sea_orm(string_value = "upload")]
    Upload,
    /// External URL, used as-is
    #[sea_orm(string_value = "url")]
    Url,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "books")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
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
    pub category: Option<String>, // comma-separated
    /// Copies owned by the library
    pub total_copies: i32,
    /// Copies that can still be requested; 0 <= available_copies <= total_copies
    pub available_copies: i32,
    pub cover: Option<String>,
    pub cover_type: CoverType,
    pub deleted_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::loan::Entity")]
    Loans,
}

impl Related<super::loan::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Loans.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_available(&self) -> bool {
        self.deleted_at.is_none() && self.available_copies > 0
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Public URL of the cover, resolving uploaded files under `/storage`.
    pub fn cover_url(&self) -> Option<String> {
        let cover = self.cover.as_deref().filter(|c| !c.is_empty())?;
        Some(match self.cover_type {
            CoverType::Url => cover.to_string(),
            CoverType::Upload => format!("/storage/{}", cover),
        })
    }

    pub fn categories(&self) -> Vec<String> {
        self.category
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect()
    }
}

// DTO for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub author: Option<String>,
    pub publisher: Option<String>,
    pub publication_year: Option<i32>,
    pub isbn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_origin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publication_city: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub categories: Vec<String>,
    pub total_copies: i32,
    pub available_copies: i32,
    pub is_available: bool,
    pub cover_type: CoverType,
    pub cover_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Model> for Book {
    fn from(model: Model) -> Self {
        let categories = model.categories();
        let cover_url = model.cover_url();
        let is_available = model.is_available();

        Self {
            id: model.id,
            title: model.title,
            author: model.author,
            publisher: model.publisher,
            publication_year: model.publication_year,
            isbn: model.isbn,
            call_number: model.call_number,
            collection_origin: model.collection_origin,
            publication_city: model.publication_city,
            location: model.location,
            description: model.description,
            categories,
            total_copies: model.total_copies,
            available_copies: model.available_copies,
            is_available,
            cover_type: model.cover_type,
            cover_url,
            deleted_at: model.deleted_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Model {
        Model {
            id: 1,
            title: "Bumi".to_string(),
            author: Some("Tere Liye".to_string()),
            publisher: None,
            publication_year: Some(2014),
            isbn: None,
            call_number: None,
            collection_origin: None,
            publication_city: None,
            location: None,
            description: None,
            category: Some("fiksi, remaja,,".to_string()),
            total_copies: 2,
            available_copies: 1,
            cover: Some("covers/bumi-1700000000.jpg".to_string()),
            cover_type: CoverType::Upload,
            deleted_at: None,
            created_at: "2025-01-01T00:00:00Z".to_string(),
            updated_at: "2025-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn uploaded_cover_resolves_under_storage() {
        assert_eq!(
            sample().cover_url().as_deref(),
            Some("/storage/covers/bumi-1700000000.jpg")
        );
    }

    #[test]
    fn url_cover_is_returned_verbatim() {
        let mut book = sample();
        book.cover_type = CoverType::Url;
        book.cover = Some("https://example.org/bumi.jpg".to_string());
        assert_eq!(book.cover_url().as_deref(), Some("https://example.org/bumi.jpg"));
    }

    #[test]
    fn categories_skip_blanks() {
        assert_eq!(sample().categories(), vec!["fiksi", "remaja"]);
    }

    #[test]
    fn deleted_book_is_not_available() {
        let mut book = sample();
        book.deleted_at = Some("2025-02-01T00:00:00Z".to_string());
        assert!(!book.is_available());
    }
}
