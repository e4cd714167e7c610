//! Book Service - catalog operations that span more than one store
//!
//! Cover uploads touch the file store and the catalog row; imports and
//! exports go through the flat CSV record.

use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;

use crate::domain::{BookRepository, DomainError};
use crate::infrastructure::storage::CoverStorage;
use crate::models::book::{self, Book, CoverType};
use crate::modules::book_csv::{self, RowError};
use crate::utils::slugify;

pub const MAX_COVER_BYTES: usize = 2048 * 1024;

/// Uploaded covers live under this prefix inside the storage root.
const COVER_PREFIX: &str = "covers";

/// Maps an uploaded content type to the stored file extension.
pub fn cover_extension(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

pub fn cover_file_name(title: &str, ext: &str, now: DateTime<Utc>) -> String {
    format!("{}/{}-{}.{}", COVER_PREFIX, slugify(title), now.timestamp(), ext)
}

/// Stores a new cover file and points the book at it. The previous
/// uploaded file, if any, is removed once the row is updated.
pub async fn upload_cover(
    books: &dyn BookRepository,
    storage: &dyn CoverStorage,
    book_id: i32,
    content_type: &str,
    bytes: &[u8],
    now: DateTime<Utc>,
) -> Result<Book, DomainError> {
    let ext = cover_extension(content_type).ok_or_else(|| {
        DomainError::Validation("cover must be a png, jpeg, gif or webp image".to_string())
    })?;
    if bytes.is_empty() {
        return Err(DomainError::Validation("cover file is empty".to_string()));
    }
    if bytes.len() > MAX_COVER_BYTES {
        return Err(DomainError::Validation(
            "cover must not exceed 2048 KB".to_string(),
        ));
    }

    let existing = books
        .find_by_id(book_id)
        .await?
        .ok_or(DomainError::NotFound("book"))?;

    let path = cover_file_name(&existing.title, ext, now);
    storage.store(&path, bytes).await?;

    let updated = match books
        .set_cover(book_id, Some(path.clone()), CoverType::Upload)
        .await
    {
        Ok(updated) => updated,
        Err(e) => {
            // row unchanged, drop the orphan
            if let Err(cleanup) = storage.delete(&path).await {
                tracing::warn!(path = %path, error = %cleanup, "failed to remove orphaned cover");
            }
            return Err(e);
        }
    };

    if existing.cover_type == CoverType::Upload
        && let Some(old) = existing.cover.filter(|old| !old.is_empty() && *old != path)
        && let Err(e) = storage.delete(&old).await
    {
        tracing::warn!(path = %old, error = %e, "failed to remove replaced cover");
    }

    tracing::info!(book_id, path = %path, "cover uploaded");
    Ok(updated)
}

/// Clears the cover and removes the stored file for uploaded covers.
pub async fn remove_cover(
    books: &dyn BookRepository,
    storage: &dyn CoverStorage,
    book_id: i32,
) -> Result<Book, DomainError> {
    let existing = books
        .find_by_id(book_id)
        .await?
        .ok_or(DomainError::NotFound("book"))?;

    let updated = books.set_cover(book_id, None, CoverType::Upload).await?;
    if existing.cover_type == CoverType::Upload
        && let Some(old) = existing.cover.filter(|c| !c.is_empty())
    {
        storage.delete(&old).await?;
    }
    Ok(updated)
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: Vec<RowError>,
}

/// Creates one book per valid CSV row. Invalid rows are reported, the
/// rest of the file still goes in.
pub async fn import_books_csv(
    books: &dyn BookRepository,
    content: &[u8],
) -> Result<ImportSummary, DomainError> {
    let (records, mut skipped) =
        book_csv::parse_books_csv(content).map_err(DomainError::Validation)?;

    let mut imported = 0;
    for (line, record) in records {
        let title = record.title.clone();
        match books.create(record.into_input()).await {
            Ok(_) => imported += 1,
            Err(e) if e.is_business_rule() => skipped.push(RowError {
                line,
                message: format!("{}: {}", title, e),
            }),
            Err(e) => return Err(e),
        }
    }

    tracing::info!(imported, skipped = skipped.len(), "book import finished");
    Ok(ImportSummary { imported, skipped })
}

/// Every catalog entry that is not soft-deleted, as CSV.
pub async fn export_books_csv(db: &DatabaseConnection) -> Result<Vec<u8>, DomainError> {
    let rows = book::Entity::find()
        .filter(book::Column::DeletedAt.is_null())
        .order_by_asc(book::Column::Title)
        .order_by_asc(book::Column::Id)
        .all(db)
        .await?;
    book_csv::write_books_csv(rows).map_err(DomainError::Internal)
}
