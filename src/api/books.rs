use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;

use crate::api::error::{ApiError, ApiResult};
use crate::auth::AdminUser;
use crate::domain::{BookFilter, BookInput, DomainError, Trashed};
use crate::infrastructure::AppState;
use crate::models::Book;
use crate::services::book_service;

/// Catalog search for visitors and members; soft-deleted titles stay hidden.
#[utoipa::path(
    get,
    path = "/api/catalog",
    params(
        ("query" = Option<String>, Query, description = "Title, author, publisher, ISBN or category"),
        ("category" = Option<String>, Query, description = "Category filter"),
        ("only_available" = Option<bool>, Query, description = "Only titles with a copy on the shelf"),
        ("sort" = Option<String>, Query, description = "title_asc, title_desc, recent or year_desc"),
        ("page" = Option<u64>, Query, description = "1-based page")
    ),
    responses(
        (status = 200, description = "One page of catalog entries")
    )
)]
pub async fn list_catalog(
    State(state): State<AppState>,
    Query(mut filter): Query<BookFilter>,
) -> ApiResult<impl IntoResponse> {
    filter.trashed = Trashed::Without;
    let page = state.book_repo.find_all(filter).await?;
    Ok(Json(json!({ "success": true, "books": page })))
}

#[utoipa::path(
    get,
    path = "/api/catalog/{id}",
    params(("id" = i32, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Catalog entry", body = Book),
        (status = 404, description = "Unknown or removed book")
    )
)]
pub async fn get_catalog_book(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    let book = state
        .book_repo
        .find_by_id(id)
        .await?
        .filter(|b| !b.is_deleted())
        .ok_or(DomainError::NotFound("book"))?;
    Ok(Json(json!({ "success": true, "book": Book::from(book) })))
}

#[utoipa::path(
    get,
    path = "/api/admin/books",
    params(
        ("query" = Option<String>, Query, description = "Substring search"),
        ("trashed" = Option<Trashed>, Query, description = "without, with or only"),
        ("page" = Option<u64>, Query, description = "1-based page")
    ),
    responses((status = 200, description = "One page of books")),
    security(("bearer" = []))
)]
pub async fn list_books(
    _admin: AdminUser,
    State(state): State<AppState>,
    Query(filter): Query<BookFilter>,
) -> ApiResult<impl IntoResponse> {
    let page = state.book_repo.find_all(filter).await?;
    Ok(Json(json!({ "success": true, "books": page })))
}

/// Ids of every live book, for select-all in bulk actions
pub async fn list_book_ids(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> ApiResult<impl IntoResponse> {
    let ids = state.book_repo.all_ids().await?;
    Ok(Json(json!({ "success": true, "ids": ids })))
}

#[utoipa::path(
    get,
    path = "/api/admin/books/{id}",
    params(("id" = i32, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Book, including soft-deleted ones", body = Book),
        (status = 404, description = "Book not found")
    ),
    security(("bearer" = []))
)]
pub async fn get_book(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    let book = state
        .book_repo
        .find_by_id(id)
        .await?
        .ok_or(DomainError::NotFound("book"))?;
    Ok(Json(json!({ "success": true, "book": Book::from(book) })))
}

#[utoipa::path(
    post,
    path = "/api/admin/books",
    request_body = BookInput,
    responses(
        (status = 201, description = "Book created", body = Book),
        (status = 422, description = "Invalid input")
    ),
    security(("bearer" = []))
)]
pub async fn create_book(
    _admin: AdminUser,
    State(state): State<AppState>,
    Json(input): Json<BookInput>,
) -> ApiResult<impl IntoResponse> {
    let book = state.book_repo.create(input).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Book created successfully",
            "book": book
        })),
    ))
}

#[utoipa::path(
    put,
    path = "/api/admin/books/{id}",
    params(("id" = i32, Path, description = "Book ID")),
    request_body = BookInput,
    responses(
        (status = 200, description = "Book updated", body = Book),
        (status = 404, description = "Book not found"),
        (status = 422, description = "Invalid input")
    ),
    security(("bearer" = []))
)]
pub async fn update_book(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(input): Json<BookInput>,
) -> ApiResult<impl IntoResponse> {
    let book = state.book_repo.update(id, input).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Book updated successfully",
        "book": book
    })))
}

#[utoipa::path(
    delete,
    path = "/api/admin/books/{id}",
    params(("id" = i32, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Book moved to trash"),
        (status = 404, description = "Book not found")
    ),
    security(("bearer" = []))
)]
pub async fn delete_book(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    state.book_repo.soft_delete(id).await?;
    tracing::info!(book_id = id, "book moved to trash");
    Ok(Json(json!({
        "success": true,
        "message": "Book deleted successfully"
    })))
}

pub async fn restore_book(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    let book = state.book_repo.restore(id).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Book restored successfully",
        "book": book
    })))
}

/// Multipart upload; the image travels in the `cover` field.
pub async fn upload_cover(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    mut multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        if field.name() != Some("cover") {
            continue;
        }
        let content_type = field.content_type().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(bad_multipart)?;

        let book = book_service::upload_cover(
            state.book_repo.as_ref(),
            state.covers.as_ref(),
            id,
            &content_type,
            &bytes,
            Utc::now(),
        )
        .await?;
        return Ok(Json(json!({
            "success": true,
            "message": "Cover uploaded successfully",
            "book": book
        })));
    }

    Err(DomainError::Validation("a cover file is required".to_string()).into())
}

pub async fn delete_cover(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    let book =
        book_service::remove_cover(state.book_repo.as_ref(), state.covers.as_ref(), id).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Cover removed",
        "book": book
    })))
}

pub(crate) fn bad_multipart(e: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError(DomainError::Validation(format!("invalid upload: {}", e)))
}
