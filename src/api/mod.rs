pub mod auth;
pub mod batch;
pub mod books;
pub mod bookshelves;
pub mod dashboard;
pub mod error;
pub mod export;
pub mod health;
pub mod loan;
pub mod user;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
};
use sea_orm::DatabaseConnection;

use crate::infrastructure::AppState;

/// Covers are capped at 2048 KiB; leave room for multipart framing.
const UPLOAD_BODY_LIMIT: usize = 4 * 1024 * 1024;

pub fn api_router(db: DatabaseConnection) -> Router {
    api_router_with_state(AppState::new(db))
}

pub fn api_router_with_state(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Auth
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::get_me))
        // Public catalog
        .route("/catalog", get(books::list_catalog))
        .route("/catalog/:id", get(books::get_catalog_book))
        // Members
        .route("/bookshelves", get(bookshelves::bookshelf))
        .route("/bookshelves/loans", post(bookshelves::request_loan))
        .route("/bookshelves/loans/:id", delete(bookshelves::cancel_loan))
        .route("/my/loans", get(bookshelves::my_loans))
        // Administration
        .nest("/admin", admin_router())
        .with_state(state)
}

fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard::dashboard))
        // Books
        .route("/books", get(books::list_books).post(books::create_book))
        .route("/books/ids", get(books::list_book_ids))
        .route("/books/export", get(export::export_books))
        .route("/books/import", post(export::import_books))
        .route("/books/bulk-delete", post(batch::bulk_delete))
        .route("/books/bulk-stock", post(batch::bulk_stock))
        .route("/books/reconcile", post(loan::reconcile))
        .route(
            "/books/:id",
            get(books::get_book)
                .put(books::update_book)
                .delete(books::delete_book),
        )
        .route("/books/:id/restore", post(books::restore_book))
        .route(
            "/books/:id/cover",
            post(books::upload_cover).delete(books::delete_cover),
        )
        // Users
        .route("/users", get(user::list_users).post(user::create_user))
        .route(
            "/users/:id",
            get(user::get_user)
                .put(user::update_user)
                .delete(user::delete_user),
        )
        .route("/users/:id/restore", post(user::restore_user))
        // Loans
        .route("/loans", get(loan::list_loans).post(loan::create_loan))
        .route("/loans/pending", get(loan::list_pending))
        .route("/loans/active", get(loan::list_active))
        .route("/loans/export", get(export::export_loans))
        .route("/loans/check-overdue", post(loan::check_overdue))
        .route("/loans/:id", get(loan::get_loan))
        .route("/loans/:id/approve", post(loan::approve_loan))
        .route("/loans/:id/return", post(loan::return_loan))
        .route("/loans/:id/reject", post(loan::reject_loan))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
}
