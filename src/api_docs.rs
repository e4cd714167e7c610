use crate::api;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    paths(
        api::health::health_check,
        api::auth::login,
        api::auth::get_me,
        api::books::list_catalog,
        api::books::get_catalog_book,
        api::books::list_books,
        api::books::get_book,
        api::books::create_book,
        api::books::update_book,
        api::books::delete_book,
        api::batch::bulk_delete,
        api::batch::bulk_stock,
        api::export::export_books,
        api::export::export_loans,
        api::user::list_users,
        api::user::create_user,
        api::user::update_user,
        api::loan::list_loans,
        api::loan::get_loan,
        api::loan::create_loan,
        api::loan::approve_loan,
        api::loan::return_loan,
        api::loan::reject_loan,
        api::loan::check_overdue,
        api::bookshelves::bookshelf,
        api::bookshelves::request_loan,
        api::bookshelves::cancel_loan,
        api::dashboard::dashboard,
    ),
    components(
        schemas(
            crate::models::Book,
            crate::models::CoverType,
            crate::models::User,
            crate::models::Role,
            crate::models::LoanStatus,
            crate::models::LoanView,
            crate::domain::BookInput,
            crate::domain::NewUser,
            crate::domain::UserUpdate,
            crate::domain::Trashed,
            api::auth::LoginRequest,
            api::auth::LoginResponse,
            api::batch::BulkDeleteRequest,
            api::batch::BulkStockRequest,
            api::loan::ApproveLoanRequest,
            api::loan::CreateLoanRequest,
            api::bookshelves::RequestLoanRequest,
            crate::services::report_service::DashboardStats,
            crate::services::report_service::LoanCounts,
            crate::services::report_service::MemberCounts,
            crate::services::report_service::PopularBook,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "pustaka", description = "School library API")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}
