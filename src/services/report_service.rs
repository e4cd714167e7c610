//! Dashboard figures and the loan export

use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect,
};
use serde::Serialize;
use std::collections::HashMap;
use utoipa::ToSchema;

use crate::domain::DomainError;
use crate::models::book::{self, Entity as Book};
use crate::models::loan::{self, Entity as Loan, LoanStatus};
use crate::models::user::{self, Entity as User, Role};
use crate::services::loan_service::{self, calculate_fine};

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LoanCounts {
    pub pending_pickup: u64,
    pub borrowed: u64,
    pub overdue: u64,
    pub returned: u64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MemberCounts {
    pub admin: u64,
    pub teacher: u64,
    pub student: u64,
}

#[derive(Debug, Clone, Serialize, ToSchema, FromQueryResult)]
pub struct PopularBook {
    pub book_id: i32,
    pub title: String,
    pub loan_count: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DashboardStats {
    pub total_titles: u64,
    pub total_copies: i64,
    pub available_copies: i64,
    pub loans: LoanCounts,
    /// Borrowed or overdue loans whose due date has passed
    pub overdue_count: u64,
    /// What the overdue loans would owe if returned now
    pub outstanding_fines: i64,
    pub collected_fines: i64,
    pub top_books: Vec<PopularBook>,
    pub members: MemberCounts,
}

#[derive(Debug, FromQueryResult)]
struct CopyTotals {
    total: Option<i64>,
    available: Option<i64>,
}

#[derive(Debug, FromQueryResult)]
struct FineTotal {
    total: Option<i64>,
}

pub async fn dashboard(
    db: &DatabaseConnection,
    now: DateTime<Utc>,
    fine_per_day: i64,
) -> Result<DashboardStats, DomainError> {
    loan_service::sweep_overdue(db, now).await?;

    let live_books = || Book::find().filter(book::Column::DeletedAt.is_null());

    let total_titles = live_books().count(db).await?;
    let copies = live_books()
        .select_only()
        .column_as(Expr::col(book::Column::TotalCopies).sum(), "total")
        .column_as(Expr::col(book::Column::AvailableCopies).sum(), "available")
        .into_model::<CopyTotals>()
        .one(db)
        .await?;
    let (total_copies, available_copies) = copies
        .map(|c| (c.total.unwrap_or(0), c.available.unwrap_or(0)))
        .unwrap_or((0, 0));

    let by_status = loan_service::count_by_status(db).await?;
    let count = |status: LoanStatus| by_status.get(&status).copied().unwrap_or(0);
    let loans = LoanCounts {
        pending_pickup: count(LoanStatus::PendingPickup),
        borrowed: count(LoanStatus::Borrowed),
        overdue: count(LoanStatus::Overdue),
        returned: count(LoanStatus::Returned),
    };

    let late = Loan::find()
        .filter(loan::Column::Status.is_in([LoanStatus::Borrowed, LoanStatus::Overdue]))
        .all(db)
        .await?
        .into_iter()
        .filter(|l| l.is_overdue_at(now))
        .collect::<Vec<_>>();
    let outstanding_fines: i64 = late
        .iter()
        .filter_map(|l| l.due_at())
        .map(|due| calculate_fine(due, now, fine_per_day))
        .sum();

    let collected_fines = Loan::find()
        .select_only()
        .column_as(Expr::col(loan::Column::FineAmount).sum(), "total")
        .filter(loan::Column::Status.eq(LoanStatus::Returned))
        .into_model::<FineTotal>()
        .one(db)
        .await?
        .and_then(|f| f.total)
        .unwrap_or(0);

    let top_books = Loan::find()
        .select_only()
        .column_as(loan::Column::BookId, "book_id")
        .column_as(book::Column::Title, "title")
        .column_as(Expr::col((Loan, loan::Column::Id)).count(), "loan_count")
        .inner_join(Book)
        .group_by(loan::Column::BookId)
        .group_by(book::Column::Title)
        .order_by_desc(Expr::col((Loan, loan::Column::Id)).count())
        .order_by_asc(loan::Column::BookId)
        .limit(5)
        .into_model::<PopularBook>()
        .all(db)
        .await?;

    let mut per_role: HashMap<Role, u64> = HashMap::new();
    for role in [Role::Admin, Role::Teacher, Role::Student] {
        let n = User::find()
            .filter(user::Column::Role.eq(role))
            .filter(user::Column::DeletedAt.is_null())
            .count(db)
            .await?;
        per_role.insert(role, n);
    }
    let members = MemberCounts {
        admin: per_role.get(&Role::Admin).copied().unwrap_or(0),
        teacher: per_role.get(&Role::Teacher).copied().unwrap_or(0),
        student: per_role.get(&Role::Student).copied().unwrap_or(0),
    };

    Ok(DashboardStats {
        total_titles,
        total_copies,
        available_copies,
        loans,
        overdue_count: late.len() as u64,
        outstanding_fines,
        collected_fines,
        top_books,
        members,
    })
}

#[derive(Debug, Serialize)]
struct LoanRow {
    id: i32,
    book_title: String,
    borrower: String,
    member_code: String,
    status: LoanStatus,
    request_date: String,
    approval_date: Option<String>,
    due_date: Option<String>,
    return_date: Option<String>,
    fine_amount: i64,
}

/// Every loan as CSV, newest first.
pub async fn export_loans_csv(
    db: &DatabaseConnection,
    now: DateTime<Utc>,
) -> Result<Vec<u8>, DomainError> {
    loan_service::sweep_overdue(db, now).await?;

    let rows = Loan::find()
        .order_by_desc(loan::Column::CreatedAt)
        .order_by_desc(loan::Column::Id)
        .all(db)
        .await?;
    let views = loan_service::enrich_loans(db, rows, now).await?;

    let mut wtr = csv::Writer::from_writer(Vec::new());
    for v in views {
        wtr.serialize(LoanRow {
            id: v.id,
            book_title: v.book_title,
            borrower: v.borrower_name,
            member_code: v.member_code.unwrap_or_default(),
            status: v.status,
            request_date: v.request_date,
            approval_date: v.approval_date,
            due_date: v.due_date,
            return_date: v.return_date,
            fine_amount: v.fine_amount,
        })
        .map_err(|e| DomainError::Internal(format!("CSV write error: {}", e)))?;
    }
    wtr.into_inner()
        .map_err(|e| DomainError::Internal(format!("CSV write error: {}", e)))
}
