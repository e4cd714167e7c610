//! Loan Service - Pure business logic without HTTP layer
//!
//! Every lifecycle transition runs in one database transaction that writes
//! the loan row and the book's availability counter together. Counter and
//! status writes are conditional UPDATEs, so a transition whose
//! precondition no longer holds changes nothing and rolls back.
#![allow(clippy::needless_update)] // SeaORM ActiveModels require ..Default::default()

use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection,
    DatabaseTransaction, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, SqlErr,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::{DomainError, Paginated, page_params};
use crate::models::book::{self, Entity as Book};
use crate::models::loan::{self, Entity as Loan, LoanStatus, LoanView};
use crate::models::user::{self, Entity as User};
use crate::utils::format_timestamp;

/// Fine per whole day past the due date, in currency units.
pub const DEFAULT_FINE_PER_DAY: i64 = 1000;

/// `max(0, whole days between due and now) * per_day`; zero on or before
/// the due date.
pub fn calculate_fine(due: DateTime<Utc>, now: DateTime<Utc>, per_day: i64) -> i64 {
    if now <= due {
        return 0;
    }
    (now - due).num_days() * per_day
}

/// Due dates must fall on a later calendar day than `now`.
pub fn validate_due_date(due: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), DomainError> {
    if due.date_naive() <= now.date_naive() {
        return Err(DomainError::Validation(
            "due_date must be after today".to_string(),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Availability counter
// ---------------------------------------------------------------------------

/// Takes one copy off the shelf. Fails when the book is missing, deleted or
/// has no copy left.
async fn reserve_copy<C>(conn: &C, book_id: i32, now: &str) -> Result<(), DomainError>
where
    C: ConnectionTrait,
{
    let result = Book::update_many()
        .col_expr(
            book::Column::AvailableCopies,
            Expr::col(book::Column::AvailableCopies).sub(1),
        )
        .col_expr(book::Column::UpdatedAt, Expr::value(now))
        .filter(book::Column::Id.eq(book_id))
        .filter(book::Column::DeletedAt.is_null())
        .filter(book::Column::AvailableCopies.gt(0))
        .exec(conn)
        .await?;

    if result.rows_affected == 1 {
        return Ok(());
    }

    match Book::find_by_id(book_id).one(conn).await? {
        Some(book) if !book.is_deleted() => Err(DomainError::BookUnavailable),
        _ => Err(DomainError::NotFound("book")),
    }
}

/// Puts one copy back, never above `total_copies`.
async fn release_copy<C>(conn: &C, book_id: i32, now: &str) -> Result<(), DomainError>
where
    C: ConnectionTrait,
{
    let result = Book::update_many()
        .col_expr(
            book::Column::AvailableCopies,
            Expr::col(book::Column::AvailableCopies).add(1),
        )
        .col_expr(book::Column::UpdatedAt, Expr::value(now))
        .filter(book::Column::Id.eq(book_id))
        .filter(
            Expr::col(book::Column::AvailableCopies).lt(Expr::col(book::Column::TotalCopies)),
        )
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        tracing::warn!(book_id, "availability already at total copies, not incremented");
    }
    Ok(())
}

async fn has_active_loan<C>(conn: &C, user_id: i32, book_id: i32) -> Result<bool, DomainError>
where
    C: ConnectionTrait,
{
    let count = Loan::find()
        .filter(loan::Column::UserId.eq(user_id))
        .filter(loan::Column::BookId.eq(book_id))
        .filter(loan::Column::Status.is_in(LoanStatus::ACTIVE))
        .count(conn)
        .await?;
    Ok(count > 0)
}

/// Borrower must exist, not be deleted, and hold a borrowing role.
async fn load_borrower<C>(conn: &C, user_id: i32) -> Result<user::Model, DomainError>
where
    C: ConnectionTrait,
{
    let borrower = User::find_by_id(user_id)
        .one(conn)
        .await?
        .filter(|u| u.deleted_at.is_none())
        .ok_or(DomainError::NotFound("user"))?;

    if !borrower.role.can_borrow() {
        return Err(DomainError::Forbidden(
            "administrators cannot borrow books".to_string(),
        ));
    }
    Ok(borrower)
}

async fn load_admin<C>(conn: &C, admin_id: i32) -> Result<user::Model, DomainError>
where
    C: ConnectionTrait,
{
    let admin = User::find_by_id(admin_id)
        .one(conn)
        .await?
        .filter(|u| u.deleted_at.is_none())
        .ok_or(DomainError::NotFound("user"))?;

    if !admin.role.is_admin() {
        return Err(DomainError::Forbidden(
            "only administrators can manage loans".to_string(),
        ));
    }
    Ok(admin)
}

async fn load_loan<C>(conn: &C, loan_id: i32) -> Result<loan::Model, DomainError>
where
    C: ConnectionTrait,
{
    Loan::find_by_id(loan_id)
        .one(conn)
        .await?
        .ok_or(DomainError::NotFound("loan"))
}

/// Error for a status CAS that matched no row: the loan vanished or moved on.
async fn transition_error<C>(
    conn: &C,
    loan_id: i32,
    action: &'static str,
) -> Result<DomainError, DomainError>
where
    C: ConnectionTrait,
{
    Ok(match Loan::find_by_id(loan_id).one(conn).await? {
        Some(current) => DomainError::InvalidTransition {
            action,
            status: current.status,
        },
        None => DomainError::NotFound("loan"),
    })
}

fn duplicate_on_unique(err: DbErr) -> DomainError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => DomainError::DuplicateLoan,
        _ => DomainError::from(err),
    }
}

async fn insert_loan(
    txn: &DatabaseTransaction,
    new_loan: loan::ActiveModel,
) -> Result<loan::Model, DomainError> {
    new_loan.insert(txn).await.map_err(duplicate_on_unique)
}

// ---------------------------------------------------------------------------
// Lifecycle transitions
// ---------------------------------------------------------------------------

/// A member asks for a book: creates a `pending_pickup` loan and reserves a
/// copy.
pub async fn request_loan(
    db: &DatabaseConnection,
    user_id: i32,
    book_id: i32,
    now: DateTime<Utc>,
) -> Result<loan::Model, DomainError> {
    let stamp = format_timestamp(now);
    let txn = db.begin().await?;

    load_borrower(&txn, user_id).await?;
    if has_active_loan(&txn, user_id, book_id).await? {
        return Err(DomainError::DuplicateLoan);
    }
    reserve_copy(&txn, book_id, &stamp).await?;

    let saved = insert_loan(
        &txn,
        loan::ActiveModel {
            user_id: Set(user_id),
            book_id: Set(book_id),
            status: Set(LoanStatus::PendingPickup),
            request_date: Set(stamp.clone()),
            fine_amount: Set(0),
            created_at: Set(stamp.clone()),
            updated_at: Set(stamp),
            ..Default::default()
        },
    )
    .await?;
    txn.commit().await?;

    tracing::info!(loan_id = saved.id, user_id, book_id, "loan requested");
    Ok(saved)
}

/// Desk loan created by an administrator: the copy is handed over
/// immediately, so the loan starts as `borrowed`.
pub async fn create_direct_loan(
    db: &DatabaseConnection,
    admin_id: i32,
    user_id: i32,
    book_id: i32,
    due: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<loan::Model, DomainError> {
    validate_due_date(due, now)?;
    let stamp = format_timestamp(now);
    let txn = db.begin().await?;

    load_admin(&txn, admin_id).await?;
    load_borrower(&txn, user_id).await?;
    if has_active_loan(&txn, user_id, book_id).await? {
        return Err(DomainError::DuplicateLoan);
    }
    reserve_copy(&txn, book_id, &stamp).await?;

    let saved = insert_loan(
        &txn,
        loan::ActiveModel {
            user_id: Set(user_id),
            book_id: Set(book_id),
            status: Set(LoanStatus::Borrowed),
            request_date: Set(stamp.clone()),
            approval_date: Set(Some(stamp.clone())),
            approved_by: Set(Some(admin_id)),
            due_date: Set(Some(format_timestamp(due))),
            fine_amount: Set(0),
            created_at: Set(stamp.clone()),
            updated_at: Set(stamp),
            ..Default::default()
        },
    )
    .await?;
    txn.commit().await?;

    tracing::info!(loan_id = saved.id, admin_id, user_id, book_id, "desk loan created");
    Ok(saved)
}

/// Hands the reserved copy over: `pending_pickup → borrowed`. No stock
/// change, the copy was reserved at request time.
pub async fn approve_loan(
    db: &DatabaseConnection,
    loan_id: i32,
    approver_id: i32,
    due: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<loan::Model, DomainError> {
    validate_due_date(due, now)?;
    let stamp = format_timestamp(now);
    let txn = db.begin().await?;

    load_admin(&txn, approver_id).await?;

    let result = Loan::update_many()
        .col_expr(loan::Column::Status, Expr::value(LoanStatus::Borrowed.as_str()))
        .col_expr(loan::Column::ApprovalDate, Expr::value(stamp.clone()))
        .col_expr(loan::Column::ApprovedBy, Expr::value(approver_id))
        .col_expr(loan::Column::DueDate, Expr::value(format_timestamp(due)))
        .col_expr(loan::Column::UpdatedAt, Expr::value(stamp))
        .filter(loan::Column::Id.eq(loan_id))
        .filter(loan::Column::Status.eq(LoanStatus::PendingPickup))
        .exec(&txn)
        .await?;

    if result.rows_affected == 0 {
        return Err(transition_error(&txn, loan_id, "approve").await?);
    }

    let saved = load_loan(&txn, loan_id).await?;
    txn.commit().await?;

    tracing::info!(loan_id, approver_id, due = ?saved.due_date, "loan approved");
    Ok(saved)
}

/// Closes a borrowed or overdue loan, computes its fine and puts the copy
/// back on the shelf.
pub async fn return_loan(
    db: &DatabaseConnection,
    loan_id: i32,
    now: DateTime<Utc>,
    fine_per_day: i64,
) -> Result<loan::Model, DomainError> {
    let stamp = format_timestamp(now);
    let txn = db.begin().await?;

    let current = load_loan(&txn, loan_id).await?;
    if !matches!(current.status, LoanStatus::Borrowed | LoanStatus::Overdue) {
        return Err(DomainError::InvalidTransition {
            action: "return",
            status: current.status,
        });
    }
    let fine = current
        .due_at()
        .map(|due| calculate_fine(due, now, fine_per_day))
        .unwrap_or(0);

    let result = Loan::update_many()
        .col_expr(loan::Column::Status, Expr::value(LoanStatus::Returned.as_str()))
        .col_expr(loan::Column::ReturnDate, Expr::value(stamp.clone()))
        .col_expr(loan::Column::FineAmount, Expr::value(fine))
        .col_expr(loan::Column::UpdatedAt, Expr::value(stamp.clone()))
        .filter(loan::Column::Id.eq(loan_id))
        .filter(loan::Column::Status.is_in([LoanStatus::Borrowed, LoanStatus::Overdue]))
        .exec(&txn)
        .await?;

    if result.rows_affected == 0 {
        return Err(transition_error(&txn, loan_id, "return").await?);
    }

    release_copy(&txn, current.book_id, &stamp).await?;
    let saved = load_loan(&txn, loan_id).await?;
    txn.commit().await?;

    tracing::info!(loan_id, book_id = saved.book_id, fine, "loan returned");
    Ok(saved)
}

/// Drops a `pending_pickup` loan and releases its copy. The row is deleted:
/// an unfulfilled reservation leaves no history.
async fn drop_reservation(
    db: &DatabaseConnection,
    loan_id: i32,
    action: &'static str,
    owner: Option<i32>,
    now: DateTime<Utc>,
) -> Result<loan::Model, DomainError> {
    let stamp = format_timestamp(now);
    let txn = db.begin().await?;

    let current = load_loan(&txn, loan_id).await?;
    if let Some(caller) = owner
        && caller != current.user_id
    {
        return Err(DomainError::Forbidden(
            "you can only cancel your own requests".to_string(),
        ));
    }

    let result = Loan::delete_many()
        .filter(loan::Column::Id.eq(loan_id))
        .filter(loan::Column::Status.eq(LoanStatus::PendingPickup))
        .exec(&txn)
        .await?;

    if result.rows_affected == 0 {
        return Err(transition_error(&txn, loan_id, action).await?);
    }

    release_copy(&txn, current.book_id, &stamp).await?;
    txn.commit().await?;

    tracing::info!(loan_id, book_id = current.book_id, action, "reservation dropped");
    Ok(current)
}

/// Borrower withdraws their own request.
pub async fn cancel_loan(
    db: &DatabaseConnection,
    loan_id: i32,
    caller_id: i32,
    now: DateTime<Utc>,
) -> Result<loan::Model, DomainError> {
    drop_reservation(db, loan_id, "cancel", Some(caller_id), now).await
}

/// Administrator turns a request down.
pub async fn reject_loan(
    db: &DatabaseConnection,
    loan_id: i32,
    now: DateTime<Utc>,
) -> Result<loan::Model, DomainError> {
    drop_reservation(db, loan_id, "reject", None, now).await
}

/// Flips every `borrowed` loan whose due date lies before `now` to
/// `overdue`. Returns the number of loans flipped; a second run flips none.
///
/// This is the only writer of the `overdue` status. The CLI command, the
/// periodic task and the listing paths all call it.
pub async fn sweep_overdue<C>(conn: &C, now: DateTime<Utc>) -> Result<u64, DomainError>
where
    C: ConnectionTrait,
{
    let stamp = format_timestamp(now);
    let result = Loan::update_many()
        .col_expr(loan::Column::Status, Expr::value(LoanStatus::Overdue.as_str()))
        .col_expr(loan::Column::UpdatedAt, Expr::value(stamp.clone()))
        .filter(loan::Column::Status.eq(LoanStatus::Borrowed))
        .filter(loan::Column::DueDate.is_not_null())
        .filter(loan::Column::DueDate.lt(stamp))
        .exec(conn)
        .await?;

    if result.rows_affected > 0 {
        tracing::info!(count = result.rows_affected, "loans marked overdue");
    }
    Ok(result.rows_affected)
}

/// Recomputes every book's counter as `total - active loans`, floored at 0.
/// Returns the number of books whose counter changed.
pub async fn reconcile_availability(db: &DatabaseConnection) -> Result<u64, DomainError> {
    let txn = db.begin().await?;

    let active = Loan::find()
        .filter(loan::Column::Status.is_in(LoanStatus::ACTIVE))
        .all(&txn)
        .await?;
    let mut outstanding: HashMap<i32, i32> = HashMap::new();
    for l in active {
        *outstanding.entry(l.book_id).or_default() += 1;
    }

    let stamp = format_timestamp(Utc::now());
    let mut changed = 0;
    for b in Book::find().all(&txn).await? {
        let expected = (b.total_copies - outstanding.get(&b.id).copied().unwrap_or(0)).max(0);
        if expected != b.available_copies {
            tracing::debug!(
                book_id = b.id,
                from = b.available_copies,
                to = expected,
                "availability reconciled"
            );
            let mut active: book::ActiveModel = b.into();
            active.available_copies = Set(expected);
            active.updated_at = Set(stamp.clone());
            active.update(&txn).await?;
            changed += 1;
        }
    }

    txn.commit().await?;
    Ok(changed)
}

// ---------------------------------------------------------------------------
// Listings
// ---------------------------------------------------------------------------

/// Filter parameters for listing loans
#[derive(Debug, Default, Clone, Deserialize)]
pub struct LoanFilter {
    pub status: Option<LoanStatus>,
    /// Takes precedence over `status` when set
    #[serde(skip)]
    pub statuses: Option<Vec<LoanStatus>>,
    pub user_id: Option<i32>,
    pub book_id: Option<i32>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

/// A member's active loans plus returned history.
#[derive(Debug, Clone, Serialize)]
pub struct Bookshelf {
    pub active_loans: Vec<LoanView>,
    pub loan_history: Vec<LoanView>,
}

/// Adds book and user names to raw loan rows.
pub async fn enrich_loans<C>(
    conn: &C,
    loans: Vec<loan::Model>,
    now: DateTime<Utc>,
) -> Result<Vec<LoanView>, DomainError>
where
    C: ConnectionTrait,
{
    if loans.is_empty() {
        return Ok(Vec::new());
    }

    let book_ids: Vec<i32> = loans.iter().map(|l| l.book_id).collect();
    let user_ids: Vec<i32> = loans
        .iter()
        .flat_map(|l| std::iter::once(l.user_id).chain(l.approved_by))
        .collect();

    let books: HashMap<i32, book::Model> = Book::find()
        .filter(book::Column::Id.is_in(book_ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|b| (b.id, b))
        .collect();
    let users: HashMap<i32, user::Model> = User::find()
        .filter(user::Column::Id.is_in(user_ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();

    Ok(loans
        .into_iter()
        .map(|l| {
            let book = books.get(&l.book_id);
            let borrower = users.get(&l.user_id);
            let approver = l.approved_by.and_then(|id| users.get(&id));
            LoanView {
                is_overdue: l.is_overdue_at(now),
                book_title: book
                    .map(|b| b.title.clone())
                    .unwrap_or_else(|| "Unknown".to_string()),
                book_author: book.and_then(|b| b.author.clone()),
                book_cover: book.and_then(|b| b.cover_url()),
                borrower_name: borrower
                    .map(|u| u.name.clone())
                    .unwrap_or_else(|| "Unknown".to_string()),
                member_code: borrower.map(|u| u.member_code.clone()),
                approver_name: approver.map(|u| u.name.clone()),
                id: l.id,
                user_id: l.user_id,
                book_id: l.book_id,
                status: l.status,
                request_date: l.request_date,
                approval_date: l.approval_date,
                approved_by: l.approved_by,
                due_date: l.due_date,
                return_date: l.return_date,
                fine_amount: l.fine_amount,
                notes: l.notes,
            }
        })
        .collect())
}

/// Paginated, newest first. Runs the overdue sweep first so listed
/// statuses are current.
pub async fn list_loans(
    db: &DatabaseConnection,
    filter: LoanFilter,
    now: DateTime<Utc>,
) -> Result<Paginated<LoanView>, DomainError> {
    sweep_overdue(db, now).await?;

    let mut condition = Condition::all();
    match (&filter.statuses, filter.status) {
        (Some(statuses), _) => {
            condition = condition.add(loan::Column::Status.is_in(statuses.iter().copied()));
        }
        (None, Some(status)) => condition = condition.add(loan::Column::Status.eq(status)),
        (None, None) => {}
    }
    if let Some(user_id) = filter.user_id {
        condition = condition.add(loan::Column::UserId.eq(user_id));
    }
    if let Some(book_id) = filter.book_id {
        condition = condition.add(loan::Column::BookId.eq(book_id));
    }

    let (page, per_page) = page_params(filter.page, filter.per_page);
    let paginator = Loan::find()
        .filter(condition)
        .order_by_desc(loan::Column::CreatedAt)
        .order_by_desc(loan::Column::Id)
        .paginate(db, per_page);
    let total = paginator.num_items().await?;
    let rows = paginator.fetch_page(page - 1).await?;

    let items = enrich_loans(db, rows, now).await?;
    Ok(Paginated::new(items, total, page, per_page))
}

pub async fn get_loan(
    db: &DatabaseConnection,
    loan_id: i32,
    now: DateTime<Utc>,
) -> Result<LoanView, DomainError> {
    sweep_overdue(db, now).await?;
    let row = load_loan(db, loan_id).await?;
    enrich_loans(db, vec![row], now)
        .await?
        .pop()
        .ok_or(DomainError::NotFound("loan"))
}

pub async fn bookshelf(
    db: &DatabaseConnection,
    user_id: i32,
    now: DateTime<Utc>,
) -> Result<Bookshelf, DomainError> {
    sweep_overdue(db, now).await?;

    let rows = Loan::find()
        .filter(loan::Column::UserId.eq(user_id))
        .order_by_desc(loan::Column::CreatedAt)
        .order_by_desc(loan::Column::Id)
        .all(db)
        .await?;
    let (active, history): (Vec<_>, Vec<_>) =
        rows.into_iter().partition(|l| l.status.is_active());

    Ok(Bookshelf {
        active_loans: enrich_loans(db, active, now).await?,
        loan_history: enrich_loans(db, history, now).await?,
    })
}

/// Count loans per status
pub async fn count_by_status(
    db: &DatabaseConnection,
) -> Result<HashMap<LoanStatus, u64>, DomainError> {
    let mut counts = HashMap::new();
    for status in [
        LoanStatus::PendingPickup,
        LoanStatus::Borrowed,
        LoanStatus::Overdue,
        LoanStatus::Returned,
    ] {
        let count = Loan::find()
            .filter(loan::Column::Status.eq(status))
            .count(db)
            .await?;
        counts.insert(status, count);
    }
    Ok(counts)
}
