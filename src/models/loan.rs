use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::utils::parse_timestamp;

//  pending_pickup ──approve──► borrowed ──sweep──► overdue
//        │                        │                  │
//        └─cancel/reject (row     └──────return──────┴──► returned
//          deleted)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    #[sea_orm(string_value = "pending_pickup")]
    PendingPickup,
    #[sea_orm(string_value = "borrowed")]
    Borrowed,
    #[sea_orm(string_value = "overdue")]
    Overdue,
    #[sea_orm(string_value = "returned")]
    Returned,
}

impl LoanStatus {
    /// States that hold a copy of the book.
    pub const ACTIVE: [LoanStatus; 3] = [
        LoanStatus::PendingPickup,
        LoanStatus::Borrowed,
        LoanStatus::Overdue,
    ];

    pub fn is_active(self) -> bool {
        Self::ACTIVE.contains(&self)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LoanStatus::PendingPickup => "pending_pickup",
            LoanStatus::Borrowed => "borrowed",
            LoanStatus::Overdue => "overdue",
            LoanStatus::Returned => "returned",
        }
    }
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LoanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending_pickup" => Ok(LoanStatus::PendingPickup),
            "borrowed" => Ok(LoanStatus::Borrowed),
            "overdue" => Ok(LoanStatus::Overdue),
            "returned" => Ok(LoanStatus::Returned),
            other => Err(format!("unknown loan status '{}'", other)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "loans")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    pub book_id: i32,
    pub status: LoanStatus,
    pub request_date: String,
    pub approval_date: Option<String>,
    pub approved_by: Option<i32>,
    pub due_date: Option<String>,
    pub return_date: Option<String>,
    pub fine_amount: i64,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::book::Entity",
        from = "Column::BookId",
        to = "super::book::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Book,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    User,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::ApprovedBy",
        to = "super::user::Column::Id",
        on_update = "NoAction",
        on_delete = "SetNull"
    )]
    Approver,
}

impl Related<super::book::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Book.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn due_at(&self) -> Option<DateTime<Utc>> {
        self.due_date.as_deref().and_then(parse_timestamp)
    }

    /// A borrowed or overdue loan whose due date has passed.
    pub fn is_overdue_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.status, LoanStatus::Borrowed | LoanStatus::Overdue)
            && self.due_at().is_some_and(|due| now > due)
    }
}

/// Loan enriched with the names the listings show.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoanView {
    pub id: i32,
    pub user_id: i32,
    pub book_id: i32,
    pub status: LoanStatus,
    pub request_date: String,
    pub approval_date: Option<String>,
    pub approved_by: Option<i32>,
    pub due_date: Option<String>,
    pub return_date: Option<String>,
    pub fine_amount: i64,
    pub notes: Option<String>,
    pub book_title: String,
    pub book_author: Option<String>,
    pub book_cover: Option<String>,
    pub borrower_name: String,
    pub member_code: Option<String>,
    pub approver_name: Option<String>,
    pub is_overdue: bool,
}
