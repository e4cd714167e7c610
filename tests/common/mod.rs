#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use pustaka::db;
use pustaka::domain::{BookInput, BookRepository, NewUser, UserRepository};
use pustaka::infrastructure::{SeaOrmBookRepository, SeaOrmUserRepository};
use pustaka::models::{Role, book, loan, user};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

// Helper to create a test database
pub async fn setup_test_db() -> DatabaseConnection {
    db::init_db("sqlite::memory:")
        .await
        .expect("Failed to init DB")
}

/// Fixed clock for service-level tests
pub fn monday_morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap()
}

/// Account with a placeholder hash; login tests hash real passwords.
pub async fn create_user(
    db: &DatabaseConnection,
    username: &str,
    role: Role,
    enrollment_year: i32,
) -> user::Model {
    let repo = SeaOrmUserRepository::new(db.clone());
    let created = repo
        .create(
            NewUser {
                name: format!("{} test", username),
                username: username.to_string(),
                password: "password123".to_string(),
                role,
                enrollment_year,
                gender: None,
                major: None,
                phone: None,
                photo: None,
            },
            "not-a-real-hash".to_string(),
        )
        .await
        .expect("Failed to create user");
    repo.find_by_id(created.id)
        .await
        .unwrap()
        .expect("user just created")
}

pub async fn create_book(db: &DatabaseConnection, title: &str, copies: i32) -> i32 {
    SeaOrmBookRepository::new(db.clone())
        .create(BookInput {
            title: title.to_string(),
            total_copies: Some(copies),
            ..Default::default()
        })
        .await
        .expect("Failed to create book")
        .id
}

pub async fn load_book(db: &DatabaseConnection, id: i32) -> book::Model {
    book::Entity::find_by_id(id)
        .one(db)
        .await
        .unwrap()
        .expect("book exists")
}

pub async fn load_loan(db: &DatabaseConnection, id: i32) -> Option<loan::Model> {
    loan::Entity::find_by_id(id).one(db).await.unwrap()
}

pub async fn active_loans_for_book(db: &DatabaseConnection, book_id: i32) -> usize {
    loan::Entity::find()
        .filter(loan::Column::BookId.eq(book_id))
        .filter(loan::Column::Status.is_in(loan::LoanStatus::ACTIVE))
        .all(db)
        .await
        .unwrap()
        .len()
}
