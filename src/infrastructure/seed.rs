//! Demo data for a fresh install

use chrono::{Duration, Utc};
use sea_orm::DatabaseConnection;

use crate::auth::hash_password;
use crate::domain::{BookInput, BookRepository, DomainError, NewUser, UserRepository};
use crate::infrastructure::{SeaOrmBookRepository, SeaOrmUserRepository};
use crate::models::Role;
use crate::services::loan_service;
use crate::utils::start_of_day;

struct DemoUser {
    name: &'static str,
    username: &'static str,
    password: &'static str,
    role: Role,
    year: i32,
}

const USERS: &[DemoUser] = &[
    DemoUser {
        name: "Administrator",
        username: "admin",
        password: "admin12345",
        role: Role::Admin,
        year: 2020,
    },
    DemoUser {
        name: "Bu Ratna Sari",
        username: "ratna",
        password: "guru12345",
        role: Role::Teacher,
        year: 2018,
    },
    DemoUser {
        name: "Budi Santoso",
        username: "budi",
        password: "siswa12345",
        role: Role::Student,
        year: 2024,
    },
    DemoUser {
        name: "Siti Aminah",
        username: "siti",
        password: "siswa12345",
        role: Role::Student,
        year: 2024,
    },
];

const BOOKS: &[(&str, &str, &str, i32, i32)] = &[
    ("Laskar Pelangi", "Andrea Hirata", "fiksi,novel", 2005, 3),
    ("Bumi Manusia", "Pramoedya Ananta Toer", "fiksi,sejarah", 1980, 2),
    ("Negeri 5 Menara", "Ahmad Fuadi", "fiksi,novel", 2009, 2),
    ("Matematika Kelas X", "Tim Penyusun", "pelajaran,matematika", 2021, 10),
    ("Fisika Dasar", "Tim Penyusun", "pelajaran,fisika", 2020, 5),
    ("Atlas Indonesia dan Dunia", "Tim Penyusun", "referensi", 2019, 1),
];

/// Inserts demo accounts, books and a few loans. Does nothing when the
/// demo admin already exists. Returns whether anything was inserted.
pub async fn seed_demo_data(db: &DatabaseConnection) -> Result<bool, DomainError> {
    let users = SeaOrmUserRepository::new(db.clone());
    let books = SeaOrmBookRepository::new(db.clone());

    if users.find_by_username("admin").await?.is_some() {
        tracing::info!("demo data already present, skipping");
        return Ok(false);
    }

    let mut ids = Vec::with_capacity(USERS.len());
    for demo in USERS {
        let password_hash = hash_password(demo.password).map_err(DomainError::Internal)?;
        let created = users
            .create(
                NewUser {
                    name: demo.name.to_string(),
                    username: demo.username.to_string(),
                    password: demo.password.to_string(),
                    role: demo.role,
                    enrollment_year: demo.year,
                    gender: None,
                    major: None,
                    phone: None,
                    photo: None,
                },
                password_hash,
            )
            .await?;
        ids.push(created.id);
    }

    let mut book_ids = Vec::with_capacity(BOOKS.len());
    for (title, author, category, year, copies) in BOOKS {
        let created = books
            .create(BookInput {
                title: title.to_string(),
                author: Some(author.to_string()),
                category: Some(category.to_string()),
                publication_year: Some(*year),
                total_copies: Some(*copies),
                location: Some("Rak utama".to_string()),
                ..Default::default()
            })
            .await?;
        book_ids.push(created.id);
    }

    let (admin, teacher, budi, siti) = (ids[0], ids[1], ids[2], ids[3]);
    let now = Utc::now();
    let due = start_of_day(now.date_naive() + Duration::days(7));

    // one waiting for pickup, two out on loan
    loan_service::request_loan(db, siti, book_ids[0], now).await?;
    loan_service::create_direct_loan(db, admin, budi, book_ids[1], due, now).await?;
    let requested = loan_service::request_loan(db, teacher, book_ids[3], now).await?;
    loan_service::approve_loan(db, requested.id, admin, due, now).await?;

    let fixed = loan_service::reconcile_availability(db).await?;
    tracing::info!(
        users = ids.len(),
        books = book_ids.len(),
        reconciled = fixed,
        "demo data seeded"
    );
    Ok(true)
}
