use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr, Statement};

pub async fn init_db(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect(database_url).await?;

    // Run migrations manually (simple SQL)
    run_migrations(&db).await?;

    Ok(db)
}

async fn execute(db: &DatabaseConnection, sql: &str) -> Result<(), DbErr> {
    db.execute(Statement::from_string(
        db.get_database_backend(),
        sql.to_owned(),
    ))
    .await?;
    Ok(())
}

async fn run_migrations(db: &DatabaseConnection) -> Result<(), DbErr> {
    execute(db, "PRAGMA foreign_keys = ON").await?;

    // Books: soft-deleted through deleted_at
    execute(
        db,
        r#"
        CREATE TABLE IF NOT EXISTS books (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            author TEXT,
            publisher TEXT,
            publication_year INTEGER,
            isbn TEXT,
            call_number TEXT,
            collection_origin TEXT,
            publication_city TEXT,
            location TEXT,
            description TEXT,
            category TEXT,
            total_copies INTEGER NOT NULL DEFAULT 0,
            available_copies INTEGER NOT NULL DEFAULT 0,
            cover TEXT,
            cover_type TEXT NOT NULL DEFAULT 'upload' CHECK (cover_type IN ('upload', 'url')),
            deleted_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            CHECK (available_copies >= 0 AND available_copies <= total_copies)
        )
        "#,
    )
    .await?;

    execute(
        db,
        "CREATE INDEX IF NOT EXISTS books_title_idx ON books (title)",
    )
    .await?;

    // Users: stable surrogate id, member_code carries the enrollment year
    execute(
        db,
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            member_code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            username TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'student' CHECK (role IN ('admin', 'teacher', 'student')),
            enrollment_year INTEGER NOT NULL,
            gender TEXT,
            major TEXT,
            phone TEXT,
            photo TEXT,
            deleted_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .await?;

    // Per-year counter behind member codes
    execute(
        db,
        r#"
        CREATE TABLE IF NOT EXISTS member_sequences (
            year INTEGER PRIMARY KEY,
            last_seq INTEGER NOT NULL
        )
        "#,
    )
    .await?;

    // Loans
    execute(
        db,
        r#"
        CREATE TABLE IF NOT EXISTS loans (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            book_id INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending_pickup'
                CHECK (status IN ('pending_pickup', 'borrowed', 'overdue', 'returned')),
            request_date TEXT NOT NULL,
            approval_date TEXT,
            approved_by INTEGER,
            due_date TEXT,
            return_date TEXT,
            fine_amount INTEGER NOT NULL DEFAULT 0,
            notes TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY (book_id) REFERENCES books(id) ON DELETE CASCADE,
            FOREIGN KEY (approved_by) REFERENCES users(id) ON DELETE SET NULL
        )
        "#,
    )
    .await?;

    // At most one pending/borrowed/overdue loan per (user, book)
    execute(
        db,
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS loans_one_active_per_pair
        ON loans (user_id, book_id)
        WHERE status IN ('pending_pickup', 'borrowed', 'overdue')
        "#,
    )
    .await?;

    execute(
        db,
        "CREATE INDEX IF NOT EXISTS loans_status_due_idx ON loans (status, due_date)",
    )
    .await?;

    tracing::debug!("database migrations applied");

    Ok(())
}
