//! Application state containing repositories and shared resources

use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::domain::{BookRepository, UserRepository};
use crate::infrastructure::config::Config;
use crate::infrastructure::storage::{CoverStorage, LocalCoverStorage};
use crate::infrastructure::{SeaOrmBookRepository, SeaOrmUserRepository};
use crate::services::loan_service::DEFAULT_FINE_PER_DAY;

/// Runtime knobs the handlers need
#[derive(Clone, Copy, Debug)]
pub struct LoanSettings {
    pub fine_per_day: i64,
}

impl Default for LoanSettings {
    fn default() -> Self {
        Self {
            fine_per_day: DEFAULT_FINE_PER_DAY,
        }
    }
}

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    db: DatabaseConnection,
    pub book_repo: Arc<dyn BookRepository>,
    pub user_repo: Arc<dyn UserRepository>,
    pub covers: Arc<dyn CoverStorage>,
    pub loans: LoanSettings,
}

impl AppState {
    /// State with default settings and covers under `./storage`
    pub fn new(db: DatabaseConnection) -> Self {
        Self::from_config(db, &Config::default())
    }

    pub fn from_config(db: DatabaseConnection, config: &Config) -> Self {
        Self {
            book_repo: Arc::new(SeaOrmBookRepository::new(db.clone())),
            user_repo: Arc::new(SeaOrmUserRepository::new(db.clone())),
            covers: Arc::new(LocalCoverStorage::new(config.cover_dir.clone())),
            loans: LoanSettings {
                fine_per_day: config.fine_per_day,
            },
            db,
        }
    }

    /// Swap the cover backend (tests use a temp dir or an in-memory store)
    pub fn with_covers(mut self, covers: Arc<dyn CoverStorage>) -> Self {
        self.covers = covers;
        self
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}

impl axum::extract::FromRef<AppState> for DatabaseConnection {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}
