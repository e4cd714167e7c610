//! Infrastructure: everything that touches SQLite, the filesystem, the
//! environment or the network.
//!
//! `db` owns the schema, `repositories` the sea-orm implementations of the
//! domain traits, `storage` the cover files. `auth` holds password hashing,
//! tokens and the role extractors; `server` and `state` wire the router.
//! `seed` fills a fresh database with demo data.

pub mod auth;
pub mod config;
pub mod db;
pub mod repositories;
pub mod seed;
pub mod server;
pub mod state;
pub mod storage;

pub use repositories::*;
pub use state::AppState;
