//! Repository implementations using SeaORM

pub mod book_repository;
pub mod user_repository;

pub use book_repository::SeaOrmBookRepository;
pub use user_repository::{SeaOrmUserRepository, allocate_member_code};
