pub mod book;
pub mod loan;
pub mod member_sequence;
pub mod user;

pub use book::{Book, CoverType};
pub use loan::{LoanStatus, LoanView};
pub use user::{Role, User};
