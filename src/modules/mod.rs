//! Format adapters at the edge of the catalog

pub mod book_csv;
