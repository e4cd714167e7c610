//! Services Layer
//!
//! Business logic shared by the HTTP handlers, the CLI and the background
//! sweep. Functions take a connection and the clock explicitly.

pub mod book_service;
pub mod loan_service;
pub mod report_service;
