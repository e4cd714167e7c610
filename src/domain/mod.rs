//! Domain layer - Pure business abstractions
//!
//! Trait definitions, input types and the domain error type. Persistence
//! lives in the infrastructure layer.

pub mod errors;
pub mod repositories;

pub use errors::DomainError;
pub use repositories::*;
