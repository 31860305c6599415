//! Domain layer - user identity entities, rules and errors

pub mod error;
pub mod user;

pub use error::DomainError;
