//! User domain
//!
//! This module provides domain types and traits for user identity,
//! including the user entity, field validation, and the repository trait.

mod entity;
mod repository;
mod validation;

pub use entity::{User, UserId};
pub use repository::UserRepository;
pub use validation::{
    normalize_email, validate_confirmation, validate_email, validate_first_name,
    validate_last_name, validate_password, UserValidationError,
};

#[cfg(test)]
pub use repository::mock::MockUserRepository;
