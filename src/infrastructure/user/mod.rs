//! User infrastructure module
//!
//! Password hashing with Argon2, the in-memory and PostgreSQL repositories,
//! and the identity service that ties them together.

mod password;
mod postgres_repository;
mod repository;
mod service;

pub use password::{Argon2Config, Argon2Hasher, PasswordHasher};
pub use postgres_repository::PostgresUserRepository;
pub use repository::InMemoryUserRepository;
pub use service::{
    AuthenticateRequest, AuthenticatedUser, RegisterRequest, UpdateUserRequest,
    UserIdentityService,
};

#[cfg(test)]
pub(crate) use password::test_hasher;
