//! User repository trait

use async_trait::async_trait;
use std::fmt::Debug;

use super::entity::{User, UserId};
use crate::domain::DomainError;

/// Repository trait for user storage
///
/// Implementations must enforce email uniqueness atomically inside `create` and
/// `update`, reporting a duplicate as `DomainError::Conflict`. A missing row on
/// `update`/`delete` is `DomainError::NotFound`; I/O failures are
/// `DomainError::Storage`.
#[async_trait]
pub trait UserRepository: Send + Sync + Debug {
    /// Get a user by their ID
    async fn get(&self, id: &UserId) -> Result<Option<User>, DomainError>;

    /// Get a user by normalized email
    async fn get_by_email(&self, email: &str) -> Result<Option<User>, DomainError>;

    /// Insert a new user
    async fn create(&self, user: User) -> Result<User, DomainError>;

    /// Replace an existing user
    async fn update(&self, user: &User) -> Result<User, DomainError>;

    /// Remove a user permanently
    async fn delete(&self, id: &UserId) -> Result<(), DomainError>;

    /// List all users, in no particular order
    async fn list(&self) -> Result<Vec<User>, DomainError>;

    /// Count users
    async fn count(&self) -> Result<usize, DomainError>;

    /// Check if a normalized email is taken
    async fn email_exists(&self, email: &str) -> Result<bool, DomainError> {
        Ok(self.get_by_email(email).await?.is_some())
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    /// Mock user repository for testing
    ///
    /// `set_should_fail` makes every call return a storage error, and
    /// `set_skip_lookups` hides existing rows from `get_by_email`, which lets
    /// tests reproduce a uniqueness violation that only surfaces at insert time.
    #[derive(Debug, Default)]
    pub struct MockUserRepository {
        users: Arc<RwLock<HashMap<UserId, User>>>,
        should_fail: Arc<RwLock<bool>>,
        skip_lookups: Arc<RwLock<bool>>,
    }

    impl MockUserRepository {
        /// Create a new mock repository
        pub fn new() -> Self {
            Self::default()
        }

        /// Set whether operations should fail
        pub async fn set_should_fail(&self, fail: bool) {
            *self.should_fail.write().await = fail;
        }

        /// Set whether email lookups pretend nothing is stored
        pub async fn set_skip_lookups(&self, skip: bool) {
            *self.skip_lookups.write().await = skip;
        }

        /// Read a stored user bypassing the failure switch
        pub async fn stored(&self, id: &UserId) -> Option<User> {
            self.users.read().await.get(id).cloned()
        }

        async fn check_should_fail(&self) -> Result<(), DomainError> {
            if *self.should_fail.read().await {
                return Err(DomainError::storage("Mock repository configured to fail"));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl UserRepository for MockUserRepository {
        async fn get(&self, id: &UserId) -> Result<Option<User>, DomainError> {
            self.check_should_fail().await?;
            let users = self.users.read().await;
            Ok(users.get(id).cloned())
        }

        async fn get_by_email(&self, email: &str) -> Result<Option<User>, DomainError> {
            self.check_should_fail().await?;

            if *self.skip_lookups.read().await {
                return Ok(None);
            }

            let users = self.users.read().await;
            Ok(users.values().find(|u| u.email() == email).cloned())
        }

        async fn create(&self, user: User) -> Result<User, DomainError> {
            self.check_should_fail().await?;
            let mut users = self.users.write().await;

            if users.values().any(|u| u.email() == user.email()) {
                return Err(DomainError::conflict(format!(
                    "Email '{}' is already taken",
                    user.email()
                )));
            }

            users.insert(*user.id(), user.clone());
            Ok(user)
        }

        async fn update(&self, user: &User) -> Result<User, DomainError> {
            self.check_should_fail().await?;
            let mut users = self.users.write().await;

            if !users.contains_key(user.id()) {
                return Err(DomainError::not_found(format!("User '{}' not found", user.id())));
            }

            if users
                .values()
                .any(|u| u.id() != user.id() && u.email() == user.email())
            {
                return Err(DomainError::conflict(format!(
                    "Email '{}' is already taken",
                    user.email()
                )));
            }

            users.insert(*user.id(), user.clone());
            Ok(user.clone())
        }

        async fn delete(&self, id: &UserId) -> Result<(), DomainError> {
            self.check_should_fail().await?;
            let mut users = self.users.write().await;

            users
                .remove(id)
                .map(|_| ())
                .ok_or_else(|| DomainError::not_found(format!("User '{}' not found", id)))
        }

        async fn list(&self) -> Result<Vec<User>, DomainError> {
            self.check_should_fail().await?;
            let users = self.users.read().await;
            Ok(users.values().cloned().collect())
        }

        async fn count(&self) -> Result<usize, DomainError> {
            self.check_should_fail().await?;
            Ok(self.users.read().await.len())
        }
    }
}
