//! In-memory user repository implementation

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::user::{User, UserId, UserRepository};
use crate::domain::DomainError;

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<UserId, User>,
    /// Normalized email -> user ID; the uniqueness constraint
    email_index: HashMap<String, UserId>,
}

/// In-memory implementation of UserRepository
///
/// Rows and the email index sit behind one lock, so the uniqueness check and
/// the write happen atomically.
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserRepository {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryUserRepository {
    /// Create a new empty repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a repository with initial users
    pub fn with_users(users: Vec<User>) -> Self {
        let mut tables = Tables::default();

        for user in users {
            tables.email_index.insert(user.email().to_string(), *user.id());
            tables.users.insert(*user.id(), user);
        }

        Self {
            tables: Arc::new(RwLock::new(tables)),
        }
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn get(&self, id: &UserId) -> Result<Option<User>, DomainError> {
        let tables = self.tables.read().await;
        Ok(tables.users.get(id).cloned())
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, DomainError> {
        let tables = self.tables.read().await;

        Ok(tables
            .email_index
            .get(email)
            .and_then(|id| tables.users.get(id))
            .cloned())
    }

    async fn create(&self, user: User) -> Result<User, DomainError> {
        let mut tables = self.tables.write().await;

        if tables.users.contains_key(user.id()) {
            return Err(DomainError::conflict(format!(
                "User with ID '{}' already exists",
                user.id()
            )));
        }

        if tables.email_index.contains_key(user.email()) {
            return Err(DomainError::conflict(format!(
                "Email '{}' is already taken",
                user.email()
            )));
        }

        tables.email_index.insert(user.email().to_string(), *user.id());
        tables.users.insert(*user.id(), user.clone());

        Ok(user)
    }

    async fn update(&self, user: &User) -> Result<User, DomainError> {
        let mut tables = self.tables.write().await;

        let old_email = match tables.users.get(user.id()) {
            Some(existing) => existing.email().to_string(),
            None => return Err(DomainError::not_found(format!("User '{}' not found", user.id()))),
        };

        if old_email != user.email() {
            if tables.email_index.contains_key(user.email()) {
                return Err(DomainError::conflict(format!(
                    "Email '{}' is already taken",
                    user.email()
                )));
            }

            tables.email_index.remove(&old_email);
            tables.email_index.insert(user.email().to_string(), *user.id());
        }

        tables.users.insert(*user.id(), user.clone());

        Ok(user.clone())
    }

    async fn delete(&self, id: &UserId) -> Result<(), DomainError> {
        let mut tables = self.tables.write().await;

        match tables.users.remove(id) {
            Some(user) => {
                tables.email_index.remove(user.email());
                Ok(())
            }
            None => Err(DomainError::not_found(format!("User '{}' not found", id))),
        }
    }

    async fn list(&self) -> Result<Vec<User>, DomainError> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().cloned().collect())
    }

    async fn count(&self) -> Result<usize, DomainError> {
        Ok(self.tables.read().await.users.len())
    }
}
