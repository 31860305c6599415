//! Application state for shared services

use std::sync::Arc;

use crate::domain::user::{User, UserRepository};
use crate::domain::DomainError;
use crate::infrastructure::auth::TokenIssuer;
use crate::infrastructure::user::{
    AuthenticateRequest, AuthenticatedUser, PasswordHasher, RegisterRequest, UpdateUserRequest,
    UserIdentityService,
};

/// Application state containing shared services using dynamic dispatch
#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<dyn UserServiceTrait>,
    pub token_issuer: Arc<dyn TokenIssuer>,
}

impl AppState {
    pub fn new(user_service: Arc<dyn UserServiceTrait>, token_issuer: Arc<dyn TokenIssuer>) -> Self {
        Self {
            user_service,
            token_issuer,
        }
    }
}

/// Trait for user identity operations
#[async_trait::async_trait]
pub trait UserServiceTrait: Send + Sync {
    async fn authenticate(
        &self,
        request: AuthenticateRequest,
    ) -> Result<AuthenticatedUser, DomainError>;
    async fn register(&self, request: RegisterRequest) -> Result<User, DomainError>;
    async fn get(&self, id: &str) -> Result<User, DomainError>;
    async fn list(&self) -> Result<Vec<User>, DomainError>;
    async fn update(&self, id: &str, request: UpdateUserRequest) -> Result<User, DomainError>;
    async fn delete(&self, id: &str) -> Result<(), DomainError>;
    async fn count(&self) -> Result<usize, DomainError>;
}

#[async_trait::async_trait]
impl<R, H> UserServiceTrait for UserIdentityService<R, H>
where
    R: UserRepository + 'static,
    H: PasswordHasher + 'static,
{
    async fn authenticate(
        &self,
        request: AuthenticateRequest,
    ) -> Result<AuthenticatedUser, DomainError> {
        UserIdentityService::authenticate(self, request).await
    }

    async fn register(&self, request: RegisterRequest) -> Result<User, DomainError> {
        UserIdentityService::register(self, request).await
    }

    async fn get(&self, id: &str) -> Result<User, DomainError> {
        UserIdentityService::get(self, id).await
    }

    async fn list(&self) -> Result<Vec<User>, DomainError> {
        UserIdentityService::list(self).await
    }

    async fn update(&self, id: &str, request: UpdateUserRequest) -> Result<User, DomainError> {
        UserIdentityService::update(self, id, request).await
    }

    async fn delete(&self, id: &str) -> Result<(), DomainError> {
        UserIdentityService::delete(self, id).await
    }

    async fn count(&self) -> Result<usize, DomainError> {
        UserIdentityService::count(self).await
    }
}
