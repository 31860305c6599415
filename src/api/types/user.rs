//! Request and response bodies for the `/users` endpoints

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::user::{User, UserId};
use crate::infrastructure::user::{
    AuthenticateRequest, AuthenticatedUser, RegisterRequest, UpdateUserRequest,
};

#[derive(Debug, Clone, Deserialize)]
pub struct AuthenticateBody {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl From<AuthenticateBody> for AuthenticateRequest {
    fn from(body: AuthenticateBody) -> Self {
        Self {
            email: body.email,
            password: body.password,
            confirm_password: body.confirm_password,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterBody {
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl From<RegisterBody> for RegisterRequest {
    fn from(body: RegisterBody) -> Self {
        Self {
            first_name: body.first_name,
            last_name: body.last_name,
            email: body.email,
            password: body.password,
            confirm_password: body.confirm_password,
        }
    }
}

/// Every field is optional; omitted or empty fields are not changed
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdateUserBody {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub confirm_password: Option<String>,
}

impl From<UpdateUserBody> for UpdateUserRequest {
    fn from(body: UpdateUserBody) -> Self {
        Self {
            first_name: body.first_name,
            last_name: body.last_name,
            email: body.email,
            password: body.password,
            confirm_password: body.confirm_password,
        }
    }
}

/// Public user fields
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: UserId,
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: *user.id(),
            first_name: user.first_name().to_string(),
            last_name: user.last_name().map(str::to_string),
            email: user.email().to_string(),
            created_at: user.created_at(),
            updated_at: user.updated_at(),
        }
    }
}

/// User fields plus the issued bearer token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticateResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl From<AuthenticatedUser> for AuthenticateResponse {
    fn from(authenticated: AuthenticatedUser) -> Self {
        Self {
            user: UserResponse::from(&authenticated.user),
            token: authenticated.token.token,
            expires_at: authenticated.token.expires_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
