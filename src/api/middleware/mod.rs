//! API middleware components

pub mod logging;
pub mod user_auth;

pub use logging::logging_middleware;
pub use user_auth::{auth_middleware, extract_bearer_token, AuthState, RequireUser};
