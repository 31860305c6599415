//! Bearer-token authentication
//!
//! `auth_middleware` never rejects a request. It resolves the bearer token, if
//! any, into an [`AuthState`] request extension. Protected handlers take a
//! [`RequireUser`] argument, which turns `Unauthenticated` into a 401.

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::domain::user::UserId;

/// Identity resolved for the current request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    Authenticated(UserId),
}

/// Resolve the caller's identity and attach it to the request
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let auth_state = match extract_bearer_token(request.headers()) {
        None => AuthState::Unauthenticated,
        Some(token) => match state.token_issuer.validate(token) {
            Ok(claims) => match claims.user_id() {
                Ok(user_id) => AuthState::Authenticated(user_id),
                Err(e) => {
                    debug!(error = %e, "Token subject is not a user id");
                    AuthState::Unauthenticated
                }
            },
            Err(e) => {
                debug!(error = %e, "Rejected bearer token");
                AuthState::Unauthenticated
            }
        },
    };

    request.extensions_mut().insert(auth_state);
    next.run(request).await
}

/// Extractor for handlers that require an authenticated caller
#[derive(Debug, Clone, Copy)]
pub struct RequireUser(pub UserId);

impl<S> FromRequestParts<S> for RequireUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<AuthState>() {
            Some(AuthState::Authenticated(user_id)) => Ok(RequireUser(*user_id)),
            _ => Err(ApiError::unauthorized(
                "Authentication required. Provide a token via 'Authorization: Bearer <token>'",
            )),
        }
    }
}

/// Token from an `Authorization: Bearer <token>` header, if one is present
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;

    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
