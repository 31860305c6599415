//! User endpoints
//!
//! `authenticate` and `register` are public. Every other route requires a
//! bearer token resolved by the auth middleware.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Router,
};
use tracing::debug;

use crate::api::middleware::RequireUser;
use crate::api::state::AppState;
use crate::api::types::{
    ApiError, AuthenticateBody, AuthenticateResponse, Json, MessageResponse, RegisterBody,
    UpdateUserBody, UserResponse,
};

/// Create the users router
pub fn create_users_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users))
        .route("/authenticate", post(authenticate))
        .route("/register", post(register))
        .route("/{id}", get(get_user).put(update_user).delete(delete_user))
}

/// POST /users/authenticate
pub async fn authenticate(
    State(state): State<AppState>,
    Json(body): Json<AuthenticateBody>,
) -> Result<Json<AuthenticateResponse>, ApiError> {
    let authenticated = state
        .user_service
        .authenticate(body.into())
        .await
        .map_err(ApiError::from)?;

    Ok(Json(authenticated.into()))
}

/// POST /users/register
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterBody>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .user_service
        .register(body.into())
        .await
        .map_err(ApiError::from)?;

    Ok(Json(MessageResponse::new(
        "Registration successful! Check your email!",
    )))
}

/// GET /users
pub async fn list_users(
    RequireUser(caller): RequireUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    debug!(caller = %caller, "Listing users");

    let users = state.user_service.list().await.map_err(ApiError::from)?;

    Ok(Json(users.iter().map(UserResponse::from).collect()))
}

/// GET /users/{id}
pub async fn get_user(
    RequireUser(caller): RequireUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, ApiError> {
    debug!(caller = %caller, user_id = %id, "Getting user");

    let user = state
        .user_service
        .get(&id)
        .await
        .map_err(|e| ApiError::from(e).with_param("id"))?;

    Ok(Json(UserResponse::from(&user)))
}

/// PUT /users/{id}
pub async fn update_user(
    RequireUser(caller): RequireUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateUserBody>,
) -> Result<Json<MessageResponse>, ApiError> {
    debug!(caller = %caller, user_id = %id, "Updating user");

    state
        .user_service
        .update(&id, body.into())
        .await
        .map_err(ApiError::from)?;

    Ok(Json(MessageResponse::new("User updated successfully")))
}

/// DELETE /users/{id}
pub async fn delete_user(
    RequireUser(caller): RequireUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    debug!(caller = %caller, user_id = %id, "Deleting user");

    state
        .user_service
        .delete(&id)
        .await
        .map_err(|e| ApiError::from(e).with_param("id"))?;

    Ok(Json(MessageResponse::new("User deleted successfully")))
}
