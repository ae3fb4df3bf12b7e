//! Account endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use domain::{NewUser, ProfileUpdate, User};
use event_store::EventStore;

use crate::error::ApiError;
use crate::identity::CurrentUser;
use crate::state::AppState;

/// POST /users
#[tracing::instrument(skip(state, req), fields(role = %req.role))]
pub async fn register<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<NewUser>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let user = state.accounts.register_user(req).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /users/me
#[tracing::instrument(skip(state))]
pub async fn profile<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<User>, ApiError> {
    Ok(Json(state.accounts.get_profile(user_id).await?))
}

/// PATCH /users/me
#[tracing::instrument(skip(state, req))]
pub async fn update_profile<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
    Json(req): Json<ProfileUpdate>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(state.accounts.update_profile(user_id, req).await?))
}
