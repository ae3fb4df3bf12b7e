//! Caller identity.
//!
//! Sessions and credentials belong to the external identity service, which
//! forwards the authenticated user's id in the `x-user-id` header. Operators
//! present the configured token in `x-operator-token`.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::UserId;
use event_store::EventStore;

use crate::error::ApiError;
use crate::state::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const OPERATOR_TOKEN_HEADER: &str = "x-operator-token";

/// The authenticated caller.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub UserId);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("missing caller identity".to_string()))?;

        UserId::parse(value)
            .map(CurrentUser)
            .map_err(|_| ApiError::Unauthorized("malformed caller identity".to_string()))
    }
}

/// A caller holding the operator token.
#[derive(Debug, Clone, Copy)]
pub struct Operator;

impl<S> FromRequestParts<Arc<AppState<S>>> for Operator
where
    S: EventStore + Clone + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S>>,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.operator_token.as_deref() else {
            return Err(ApiError::Forbidden("operator access is disabled".to_string()));
        };
        let presented = parts
            .headers
            .get(OPERATOR_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("missing operator token".to_string()))?;

        if constant_time_eq::constant_time_eq(presented.as_bytes(), expected.as_bytes()) {
            Ok(Operator)
        } else {
            Err(ApiError::Forbidden("invalid operator token".to_string()))
        }
    }
}
