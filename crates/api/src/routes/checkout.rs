//! Checkout and purchase endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::CourseId;
use event_store::EventStore;
use payments::PurchaseStatusReport;
use projections::PurchaseSummary;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::identity::CurrentUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CheckoutRequestBody {
    pub course_id: String,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub checkout_url: String,
}

/// POST /checkout
///
/// Only registered users can buy; the redirect url is all the client needs.
#[tracing::instrument(skip(state, req))]
pub async fn initiate<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
    Json(req): Json<CheckoutRequestBody>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let course_id = CourseId::parse(&req.course_id)?;
    state.accounts.get_profile(user_id).await?;

    let started = state.checkout.initiate_checkout(user_id, course_id).await?;
    Ok(Json(CheckoutResponse {
        checkout_url: started.checkout_url,
    }))
}

/// GET /purchases
pub async fn list<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<Vec<PurchaseSummary>>, ApiError> {
    Ok(Json(state.checkout.purchases_for_user(user_id).await?))
}

/// GET /courses/{id}/purchase-status
#[tracing::instrument(skip(state))]
pub async fn status<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<PurchaseStatusReport>, ApiError> {
    let course_id = CourseId::parse(&id)?;
    Ok(Json(state.checkout.purchase_status(user_id, course_id).await?))
}
