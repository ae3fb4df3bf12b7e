//! Operator endpoints for purchases whose reconciliation stopped part-way.
//!
//! The webhook acknowledges authentic notifications even when a step fails,
//! so these are how a settled purchase gets its remaining steps applied.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::PurchaseId;
use event_store::EventStore;
use payments::{NotificationOutcome, ReconciliationFailure, ResumeAttempt};
use serde::Serialize;

use crate::error::ApiError;
use crate::identity::Operator;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ResumeResponse {
    pub purchase_id: PurchaseId,
    pub outcome: &'static str,
}

/// GET /admin/reconciliation/failures
pub async fn failures<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _operator: Operator,
) -> Json<Vec<ReconciliationFailure>> {
    Json(state.reconciler.failures().entries().await)
}

/// POST /admin/reconciliation/resume
#[tracing::instrument(skip(state))]
pub async fn resume_outstanding<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _operator: Operator,
) -> Result<Json<Vec<ResumeAttempt>>, ApiError> {
    Ok(Json(state.reconciler.resume_outstanding().await?))
}

/// POST /admin/reconciliation/{purchase_id}/resume
#[tracing::instrument(skip(state))]
pub async fn resume<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _operator: Operator,
    Path(id): Path<String>,
) -> Result<Json<ResumeResponse>, ApiError> {
    let purchase_id = PurchaseId::parse(&id)?;
    let outcome = match state.reconciler.resume(purchase_id).await? {
        NotificationOutcome::Reconciled { .. } => "reconciled",
        NotificationOutcome::AlreadyReconciled { .. } => "already_reconciled",
        NotificationOutcome::Ignored { .. } => "ignored",
    };
    Ok(Json(ResumeResponse {
        purchase_id,
        outcome,
    }))
}
