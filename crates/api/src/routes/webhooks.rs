//! Payment provider notifications.
//!
//! Anything that fails signature verification is rejected with 400. Once a
//! notification is authentic it is always acknowledged with 200, so the
//! provider stops redelivering; processing errors are logged and left in the
//! reconciliation failure log.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use event_store::EventStore;
use payments::NotificationOutcome;
use serde_json::{Value, json};
use tracing::Instrument;

use crate::error::ApiError;
use crate::state::AppState;

pub const SIGNATURE_HEADER: &str = "payment-signature";

/// POST /webhooks/payments
pub async fn payments<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("missing signature header".to_string()))?;

    let notification = state.verifier.verify(&body, signature).inspect_err(|e| {
        metrics::counter!("payment_notifications_total", "outcome" => "rejected").increment(1);
        tracing::warn!(error = %e, "payment notification rejected");
    })?;
    let span = tracing::info_span!(
        "payment_notification",
        notification_id = %notification.id,
        kind = %notification.kind,
    );

    match state
        .reconciler
        .handle_notification(&notification)
        .instrument(span.clone())
        .await
    {
        Ok(NotificationOutcome::Ignored { kind }) => {
            span.in_scope(|| tracing::debug!(%kind, "notification ignored"));
        }
        Ok(NotificationOutcome::Reconciled { purchase_id }) => {
            span.in_scope(|| tracing::info!(%purchase_id, "purchase reconciled"));
        }
        Ok(NotificationOutcome::AlreadyReconciled { purchase_id }) => {
            span.in_scope(|| tracing::info!(%purchase_id, "duplicate notification"));
        }
        Err(e) => {
            span.in_scope(|| tracing::error!(error = %e, "notification processing failed"));
        }
    }

    Ok(Json(json!({ "received": true })))
}
