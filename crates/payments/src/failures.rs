//! Reconciliations that stopped part-way, kept for operators.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::PurchaseId;
use domain::{Money, ReconciliationStep};
use serde::Serialize;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationFailure {
    pub purchase_id: PurchaseId,
    pub step: ReconciliationStep,
    pub error: String,
    /// Settled total from the notification, reused when the purchase is resumed.
    pub settled_amount: Option<Money>,
    pub failed_at: DateTime<Utc>,
}

/// Process-local; entries do not survive a restart, but the purchase's own
/// stream still shows which steps are outstanding.
#[derive(Debug, Clone, Default)]
pub struct ReconciliationFailureLog {
    entries: Arc<RwLock<Vec<ReconciliationFailure>>>,
}

impl ReconciliationFailureLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, failure: ReconciliationFailure) {
        self.entries.write().await.push(failure);
    }

    pub async fn entries(&self) -> Vec<ReconciliationFailure> {
        self.entries.read().await.clone()
    }

    /// The most recent failure of a purchase.
    pub async fn latest_for(&self, purchase_id: PurchaseId) -> Option<ReconciliationFailure> {
        self.entries
            .read()
            .await
            .iter()
            .rev()
            .find(|f| f.purchase_id == purchase_id)
            .cloned()
    }

    /// Drops every entry of a purchase once it is fully reconciled.
    pub async fn clear(&self, purchase_id: PurchaseId) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|f| f.purchase_id != purchase_id);
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
