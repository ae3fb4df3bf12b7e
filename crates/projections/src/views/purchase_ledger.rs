//! Purchase ledger read model: correlation-id and per-user indexes.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CourseId, PurchaseId, UserId};
use domain::{Money, PurchaseEvent, PurchaseStatus};
use event_store::EventEnvelope;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::Result;
use crate::error::decode;
use crate::projection::{Checkpoint, Projection};

/// One purchase as the query side sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurchaseSummary {
    pub purchase_id: PurchaseId,
    pub user_id: UserId,
    pub course_id: CourseId,
    pub amount: Money,
    pub status: PurchaseStatus,
    pub correlation_id: Option<String>,
    pub reconciled: bool,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct LedgerState {
    purchases: HashMap<PurchaseId, PurchaseSummary>,
    by_correlation: HashMap<String, PurchaseId>,
    by_user: HashMap<UserId, Vec<PurchaseId>>,
    checkpoint: Checkpoint,
}

impl LedgerState {
    fn fold(&mut self, purchase_id: PurchaseId, event: PurchaseEvent) {
        if let PurchaseEvent::PurchaseCreated(data) = event {
            if self.purchases.contains_key(&purchase_id) {
                return;
            }
            self.by_user
                .entry(data.user_id)
                .or_default()
                .push(purchase_id);
            self.purchases.insert(
                purchase_id,
                PurchaseSummary {
                    purchase_id,
                    user_id: data.user_id,
                    course_id: data.course_id,
                    amount: data.amount,
                    status: PurchaseStatus::Pending,
                    correlation_id: None,
                    reconciled: false,
                    created_at: data.created_at,
                    settled_at: None,
                },
            );
            return;
        }

        let Some(summary) = self.purchases.get_mut(&purchase_id) else {
            tracing::warn!(%purchase_id, "purchase event before creation, skipped");
            return;
        };

        match event {
            PurchaseEvent::CheckoutSessionAttached { correlation_id } => {
                self.by_correlation
                    .insert(correlation_id.clone(), purchase_id);
                summary.correlation_id = Some(correlation_id);
            }
            PurchaseEvent::PaymentSettled {
                settled_amount,
                settled_at,
            } => {
                summary.status = PurchaseStatus::Completed;
                summary.settled_at = Some(settled_at);
                if let Some(amount) = settled_amount {
                    summary.amount = amount;
                }
            }
            PurchaseEvent::ReconciliationFinished { .. } => {
                summary.reconciled = true;
            }
            PurchaseEvent::LecturePreviewsUnlocked { .. }
            | PurchaseEvent::UserEnrollmentApplied
            | PurchaseEvent::CourseEnrollmentApplied
            | PurchaseEvent::PurchaseCreated(_) => {}
        }
    }
}

/// Indexes purchases by provider correlation id and by buyer.
///
/// The notification handler resolves correlation ids here; the only other
/// readers are per-user queries, which never see another user's purchases.
#[derive(Clone, Default)]
pub struct PurchaseLedgerView {
    state: Arc<RwLock<LedgerState>>,
}

impl PurchaseLedgerView {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, purchase_id: PurchaseId) -> Option<PurchaseSummary> {
        self.state.read().await.purchases.get(&purchase_id).cloned()
    }

    pub async fn find_by_correlation(&self, correlation_id: &str) -> Option<PurchaseSummary> {
        let state = self.state.read().await;
        state
            .by_correlation
            .get(correlation_id)
            .and_then(|id| state.purchases.get(id))
            .cloned()
    }

    /// The user's purchases, oldest first.
    pub async fn purchases_for_user(&self, user_id: UserId) -> Vec<PurchaseSummary> {
        let state = self.state.read().await;
        state
            .by_user
            .get(&user_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| state.purchases.get(id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The user's most relevant active purchase of a course: a completed one
    /// if any, otherwise the most recent pending one.
    pub async fn purchase_for(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Option<PurchaseSummary> {
        let mut candidates: Vec<PurchaseSummary> = self
            .purchases_for_user(user_id)
            .await
            .into_iter()
            .filter(|p| p.course_id == course_id && p.status.is_active())
            .collect();

        if let Some(pos) = candidates
            .iter()
            .position(|p| p.status == PurchaseStatus::Completed)
        {
            return Some(candidates.swap_remove(pos));
        }
        candidates.pop()
    }

    /// Settled purchases whose reconciliation has not finished.
    pub async fn outstanding(&self) -> Vec<PurchaseSummary> {
        let state = self.state.read().await;
        let mut outstanding: Vec<PurchaseSummary> = state
            .purchases
            .values()
            .filter(|p| p.status == PurchaseStatus::Completed && !p.reconciled)
            .cloned()
            .collect();
        outstanding.sort_by_key(|p| p.created_at);
        outstanding
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.purchases.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl Projection for PurchaseLedgerView {
    fn name(&self) -> &'static str {
        "PurchaseLedgerView"
    }

    async fn apply(&self, checkpoint: Checkpoint, event: &EventEnvelope) -> Result<()> {
        let mut state = self.state.write().await;
        state.checkpoint = checkpoint;

        if event.aggregate_type != "Purchase" {
            return Ok(());
        }

        let purchase_id = PurchaseId::from_uuid(event.aggregate_id.as_uuid());
        let purchase_event: PurchaseEvent = decode(event)?;
        state.fold(purchase_id, purchase_event);
        Ok(())
    }

    async fn checkpoint(&self) -> Checkpoint {
        self.state.read().await.checkpoint
    }

    async fn reset(&self) -> Result<()> {
        *self.state.write().await = LedgerState::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::AggregateId;
    use domain::DomainEvent;
    use event_store::Version;

    struct Feed {
        view: PurchaseLedgerView,
        position: u64,
    }

    impl Feed {
        fn new() -> Self {
            Self {
                view: PurchaseLedgerView::new(),
                position: 0,
            }
        }

        async fn push(&mut self, purchase_id: PurchaseId, version: i64, event: PurchaseEvent) {
            self.position += 1;
            let envelope = EventEnvelope::builder()
                .aggregate_id(AggregateId::from(purchase_id))
                .aggregate_type("Purchase")
                .event_type(event.event_type())
                .version(Version::new(version))
                .payload(&event)
                .unwrap()
                .build()
                .unwrap();
            self.view
                .apply(Checkpoint::at(self.position), &envelope)
                .await
                .unwrap();
        }

        async fn open(&mut self, user_id: UserId, course_id: CourseId, amount: i64) -> PurchaseId {
            let purchase_id = PurchaseId::new();
            let created = PurchaseEvent::PurchaseCreated(domain::ledger::PurchaseCreatedData {
                purchase_id,
                user_id,
                course_id,
                amount: Money::from_minor(amount),
                created_at: Utc::now(),
            });
            self.push(purchase_id, 1, created).await;
            purchase_id
        }
    }

    #[tokio::test]
    async fn indexes_by_correlation_id_once_attached() {
        let mut feed = Feed::new();
        let user = UserId::new();
        let purchase_id = feed.open(user, CourseId::new(), 500).await;

        assert!(feed.view.find_by_correlation("cs_1").await.is_none());

        feed.push(
            purchase_id,
            2,
            PurchaseEvent::CheckoutSessionAttached {
                correlation_id: "cs_1".into(),
            },
        )
        .await;

        let found = feed.view.find_by_correlation("cs_1").await.unwrap();
        assert_eq!(found.purchase_id, purchase_id);
        assert_eq!(found.status, PurchaseStatus::Pending);
        assert_eq!(found.amount, Money::from_minor(500));
    }

    #[tokio::test]
    async fn settlement_updates_status_and_amount() {
        let mut feed = Feed::new();
        let purchase_id = feed.open(UserId::new(), CourseId::new(), 500).await;
        feed.push(
            purchase_id,
            2,
            PurchaseEvent::PaymentSettled {
                settled_amount: Some(Money::from_minor(450)),
                settled_at: Utc::now(),
            },
        )
        .await;
        feed.push(
            purchase_id,
            3,
            PurchaseEvent::ReconciliationFinished {
                finished_at: Utc::now(),
            },
        )
        .await;

        let summary = feed.view.get(purchase_id).await.unwrap();
        assert_eq!(summary.status, PurchaseStatus::Completed);
        assert_eq!(summary.amount, Money::from_minor(450));
        assert!(summary.settled_at.is_some());
        assert!(summary.reconciled);
    }

    #[tokio::test]
    async fn per_user_queries_are_isolated() {
        let mut feed = Feed::new();
        let alice = UserId::new();
        let bob = UserId::new();
        let course = CourseId::new();

        feed.open(alice, course, 500).await;
        feed.open(alice, CourseId::new(), 300).await;
        feed.open(bob, course, 500).await;

        assert_eq!(feed.view.purchases_for_user(alice).await.len(), 2);
        assert_eq!(feed.view.purchases_for_user(bob).await.len(), 1);
        assert!(feed.view.purchases_for_user(UserId::new()).await.is_empty());
        assert_eq!(
            feed.view.purchase_for(bob, course).await.unwrap().user_id,
            bob
        );
    }

    #[tokio::test]
    async fn purchase_for_prefers_completed_over_later_pending() {
        let mut feed = Feed::new();
        let user = UserId::new();
        let course = CourseId::new();

        let paid = feed.open(user, course, 500).await;
        feed.push(
            paid,
            2,
            PurchaseEvent::PaymentSettled {
                settled_amount: None,
                settled_at: Utc::now(),
            },
        )
        .await;
        feed.open(user, course, 500).await;

        let chosen = feed.view.purchase_for(user, course).await.unwrap();
        assert_eq!(chosen.purchase_id, paid);
        assert!(feed.view.purchase_for(user, CourseId::new()).await.is_none());
    }

    #[tokio::test]
    async fn repeated_creation_is_folded_once() {
        let view = PurchaseLedgerView::new();
        let user = UserId::new();
        let purchase_id = PurchaseId::new();
        let created = PurchaseEvent::PurchaseCreated(domain::ledger::PurchaseCreatedData {
            purchase_id,
            user_id: user,
            course_id: CourseId::new(),
            amount: Money::from_minor(500),
            created_at: Utc::now(),
        });
        let envelope = EventEnvelope::builder()
            .aggregate_id(AggregateId::from(purchase_id))
            .aggregate_type("Purchase")
            .event_type(created.event_type())
            .version(Version::first())
            .payload(&created)
            .unwrap()
            .build()
            .unwrap();

        view.apply(Checkpoint::at(1), &envelope).await.unwrap();
        view.apply(Checkpoint::at(2), &envelope).await.unwrap();

        assert_eq!(view.len().await, 1);
        assert_eq!(view.purchases_for_user(user).await.len(), 1);
    }

    #[tokio::test]
    async fn outstanding_lists_settled_but_unfinished_purchases() {
        let mut feed = Feed::new();
        let settled = feed.open(UserId::new(), CourseId::new(), 500).await;
        let finished = feed.open(UserId::new(), CourseId::new(), 500).await;
        feed.open(UserId::new(), CourseId::new(), 500).await;

        for purchase_id in [settled, finished] {
            feed.push(
                purchase_id,
                2,
                PurchaseEvent::PaymentSettled {
                    settled_amount: None,
                    settled_at: Utc::now(),
                },
            )
            .await;
        }
        feed.push(
            finished,
            3,
            PurchaseEvent::ReconciliationFinished {
                finished_at: Utc::now(),
            },
        )
        .await;

        let outstanding = feed.view.outstanding().await;
        assert_eq!(outstanding.len(), 1);
        assert_eq!(outstanding[0].purchase_id, settled);
    }

    #[tokio::test]
    async fn ignores_other_streams_but_advances_checkpoint() {
        let view = PurchaseLedgerView::new();
        let envelope = EventEnvelope::builder()
            .aggregate_id(AggregateId::new())
            .aggregate_type("Course")
            .event_type("CoursePublished")
            .version(Version::first())
            .payload_raw(serde_json::json!({"type": "CoursePublished"}))
            .build()
            .unwrap();

        view.apply(Checkpoint::at(1), &envelope).await.unwrap();

        assert_eq!(view.checkpoint().await, Checkpoint::at(1));
        assert!(view.is_empty().await);
    }

    #[tokio::test]
    async fn reset_clears_indexes() {
        let mut feed = Feed::new();
        let purchase_id = feed.open(UserId::new(), CourseId::new(), 100).await;
        feed.push(
            purchase_id,
            2,
            PurchaseEvent::CheckoutSessionAttached {
                correlation_id: "cs_reset".into(),
            },
        )
        .await;

        feed.view.reset().await.unwrap();

        assert!(feed.view.is_empty().await);
        assert!(feed.view.find_by_correlation("cs_reset").await.is_none());
        assert_eq!(feed.view.checkpoint().await, Checkpoint::zero());
    }
}
