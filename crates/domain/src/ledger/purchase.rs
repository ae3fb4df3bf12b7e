//! Purchase aggregate.

use chrono::{DateTime, Utc};
use common::{AggregateId, CourseId, PurchaseId, UserId};
use event_store::Version;
use serde::Serialize;

use crate::aggregate::Aggregate;
use crate::money::Money;

use super::{PurchaseCreatedData, PurchaseError, PurchaseEvent, PurchaseStatus, ReconciliationStep};

/// One checkout attempt by a user for a course.
///
/// Besides the status, the purchase remembers which reconciliation steps have
/// been applied, so a redelivered notification picks up where the previous
/// attempt stopped and a finished purchase is left untouched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Purchase {
    id: Option<PurchaseId>,
    #[serde(skip)]
    version: Version,
    user_id: Option<UserId>,
    course_id: Option<CourseId>,
    amount: Money,
    correlation_id: Option<String>,
    status: PurchaseStatus,
    created_at: Option<DateTime<Utc>>,
    settled_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    previews_unlocked: bool,
    #[serde(skip)]
    user_enrolled: bool,
    #[serde(skip)]
    course_enrolled: bool,
    reconciled: bool,
}

impl Aggregate for Purchase {
    type Event = PurchaseEvent;
    type Error = PurchaseError;

    fn aggregate_type() -> &'static str {
        "Purchase"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id.map(AggregateId::from)
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            PurchaseEvent::PurchaseCreated(data) => {
                self.id = Some(data.purchase_id);
                self.user_id = Some(data.user_id);
                self.course_id = Some(data.course_id);
                self.amount = data.amount;
                self.created_at = Some(data.created_at);
            }
            PurchaseEvent::CheckoutSessionAttached { correlation_id } => {
                self.correlation_id = Some(correlation_id);
            }
            PurchaseEvent::PaymentSettled {
                settled_amount,
                settled_at,
            } => {
                if let Some(amount) = settled_amount {
                    self.amount = amount;
                }
                self.status = PurchaseStatus::Completed;
                self.settled_at = Some(settled_at);
            }
            PurchaseEvent::LecturePreviewsUnlocked { .. } => self.previews_unlocked = true,
            PurchaseEvent::UserEnrollmentApplied => self.user_enrolled = true,
            PurchaseEvent::CourseEnrollmentApplied => self.course_enrolled = true,
            PurchaseEvent::ReconciliationFinished { .. } => self.reconciled = true,
        }
    }
}

impl Purchase {
    pub fn purchase_id(&self) -> Option<PurchaseId> {
        self.id
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn course_id(&self) -> Option<CourseId> {
        self.course_id
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    pub fn status(&self) -> PurchaseStatus {
        self.status
    }

    pub fn settled_at(&self) -> Option<DateTime<Utc>> {
        self.settled_at
    }

    pub fn is_reconciled(&self) -> bool {
        self.reconciled
    }

    pub fn has_applied(&self, step: ReconciliationStep) -> bool {
        match step {
            ReconciliationStep::SettlePayment => self.status == PurchaseStatus::Completed,
            ReconciliationStep::UnlockPreviews => self.previews_unlocked,
            ReconciliationStep::EnrollUser => self.user_enrolled,
            ReconciliationStep::EnrollCourse => self.course_enrolled,
            ReconciliationStep::Finish => self.reconciled,
        }
    }

    /// The first step that has not been applied yet, or `None` once the
    /// purchase is fully reconciled.
    pub fn next_step(&self) -> Option<ReconciliationStep> {
        [
            ReconciliationStep::SettlePayment,
            ReconciliationStep::UnlockPreviews,
            ReconciliationStep::EnrollUser,
            ReconciliationStep::EnrollCourse,
            ReconciliationStep::Finish,
        ]
        .into_iter()
        .find(|step| !self.has_applied(*step))
    }
}

impl Purchase {
    pub fn create(
        &self,
        purchase_id: PurchaseId,
        user_id: UserId,
        course_id: CourseId,
        amount: Money,
    ) -> Result<Vec<PurchaseEvent>, PurchaseError> {
        if self.id.is_some() {
            return Err(PurchaseError::AlreadyCreated);
        }
        Ok(vec![PurchaseEvent::PurchaseCreated(PurchaseCreatedData {
            purchase_id,
            user_id,
            course_id,
            amount,
            created_at: Utc::now(),
        })])
    }

    pub fn attach_session(&self, correlation_id: &str) -> Result<Vec<PurchaseEvent>, PurchaseError> {
        self.ensure_created()?;
        if correlation_id.trim().is_empty() {
            return Err(PurchaseError::SessionIdRequired);
        }
        match self.correlation_id.as_deref() {
            Some(existing) if existing == correlation_id => return Ok(vec![]),
            Some(existing) => {
                return Err(PurchaseError::SessionAlreadyAttached(existing.to_string()));
            }
            None => {}
        }
        if !self.status.can_settle() {
            return Err(PurchaseError::InvalidTransition {
                status: self.status,
                action: "attach a session to",
            });
        }
        Ok(vec![PurchaseEvent::CheckoutSessionAttached {
            correlation_id: correlation_id.to_string(),
        }])
    }

    /// Moves the purchase to completed. Settling a completed purchase again is
    /// a no-op and never overwrites the recorded amount.
    pub fn settle(&self, settled_amount: Option<Money>) -> Result<Vec<PurchaseEvent>, PurchaseError> {
        self.ensure_created()?;
        if self.status == PurchaseStatus::Completed {
            return Ok(vec![]);
        }
        if !self.status.can_settle() {
            return Err(PurchaseError::InvalidTransition {
                status: self.status,
                action: "settle",
            });
        }
        Ok(vec![PurchaseEvent::PaymentSettled {
            settled_amount,
            settled_at: Utc::now(),
        }])
    }

    /// Records that a post-settlement step was applied.
    pub fn record_step(
        &self,
        step: ReconciliationStep,
        lectures_unlocked: usize,
    ) -> Result<Vec<PurchaseEvent>, PurchaseError> {
        self.ensure_created()?;
        if self.has_applied(step) {
            return Ok(vec![]);
        }
        if self.status != PurchaseStatus::Completed {
            return Err(PurchaseError::InvalidTransition {
                status: self.status,
                action: "reconcile",
            });
        }

        let event = match step {
            ReconciliationStep::SettlePayment => {
                return Err(PurchaseError::StepOutstanding(ReconciliationStep::SettlePayment));
            }
            ReconciliationStep::UnlockPreviews => PurchaseEvent::LecturePreviewsUnlocked {
                lectures: lectures_unlocked,
            },
            ReconciliationStep::EnrollUser => PurchaseEvent::UserEnrollmentApplied,
            ReconciliationStep::EnrollCourse => PurchaseEvent::CourseEnrollmentApplied,
            ReconciliationStep::Finish => {
                if let Some(outstanding) = self.next_step()
                    && outstanding != ReconciliationStep::Finish
                {
                    return Err(PurchaseError::StepOutstanding(outstanding));
                }
                PurchaseEvent::ReconciliationFinished {
                    finished_at: Utc::now(),
                }
            }
        };
        Ok(vec![event])
    }

    fn ensure_created(&self) -> Result<(), PurchaseError> {
        if self.id.is_none() {
            return Err(PurchaseError::PurchaseNotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(price: i64) -> Purchase {
        let mut purchase = Purchase::default();
        let events = purchase
            .create(
                PurchaseId::new(),
                UserId::new(),
                CourseId::new(),
                Money::from_minor(price),
            )
            .unwrap();
        purchase.apply_events(events);
        purchase
    }

    fn run(purchase: &mut Purchase, events: Vec<PurchaseEvent>) {
        purchase.apply_events(events);
    }

    #[test]
    fn created_purchase_is_pending_without_correlation() {
        let purchase = pending(500);
        assert_eq!(purchase.status(), PurchaseStatus::Pending);
        assert_eq!(purchase.amount(), Money::from_minor(500));
        assert_eq!(purchase.correlation_id(), None);
        assert_eq!(purchase.next_step(), Some(ReconciliationStep::SettlePayment));
    }

    #[test]
    fn attach_session_once() {
        let mut purchase = pending(500);
        let events = purchase.attach_session("cs_test_1").unwrap();
        run(&mut purchase, events);

        assert_eq!(purchase.correlation_id(), Some("cs_test_1"));
        assert!(purchase.attach_session("cs_test_1").unwrap().is_empty());
        assert!(matches!(
            purchase.attach_session("cs_test_2"),
            Err(PurchaseError::SessionAlreadyAttached(_))
        ));
        assert!(matches!(
            pending(1).attach_session(" "),
            Err(PurchaseError::SessionIdRequired)
        ));
    }

    #[test]
    fn settle_overwrites_amount_when_reported() {
        let mut purchase = pending(500);
        let events = purchase.settle(Some(Money::from_minor(450))).unwrap();
        run(&mut purchase, events);

        assert_eq!(purchase.status(), PurchaseStatus::Completed);
        assert_eq!(purchase.amount(), Money::from_minor(450));

        // Redelivery neither re-settles nor touches the amount.
        assert!(purchase.settle(Some(Money::from_minor(1))).unwrap().is_empty());
    }

    #[test]
    fn settle_without_total_keeps_price() {
        let mut purchase = pending(500);
        let events = purchase.settle(None).unwrap();
        run(&mut purchase, events);
        assert_eq!(purchase.amount(), Money::from_minor(500));
    }

    #[test]
    fn steps_require_settlement() {
        let purchase = pending(500);
        assert!(matches!(
            purchase.record_step(ReconciliationStep::EnrollUser, 0),
            Err(PurchaseError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn finish_requires_every_step() {
        let mut purchase = pending(500);
        let events = purchase.settle(None).unwrap();
        run(&mut purchase, events);

        assert!(matches!(
            purchase.record_step(ReconciliationStep::Finish, 0),
            Err(PurchaseError::StepOutstanding(ReconciliationStep::UnlockPreviews))
        ));

        for step in [
            ReconciliationStep::UnlockPreviews,
            ReconciliationStep::EnrollUser,
            ReconciliationStep::EnrollCourse,
        ] {
            let events = purchase.record_step(step, 2).unwrap();
            assert_eq!(events.len(), 1);
            run(&mut purchase, events);
            assert!(purchase.record_step(step, 2).unwrap().is_empty());
        }

        assert_eq!(purchase.next_step(), Some(ReconciliationStep::Finish));
        let events = purchase.record_step(ReconciliationStep::Finish, 0).unwrap();
        run(&mut purchase, events);

        assert!(purchase.is_reconciled());
        assert_eq!(purchase.next_step(), None);
    }

    #[test]
    fn commands_on_missing_purchase_fail() {
        assert!(matches!(
            Purchase::default().settle(None),
            Err(PurchaseError::PurchaseNotFound)
        ));
    }
}
