//! Applying a verified checkout completion to the ledger, catalog and accounts.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use common::PurchaseId;
use domain::{
    AccountService, CatalogService, DomainError, LedgerService, Money, Purchase, PurchaseStatus,
    ReconciliationStep,
};
use event_store::EventStore;
use projections::{ProjectionProcessor, PurchaseLedgerView};
use serde::Serialize;

use crate::error::{PaymentError, Result};
use crate::failures::{ReconciliationFailure, ReconciliationFailureLog};
use crate::webhook::ProviderNotification;

/// What a completed purchase does to the course's lectures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PreviewPolicy {
    /// Every lecture of the course becomes openly previewable, for everyone.
    #[default]
    UnlockAllLectures,
    /// Lecture preview flags are left alone.
    Keep,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationOutcome {
    /// Not a checkout completion; acknowledged without effect.
    Ignored { kind: String },
    Reconciled { purchase_id: PurchaseId },
    /// Every step had already been applied by an earlier delivery.
    AlreadyReconciled { purchase_id: PurchaseId },
}

/// Result of re-driving one outstanding purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResumeAttempt {
    pub purchase_id: PurchaseId,
    pub reconciled: bool,
    pub error: Option<String>,
}

/// Drives a purchase through its reconciliation steps.
///
/// Each step is an idempotent write followed by a marker event on the
/// purchase stream, so a redelivered notification or an operator
/// [`resume`](Reconciler::resume) picks up at the first step without a marker.
pub struct Reconciler<S: EventStore> {
    ledger: LedgerService<S>,
    catalog: CatalogService<S>,
    accounts: AccountService<S>,
    processor: Arc<ProjectionProcessor<S>>,
    purchases: PurchaseLedgerView,
    policy: PreviewPolicy,
    failures: ReconciliationFailureLog,
}

impl<S: EventStore + Clone> Reconciler<S> {
    /// `purchases` must be registered with `processor`.
    pub fn new(
        store: S,
        processor: Arc<ProjectionProcessor<S>>,
        purchases: PurchaseLedgerView,
    ) -> Self {
        Self {
            ledger: LedgerService::new(store.clone()),
            catalog: CatalogService::new(store.clone()),
            accounts: AccountService::new(store),
            processor,
            purchases,
            policy: PreviewPolicy::default(),
            failures: ReconciliationFailureLog::new(),
        }
    }

    pub fn with_policy(mut self, policy: PreviewPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_failure_log(mut self, failures: ReconciliationFailureLog) -> Self {
        self.failures = failures;
        self
    }

    pub fn failures(&self) -> &ReconciliationFailureLog {
        &self.failures
    }

    /// Handles an already verified notification.
    ///
    /// An unknown session id fails with [`PaymentError::UnknownSession`]
    /// before anything is written.
    #[tracing::instrument(skip(self, notification), fields(event_id = %notification.id, kind = %notification.kind))]
    pub async fn handle_notification(
        &self,
        notification: &ProviderNotification,
    ) -> Result<NotificationOutcome> {
        if !notification.is_checkout_completed() {
            metrics::counter!("payment_notifications_total", "outcome" => "ignored").increment(1);
            tracing::debug!("notification type not handled");
            return Ok(NotificationOutcome::Ignored {
                kind: notification.kind.clone(),
            });
        }

        let session = notification.session();
        self.processor.run_catch_up().await?;
        let Some(summary) = self.purchases.find_by_correlation(&session.id).await else {
            metrics::counter!("payment_notifications_total", "outcome" => "unknown_session")
                .increment(1);
            tracing::warn!(session_id = %session.id, "no purchase for checkout session");
            return Err(PaymentError::UnknownSession(session.id.clone()));
        };

        // A zero or missing total keeps the amount recorded at checkout.
        let settled_amount = session
            .amount_total
            .filter(|total| *total > 0)
            .map(Money::from_minor);

        let outcome = self.reconcile(summary.purchase_id, settled_amount).await;
        let label = match &outcome {
            Ok(NotificationOutcome::AlreadyReconciled { .. }) => "duplicate",
            Ok(_) => "reconciled",
            Err(_) => "failed",
        };
        metrics::counter!("payment_notifications_total", "outcome" => label).increment(1);
        outcome
    }

    /// Re-drives a purchase whose reconciliation stopped part-way.
    ///
    /// A logged failure supplies the settled total. Without one, only a
    /// purchase already settled on its own stream can be resumed; a pending
    /// purchase still needs a verified notification.
    #[tracing::instrument(skip(self))]
    pub async fn resume(&self, purchase_id: PurchaseId) -> Result<NotificationOutcome> {
        if let Some(failure) = self.failures.latest_for(purchase_id).await {
            tracing::info!(step = %failure.step, "resuming logged reconciliation failure");
            return self.reconcile(purchase_id, failure.settled_amount).await;
        }

        let purchase = self.ledger.get_purchase(purchase_id).await?;
        if purchase.status() != PurchaseStatus::Completed || purchase.is_reconciled() {
            return Err(PaymentError::NothingToResume(purchase_id));
        }
        tracing::info!(next_step = ?purchase.next_step(), "resuming settled purchase");
        self.reconcile(purchase_id, None).await
    }

    /// Resumes every settled purchase whose reconciliation never finished,
    /// including those left behind by an earlier process.
    #[tracing::instrument(skip(self))]
    pub async fn resume_outstanding(&self) -> Result<Vec<ResumeAttempt>> {
        self.processor.run_catch_up().await?;

        let mut attempts = Vec::new();
        for summary in self.purchases.outstanding().await {
            let purchase_id = summary.purchase_id;
            let attempt = match self.resume(purchase_id).await {
                Ok(_) => ResumeAttempt {
                    purchase_id,
                    reconciled: true,
                    error: None,
                },
                Err(e) => ResumeAttempt {
                    purchase_id,
                    reconciled: false,
                    error: Some(e.to_string()),
                },
            };
            attempts.push(attempt);
        }

        if !attempts.is_empty() {
            let failed = attempts.iter().filter(|a| !a.reconciled).count();
            tracing::info!(resumed = attempts.len(), failed, "outstanding purchases re-driven");
        }
        Ok(attempts)
    }

    async fn reconcile(
        &self,
        purchase_id: PurchaseId,
        settled_amount: Option<Money>,
    ) -> Result<NotificationOutcome> {
        let started = Instant::now();
        let mut purchase = self.ledger.get_purchase(purchase_id).await?;

        if purchase.is_reconciled() {
            tracing::info!(%purchase_id, "purchase already reconciled");
            return Ok(NotificationOutcome::AlreadyReconciled { purchase_id });
        }

        while let Some(step) = purchase.next_step() {
            match self.apply_step(&purchase, step, settled_amount).await {
                Ok(updated) => purchase = updated,
                Err(source) => {
                    metrics::counter!("reconciliation_failures_total", "step" => step.as_str())
                        .increment(1);
                    tracing::error!(%purchase_id, %step, error = %source, "reconciliation step failed");
                    self.failures
                        .record(ReconciliationFailure {
                            purchase_id,
                            step,
                            error: source.to_string(),
                            settled_amount,
                            failed_at: Utc::now(),
                        })
                        .await;
                    return Err(PaymentError::Reconciliation {
                        purchase_id,
                        step,
                        source,
                    });
                }
            }
        }

        self.failures.clear(purchase_id).await;
        metrics::histogram!("reconciliation_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        tracing::info!(%purchase_id, amount = %purchase.amount(), "purchase reconciled");
        Ok(NotificationOutcome::Reconciled { purchase_id })
    }

    /// Applies one step and returns the purchase with its marker recorded.
    async fn apply_step(
        &self,
        purchase: &Purchase,
        step: ReconciliationStep,
        settled_amount: Option<Money>,
    ) -> std::result::Result<Purchase, DomainError> {
        let purchase_id = purchase
            .purchase_id()
            .ok_or(DomainError::NotFound("purchase"))?;
        let user_id = purchase.user_id().ok_or(DomainError::NotFound("purchase"))?;
        let course_id = purchase
            .course_id()
            .ok_or(DomainError::NotFound("purchase"))?;

        let mut lectures_unlocked = 0;
        match step {
            ReconciliationStep::SettlePayment => {
                let settled = self
                    .ledger
                    .settle_payment(purchase_id, settled_amount)
                    .await?;
                return Ok(settled.aggregate);
            }
            ReconciliationStep::UnlockPreviews => {
                lectures_unlocked = match self.policy {
                    PreviewPolicy::UnlockAllLectures => {
                        self.catalog
                            .unlock_lecture_previews(course_id, purchase_id)
                            .await?
                    }
                    PreviewPolicy::Keep => 0,
                };
            }
            ReconciliationStep::EnrollUser => {
                self.accounts
                    .enroll_in_course(user_id, course_id, purchase_id)
                    .await?;
            }
            ReconciliationStep::EnrollCourse => {
                self.catalog
                    .enroll_student(course_id, user_id, purchase_id)
                    .await?;
            }
            ReconciliationStep::Finish => {}
        }

        self.ledger
            .record_step(purchase_id, step, lectures_unlocked)
            .await
    }
}
