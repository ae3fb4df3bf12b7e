//! Checkout through reconciliation, against the in-memory store and provider.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::{AggregateId, CourseId, UserId};
use domain::{
    AccountService, CatalogService, LedgerService, Money, NewCourse, NewUser, PurchaseStatus,
    Role,
};
use event_store::{
    AppendOptions, EventEnvelope, EventStore, EventStoreError, EventStream, InMemoryEventStore,
    Version,
};
use payments::{
    CHECKOUT_COMPLETED, CheckoutService, CheckoutSettings, InMemoryPaymentProvider,
    NotificationOutcome, PaymentError, PreviewPolicy, Reconciler, WebhookVerifier,
};
use projections::{ProjectionProcessor, PurchaseLedgerView};

const SECRET: &str = "whsec_integration";

/// In-memory store whose appends to user streams can be made to fail.
#[derive(Clone)]
struct FlakyStore {
    inner: InMemoryEventStore,
    users_offline: Arc<AtomicBool>,
}

#[async_trait]
impl EventStore for FlakyStore {
    async fn append(
        &self,
        events: Vec<EventEnvelope>,
        options: AppendOptions,
    ) -> event_store::Result<Version> {
        if self.users_offline.load(Ordering::SeqCst)
            && events.first().is_some_and(|e| e.aggregate_type == "User")
        {
            return Err(EventStoreError::InvalidAppend("user store offline".into()));
        }
        self.inner.append(events, options).await
    }

    async fn load_stream(&self, id: AggregateId) -> event_store::Result<Vec<EventEnvelope>> {
        self.inner.load_stream(id).await
    }

    async fn load_stream_from(
        &self,
        id: AggregateId,
        from: Version,
    ) -> event_store::Result<Vec<EventEnvelope>> {
        self.inner.load_stream_from(id, from).await
    }

    async fn stream_all_events(&self) -> event_store::Result<EventStream> {
        self.inner.stream_all_events().await
    }

    async fn stream_version(&self, id: AggregateId) -> event_store::Result<Option<Version>> {
        self.inner.stream_version(id).await
    }
}

struct Harness {
    store: FlakyStore,
    catalog: CatalogService<FlakyStore>,
    accounts: AccountService<FlakyStore>,
    ledger: LedgerService<FlakyStore>,
    provider: InMemoryPaymentProvider,
    checkout: CheckoutService<FlakyStore, InMemoryPaymentProvider>,
    reconciler: Reconciler<FlakyStore>,
    verifier: WebhookVerifier,
}

impl Harness {
    fn new() -> Self {
        Self::with_policy(PreviewPolicy::default())
    }

    fn with_policy(policy: PreviewPolicy) -> Self {
        let store = FlakyStore {
            inner: InMemoryEventStore::new(),
            users_offline: Arc::new(AtomicBool::new(false)),
        };
        let purchases = PurchaseLedgerView::new();
        let mut processor = ProjectionProcessor::new(store.clone());
        processor.register(Box::new(purchases.clone()));
        let processor = Arc::new(processor);

        let provider = InMemoryPaymentProvider::new();
        let checkout = CheckoutService::new(
            store.clone(),
            provider.clone(),
            Arc::clone(&processor),
            purchases.clone(),
            CheckoutSettings::new("http://localhost:5173/", "inr"),
        );
        let reconciler =
            Reconciler::new(store.clone(), processor, purchases).with_policy(policy);

        Self {
            catalog: CatalogService::new(store.clone()),
            accounts: AccountService::new(store.clone()),
            ledger: LedgerService::new(store.clone()),
            store,
            provider,
            checkout,
            reconciler,
            verifier: WebhookVerifier::new(SECRET),
        }
    }

    async fn learner(&self) -> UserId {
        self.accounts
            .register_user(NewUser {
                name: "Asha".into(),
                email: format!("asha+{}@example.com", UserId::new()),
                role: Role::Learner,
            })
            .await
            .unwrap()
            .user_id()
            .unwrap()
    }

    /// A course priced at 500 with two lectures.
    async fn course(&self) -> CourseId {
        let course = self
            .catalog
            .create_course(
                UserId::new(),
                NewCourse {
                    title: "Rust in Practice".into(),
                    subtitle: None,
                    description: String::new(),
                    category: None,
                    price: Money::from_minor(500),
                },
            )
            .await
            .unwrap();
        let course_id = course.course_id().unwrap();
        self.catalog.create_lecture(course_id, "Intro").await.unwrap();
        self.catalog.create_lecture(course_id, "Ownership").await.unwrap();
        course_id
    }

    /// Signs and verifies a provider notification the way the endpoint does.
    fn notification(&self, kind: &str, session_id: &str, amount_total: Option<i64>) -> Vec<u8> {
        let mut object = serde_json::json!({ "id": session_id });
        if let Some(total) = amount_total {
            object["amount_total"] = total.into();
        }
        serde_json::json!({ "id": "evt_1", "type": kind, "data": { "object": object } })
            .to_string()
            .into_bytes()
    }

    async fn deliver(
        &self,
        payload: &[u8],
    ) -> Result<NotificationOutcome, PaymentError> {
        let now = chrono::Utc::now().timestamp();
        let header = self.verifier.sign(payload, now).unwrap();
        let notification = self.verifier.verify(payload, &header)?;
        self.reconciler.handle_notification(&notification).await
    }
}

#[tokio::test]
async fn checkout_then_notification_grants_access() {
    let h = Harness::new();
    let user = h.learner().await;
    let course = h.course().await;

    let started = h.checkout.initiate_checkout(user, course).await.unwrap();
    assert!(started.checkout_url.contains(&started.session_id));

    let pending = h.ledger.get_purchase(started.purchase_id).await.unwrap();
    assert_eq!(pending.status(), PurchaseStatus::Pending);
    assert_eq!(pending.amount(), Money::from_minor(500));
    assert_eq!(pending.correlation_id(), Some(started.session_id.as_str()));

    let request = &h.provider.requests().await[0];
    assert_eq!(request.success_url, "http://localhost:5173/dashboard");
    assert_eq!(
        request.cancel_url,
        format!("http://localhost:5173/courses/{course}")
    );
    assert_eq!(request.metadata["user_id"], user.to_string());

    let outcome = h
        .deliver(&h.notification(CHECKOUT_COMPLETED, &started.session_id, Some(500)))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        NotificationOutcome::Reconciled {
            purchase_id: started.purchase_id
        }
    );

    let purchase = h.ledger.get_purchase(started.purchase_id).await.unwrap();
    assert_eq!(purchase.status(), PurchaseStatus::Completed);
    assert_eq!(purchase.amount(), Money::from_minor(500));
    assert!(purchase.is_reconciled());

    assert!(h.accounts.get_profile(user).await.unwrap().is_enrolled_in(course));
    let course_state = h.catalog.get_course(course).await.unwrap();
    assert!(course_state.is_enrolled(user));
    for lecture in h.catalog.course_lectures(course).await.unwrap() {
        assert!(lecture.is_preview_free());
    }

    let status = h.checkout.purchase_status(user, course).await.unwrap();
    assert!(status.purchased);
    assert_eq!(status.status, Some(PurchaseStatus::Completed));
}

#[tokio::test]
async fn settled_total_overwrites_checkout_amount() {
    let h = Harness::new();
    let user = h.learner().await;
    let course = h.course().await;
    let started = h.checkout.initiate_checkout(user, course).await.unwrap();

    h.deliver(&h.notification(CHECKOUT_COMPLETED, &started.session_id, Some(450)))
        .await
        .unwrap();

    let purchase = h.ledger.get_purchase(started.purchase_id).await.unwrap();
    assert_eq!(purchase.amount(), Money::from_minor(450));
}

#[tokio::test]
async fn redelivery_is_idempotent() {
    let h = Harness::new();
    let user = h.learner().await;
    let course = h.course().await;
    let started = h.checkout.initiate_checkout(user, course).await.unwrap();
    let payload = h.notification(CHECKOUT_COMPLETED, &started.session_id, Some(500));

    h.deliver(&payload).await.unwrap();
    let events_after_first = h.store.inner.event_count().await;

    let second = h.deliver(&payload).await.unwrap();

    assert_eq!(
        second,
        NotificationOutcome::AlreadyReconciled {
            purchase_id: started.purchase_id
        }
    );
    assert_eq!(h.store.inner.event_count().await, events_after_first);
    assert_eq!(
        h.accounts
            .get_profile(user)
            .await
            .unwrap()
            .enrolled_courses()
            .len(),
        1
    );
    assert_eq!(
        h.ledger.get_purchase(started.purchase_id).await.unwrap().status(),
        PurchaseStatus::Completed
    );
}

#[tokio::test]
async fn unknown_session_changes_nothing() {
    let h = Harness::new();
    let user = h.learner().await;
    let course = h.course().await;
    h.checkout.initiate_checkout(user, course).await.unwrap();
    let before = h.store.inner.event_count().await;

    let err = h
        .deliver(&h.notification(CHECKOUT_COMPLETED, "cs_unknown", Some(500)))
        .await
        .unwrap_err();

    assert!(matches!(err, PaymentError::UnknownSession(ref id) if id == "cs_unknown"));
    assert!(err.is_not_found());
    assert_eq!(h.store.inner.event_count().await, before);
}

#[tokio::test]
async fn other_notification_types_are_ignored() {
    let h = Harness::new();
    let user = h.learner().await;
    let course = h.course().await;
    let started = h.checkout.initiate_checkout(user, course).await.unwrap();

    let outcome = h
        .deliver(&h.notification("checkout.session.expired", &started.session_id, None))
        .await
        .unwrap();

    assert!(matches!(outcome, NotificationOutcome::Ignored { ref kind } if kind == "checkout.session.expired"));
    assert_eq!(
        h.ledger.get_purchase(started.purchase_id).await.unwrap().status(),
        PurchaseStatus::Pending
    );
}

#[tokio::test]
async fn forged_notification_is_rejected_before_lookup() {
    let h = Harness::new();
    let user = h.learner().await;
    let course = h.course().await;
    let started = h.checkout.initiate_checkout(user, course).await.unwrap();
    let payload = h.notification(CHECKOUT_COMPLETED, &started.session_id, Some(500));

    let forged = WebhookVerifier::new("whsec_attacker")
        .sign(&payload, chrono::Utc::now().timestamp())
        .unwrap();
    let err = h.verifier.verify(&payload, &forged).unwrap_err();

    assert!(matches!(err, PaymentError::Verification(_)));
    assert_eq!(
        h.ledger.get_purchase(started.purchase_id).await.unwrap().status(),
        PurchaseStatus::Pending
    );
}

#[tokio::test]
async fn provider_failure_leaves_inert_pending_purchase() {
    let h = Harness::new();
    let user = h.learner().await;
    let course = h.course().await;

    h.provider.set_failing(true).await;
    let err = h.checkout.initiate_checkout(user, course).await.unwrap_err();
    assert!(matches!(err, PaymentError::Provider(_)));

    h.provider.set_failing(false).await;
    h.provider.set_omit_url(true).await;
    let err = h.checkout.initiate_checkout(user, course).await.unwrap_err();
    assert!(matches!(err, PaymentError::Provider(_)));

    let purchases = h.checkout.purchases_for_user(user).await.unwrap();
    assert_eq!(purchases.len(), 2);
    assert!(purchases.iter().all(|p| p.status == PurchaseStatus::Pending));
    assert!(purchases.iter().all(|p| p.correlation_id.is_none()));
}

#[tokio::test]
async fn checkout_for_missing_course_is_not_found() {
    let h = Harness::new();
    let user = h.learner().await;

    let err = h
        .checkout
        .initiate_checkout(user, CourseId::new())
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    assert!(h.provider.requests().await.is_empty());
}

#[tokio::test]
async fn failed_step_is_logged_and_retry_resumes() {
    let h = Harness::new();
    let user = h.learner().await;
    let course = h.course().await;
    let started = h.checkout.initiate_checkout(user, course).await.unwrap();
    let payload = h.notification(CHECKOUT_COMPLETED, &started.session_id, Some(500));

    h.store.users_offline.store(true, Ordering::SeqCst);
    let err = h.deliver(&payload).await.unwrap_err();
    assert!(matches!(
        err,
        PaymentError::Reconciliation {
            step: domain::ReconciliationStep::EnrollUser,
            ..
        }
    ));

    let partial = h.ledger.get_purchase(started.purchase_id).await.unwrap();
    assert_eq!(partial.status(), PurchaseStatus::Completed);
    assert!(!partial.is_reconciled());
    let logged = h.reconciler.failures().latest_for(started.purchase_id).await;
    assert_eq!(
        logged.unwrap().step,
        domain::ReconciliationStep::EnrollUser
    );

    h.store.users_offline.store(false, Ordering::SeqCst);
    let outcome = h.reconciler.resume(started.purchase_id).await.unwrap();

    assert_eq!(
        outcome,
        NotificationOutcome::Reconciled {
            purchase_id: started.purchase_id
        }
    );
    assert!(h.accounts.get_profile(user).await.unwrap().is_enrolled_in(course));
    assert!(h.catalog.get_course(course).await.unwrap().is_enrolled(user));
    assert!(h.reconciler.failures().is_empty().await);

    let again = h.reconciler.resume(started.purchase_id).await.unwrap_err();
    assert!(matches!(again, PaymentError::NothingToResume(_)));
}

/// A reconciler over the same store with an empty failure log, as after a
/// process restart.
fn restarted_reconciler(store: &FlakyStore) -> Reconciler<FlakyStore> {
    let purchases = PurchaseLedgerView::new();
    let mut processor = ProjectionProcessor::new(store.clone());
    processor.register(Box::new(purchases.clone()));
    Reconciler::new(store.clone(), Arc::new(processor), purchases)
}

#[tokio::test]
async fn settled_purchases_resume_after_restart() {
    let h = Harness::new();
    let user = h.learner().await;
    let course = h.course().await;
    let started = h.checkout.initiate_checkout(user, course).await.unwrap();

    h.store.users_offline.store(true, Ordering::SeqCst);
    h.deliver(&h.notification(CHECKOUT_COMPLETED, &started.session_id, Some(450)))
        .await
        .unwrap_err();
    h.store.users_offline.store(false, Ordering::SeqCst);

    let restarted = restarted_reconciler(&h.store);
    assert!(restarted.failures().is_empty().await);

    let attempts = restarted.resume_outstanding().await.unwrap();

    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].purchase_id, started.purchase_id);
    assert!(attempts[0].reconciled);
    assert!(h.accounts.get_profile(user).await.unwrap().is_enrolled_in(course));
    let purchase = h.ledger.get_purchase(started.purchase_id).await.unwrap();
    assert!(purchase.is_reconciled());
    assert_eq!(purchase.amount(), Money::from_minor(450));

    assert!(restarted.resume_outstanding().await.unwrap().is_empty());
}

#[tokio::test]
async fn outstanding_resume_reports_steps_that_still_fail() {
    let h = Harness::new();
    let user = h.learner().await;
    let course = h.course().await;
    let started = h.checkout.initiate_checkout(user, course).await.unwrap();

    h.store.users_offline.store(true, Ordering::SeqCst);
    h.deliver(&h.notification(CHECKOUT_COMPLETED, &started.session_id, None))
        .await
        .unwrap_err();

    let attempts = h.reconciler.resume_outstanding().await.unwrap();

    assert_eq!(attempts.len(), 1);
    assert!(!attempts[0].reconciled);
    assert!(attempts[0].error.is_some());
    assert!(!h.accounts.get_profile(user).await.unwrap().is_enrolled_in(course));
}

#[tokio::test]
async fn pending_purchase_cannot_be_resumed_without_a_notification() {
    let h = Harness::new();
    let user = h.learner().await;
    let course = h.course().await;
    let started = h.checkout.initiate_checkout(user, course).await.unwrap();

    let err = h.reconciler.resume(started.purchase_id).await.unwrap_err();

    assert!(matches!(err, PaymentError::NothingToResume(_)));
    let purchase = h.ledger.get_purchase(started.purchase_id).await.unwrap();
    assert_eq!(purchase.status(), PurchaseStatus::Pending);
    assert!(h.reconciler.resume_outstanding().await.unwrap().is_empty());
}

#[tokio::test]
async fn keep_policy_leaves_previews_untouched() {
    let h = Harness::with_policy(PreviewPolicy::Keep);
    let user = h.learner().await;
    let course = h.course().await;
    let started = h.checkout.initiate_checkout(user, course).await.unwrap();

    h.deliver(&h.notification(CHECKOUT_COMPLETED, &started.session_id, None))
        .await
        .unwrap();

    for lecture in h.catalog.course_lectures(course).await.unwrap() {
        assert!(!lecture.is_preview_free());
    }
    assert!(h.accounts.get_profile(user).await.unwrap().is_enrolled_in(course));
}

#[tokio::test]
async fn purchase_status_is_per_user() {
    let h = Harness::new();
    let buyer = h.learner().await;
    let other = h.learner().await;
    let course = h.course().await;
    h.checkout.initiate_checkout(buyer, course).await.unwrap();

    let mine = h.checkout.purchase_status(buyer, course).await.unwrap();
    assert!(mine.purchased);
    assert_eq!(mine.status, Some(PurchaseStatus::Pending));

    let theirs = h.checkout.purchase_status(other, course).await.unwrap();
    assert!(!theirs.purchased);
    assert!(h.checkout.purchases_for_user(other).await.unwrap().is_empty());

    let err = h
        .checkout
        .purchase_status(buyer, CourseId::new())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}
