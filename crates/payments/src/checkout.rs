//! Checkout initiation and purchase queries.

use std::collections::BTreeMap;
use std::sync::Arc;

use common::{CourseId, PurchaseId, UserId};
use domain::{CatalogService, Course, LedgerService, PurchaseStatus};
use event_store::EventStore;
use projections::{ProjectionProcessor, PurchaseLedgerView, PurchaseSummary};
use serde::Serialize;

use crate::error::{PaymentError, Result};
use crate::provider::{CheckoutRequest, PaymentProvider};

/// Where the provider sends the buyer afterwards, and the checkout currency.
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    pub client_url: String,
    pub currency: String,
}

impl CheckoutSettings {
    pub fn new(client_url: impl Into<String>, currency: impl Into<String>) -> Self {
        Self {
            client_url: client_url.into().trim_end_matches('/').to_string(),
            currency: currency.into(),
        }
    }

    pub fn success_url(&self) -> String {
        format!("{}/dashboard", self.client_url)
    }

    pub fn cancel_url(&self, course_id: CourseId) -> String {
        format!("{}/courses/{course_id}", self.client_url)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutStarted {
    pub purchase_id: PurchaseId,
    pub session_id: String,
    pub checkout_url: String,
}

/// A course together with whether the caller holds an active purchase of it.
#[derive(Debug, Clone, Serialize)]
pub struct PurchaseStatusReport {
    pub course: Course,
    pub purchased: bool,
    pub status: Option<PurchaseStatus>,
}

pub struct CheckoutService<S: EventStore, P: PaymentProvider> {
    catalog: CatalogService<S>,
    ledger: LedgerService<S>,
    provider: P,
    processor: Arc<ProjectionProcessor<S>>,
    purchases: PurchaseLedgerView,
    settings: CheckoutSettings,
}

impl<S, P> CheckoutService<S, P>
where
    S: EventStore + Clone,
    P: PaymentProvider,
{
    /// `purchases` must be registered with `processor`.
    pub fn new(
        store: S,
        provider: P,
        processor: Arc<ProjectionProcessor<S>>,
        purchases: PurchaseLedgerView,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            catalog: CatalogService::new(store.clone()),
            ledger: LedgerService::new(store),
            provider,
            processor,
            purchases,
            settings,
        }
    }

    /// Opens a pending purchase at the course's price and asks the provider
    /// for a hosted checkout page.
    ///
    /// When the provider fails, the purchase is left pending without a
    /// correlation id. No notification can ever match it.
    #[tracing::instrument(skip(self))]
    pub async fn initiate_checkout(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<CheckoutStarted> {
        let course = self.catalog.get_course(course_id).await?;
        let purchase = self
            .ledger
            .open_purchase(user_id, course_id, course.price())
            .await?;
        let purchase_id = purchase
            .purchase_id()
            .ok_or(domain::DomainError::NotFound("purchase"))?;

        let request = CheckoutRequest {
            course_id,
            user_id,
            product_name: course.title().to_string(),
            product_image: course.thumbnail_url().map(str::to_string),
            unit_amount: course.price(),
            currency: self.settings.currency.clone(),
            success_url: self.settings.success_url(),
            cancel_url: self.settings.cancel_url(course_id),
            metadata: BTreeMap::from([
                ("course_id".to_string(), course_id.to_string()),
                ("user_id".to_string(), user_id.to_string()),
            ]),
        };

        let session = match self.provider.create_checkout_session(&request).await {
            Ok(session) => session,
            Err(e) => {
                metrics::counter!("checkout_failures_total").increment(1);
                tracing::warn!(%purchase_id, error = %e, "checkout session not created");
                return Err(e);
            }
        };
        let Some(checkout_url) = session.url else {
            metrics::counter!("checkout_failures_total").increment(1);
            tracing::warn!(%purchase_id, session_id = %session.session_id, "session has no redirect url");
            return Err(PaymentError::Provider(
                "checkout session came back without a redirect url".into(),
            ));
        };

        self.ledger
            .attach_checkout_session(purchase_id, &session.session_id)
            .await?;

        metrics::counter!("checkout_sessions_total").increment(1);
        tracing::info!(%purchase_id, session_id = %session.session_id, "checkout started");

        Ok(CheckoutStarted {
            purchase_id,
            session_id: session.session_id,
            checkout_url,
        })
    }

    /// Reads only the caller's own purchases.
    #[tracing::instrument(skip(self))]
    pub async fn purchase_status(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<PurchaseStatusReport> {
        let course = self.catalog.get_course(course_id).await?;
        self.processor.run_catch_up().await?;

        let status = self
            .purchases
            .purchase_for(user_id, course_id)
            .await
            .map(|p| p.status);

        Ok(PurchaseStatusReport {
            course,
            purchased: status.is_some(),
            status,
        })
    }

    pub async fn purchases_for_user(&self, user_id: UserId) -> Result<Vec<PurchaseSummary>> {
        self.processor.run_catch_up().await?;
        Ok(self.purchases.purchases_for_user(user_id).await)
    }
}
