//! Hosted checkout providers.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{CourseId, UserId};
use domain::Money;
use tokio::sync::RwLock;

use crate::error::{PaymentError, Result};

/// What the provider needs to open a hosted checkout page for one course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub course_id: CourseId,
    pub user_id: UserId,
    pub product_name: String,
    pub product_image: Option<String>,
    pub unit_amount: Money,
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
    /// Opaque key/value pairs echoed back on notifications.
    pub metadata: BTreeMap<String, String>,
}

/// A session the provider opened. `url` is where the buyer is redirected;
/// a session without one is unusable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub session_id: String,
    pub url: Option<String>,
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession>;
}

#[async_trait]
impl<P: PaymentProvider + ?Sized> PaymentProvider for Arc<P> {
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession> {
        (**self).create_checkout_session(request).await
    }
}

#[derive(Debug, Default)]
struct InMemoryProviderState {
    requests: Vec<CheckoutRequest>,
    next_id: u32,
    failing: bool,
    omit_url: bool,
}

/// Provider double for tests and local development. Sessions are numbered
/// `cs_test_0001`, `cs_test_0002`, ...
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentProvider {
    state: Arc<RwLock<InMemoryProviderState>>,
}

impl InMemoryPaymentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following session request fail.
    pub async fn set_failing(&self, failing: bool) {
        self.state.write().await.failing = failing;
    }

    /// Makes following sessions come back without a redirect URL.
    pub async fn set_omit_url(&self, omit: bool) {
        self.state.write().await.omit_url = omit;
    }

    /// Every request received so far, including failed ones.
    pub async fn requests(&self) -> Vec<CheckoutRequest> {
        self.state.read().await.requests.clone()
    }
}

#[async_trait]
impl PaymentProvider for InMemoryPaymentProvider {
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession> {
        let mut state = self.state.write().await;
        state.requests.push(request.clone());

        if state.failing {
            return Err(PaymentError::Provider("card payments unavailable".into()));
        }

        state.next_id += 1;
        let session_id = format!("cs_test_{:04}", state.next_id);
        let url = (!state.omit_url).then(|| format!("https://checkout.test/pay/{session_id}"));
        Ok(CheckoutSession { session_id, url })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CheckoutRequest {
        CheckoutRequest {
            course_id: CourseId::new(),
            user_id: UserId::new(),
            product_name: "Rust".into(),
            product_image: None,
            unit_amount: Money::from_minor(50_000),
            currency: "inr".into(),
            success_url: "http://localhost:5173/dashboard".into(),
            cancel_url: "http://localhost:5173/courses/x".into(),
            metadata: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn issues_sequential_sessions_with_urls() {
        let provider = InMemoryPaymentProvider::new();

        let first = provider.create_checkout_session(&request()).await.unwrap();
        let second = provider.create_checkout_session(&request()).await.unwrap();

        assert_eq!(first.session_id, "cs_test_0001");
        assert_eq!(second.session_id, "cs_test_0002");
        assert!(first.url.unwrap().ends_with("cs_test_0001"));
        assert_eq!(provider.requests().await.len(), 2);
    }

    #[tokio::test]
    async fn failure_and_missing_url_toggles() {
        let provider = InMemoryPaymentProvider::new();

        provider.set_failing(true).await;
        let err = provider.create_checkout_session(&request()).await.unwrap_err();
        assert!(matches!(err, PaymentError::Provider(_)));

        provider.set_failing(false).await;
        provider.set_omit_url(true).await;
        let session = provider.create_checkout_session(&request()).await.unwrap();
        assert!(session.url.is_none());
    }
}
