//! HTTP client for a Stripe-compatible hosted checkout API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::error::{PaymentError, Result};
use crate::provider::{CheckoutRequest, CheckoutSession, PaymentProvider};

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
    #[serde(default)]
    url: Option<String>,
}

/// Creates checkout sessions with a form-encoded POST to
/// `{base_url}/v1/checkout/sessions`, authenticated by the secret key.
/// Every request gives up after `timeout`, so a stalled provider fails the
/// checkout instead of holding its handler open.
#[derive(Clone)]
pub struct HostedCheckoutProvider {
    http_client: Client,
    base_url: String,
    secret_key: String,
    timeout: Duration,
}

/// Request timeout used by [`HostedCheckoutProvider::new`].
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

impl HostedCheckoutProvider {
    pub fn new(base_url: impl Into<String>, secret_key: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, secret_key, DEFAULT_PROVIDER_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        secret_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http_client = Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| PaymentError::Provider(e.to_string()))?;
        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
            timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn sessions_url(&self) -> String {
        format!("{}/v1/checkout/sessions", self.base_url)
    }
}

/// Flattens a request into the provider's bracketed form encoding.
pub(crate) fn form_params(request: &CheckoutRequest) -> Vec<(String, String)> {
    let item = "line_items[0]";
    let mut params = vec![
        ("mode".to_string(), "payment".to_string()),
        ("payment_method_types[0]".to_string(), "card".to_string()),
        (format!("{item}[quantity]"), "1".to_string()),
        (
            format!("{item}[price_data][currency]"),
            request.currency.clone(),
        ),
        (
            format!("{item}[price_data][unit_amount]"),
            request.unit_amount.minor_units().to_string(),
        ),
        (
            format!("{item}[price_data][product_data][name]"),
            request.product_name.clone(),
        ),
        ("success_url".to_string(), request.success_url.clone()),
        ("cancel_url".to_string(), request.cancel_url.clone()),
    ];

    if let Some(image) = &request.product_image {
        params.push((
            format!("{item}[price_data][product_data][images][0]"),
            image.clone(),
        ));
    }

    for (key, value) in &request.metadata {
        params.push((format!("metadata[{key}]"), value.clone()));
    }

    params
}

#[async_trait]
impl PaymentProvider for HostedCheckoutProvider {
    #[tracing::instrument(skip(self, request), fields(course_id = %request.course_id))]
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession> {
        let response = self
            .http_client
            .post(self.sessions_url())
            .bearer_auth(&self.secret_key)
            .form(&form_params(request))
            .send()
            .await
            .map_err(|e| PaymentError::Provider(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, body = %body, "checkout session request rejected");
            return Err(PaymentError::Provider(format!(
                "checkout session request rejected with {status}"
            )));
        }

        let session: SessionResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::Provider(e.to_string()))?;

        Ok(CheckoutSession {
            session_id: session.id,
            url: session.url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{CourseId, UserId};
    use domain::Money;
    use std::collections::BTreeMap;

    fn value<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn form_carries_price_redirects_and_metadata() {
        let course_id = CourseId::new();
        let user_id = UserId::new();
        let request = CheckoutRequest {
            course_id,
            user_id,
            product_name: "Rust in Practice".into(),
            product_image: Some("https://cdn.test/rust.png".into()),
            unit_amount: Money::from_minor(49_900),
            currency: "inr".into(),
            success_url: "https://app.test/dashboard".into(),
            cancel_url: format!("https://app.test/courses/{course_id}"),
            metadata: BTreeMap::from([
                ("course_id".to_string(), course_id.to_string()),
                ("user_id".to_string(), user_id.to_string()),
            ]),
        };

        let params = form_params(&request);

        assert_eq!(value(&params, "mode"), Some("payment"));
        assert_eq!(
            value(&params, "line_items[0][price_data][unit_amount]"),
            Some("49900")
        );
        assert_eq!(
            value(&params, "line_items[0][price_data][product_data][images][0]"),
            Some("https://cdn.test/rust.png")
        );
        assert_eq!(
            value(&params, "metadata[course_id]"),
            Some(course_id.to_string().as_str())
        );
        assert_eq!(
            value(&params, "success_url"),
            Some("https://app.test/dashboard")
        );
    }

    #[test]
    fn base_url_trailing_slash_is_ignored() {
        let provider = HostedCheckoutProvider::new("https://api.example.com/", "sk_test").unwrap();
        assert_eq!(
            provider.sessions_url(),
            "https://api.example.com/v1/checkout/sessions"
        );
    }

    #[test]
    fn requests_are_bounded_by_a_timeout() {
        let provider = HostedCheckoutProvider::new("https://api.example.com", "sk_test").unwrap();
        assert_eq!(provider.timeout(), DEFAULT_PROVIDER_TIMEOUT);

        let provider = HostedCheckoutProvider::with_timeout(
            "https://api.example.com",
            "sk_test",
            Duration::from_secs(3),
        )
        .unwrap();
        assert_eq!(provider.timeout(), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn stalled_provider_fails_the_checkout() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let provider = HostedCheckoutProvider::with_timeout(
            format!("http://{addr}"),
            "sk_test",
            Duration::from_millis(200),
        )
        .unwrap();
        let request = CheckoutRequest {
            course_id: CourseId::new(),
            user_id: UserId::new(),
            product_name: "Rust in Practice".into(),
            product_image: None,
            unit_amount: Money::from_minor(49_900),
            currency: "inr".into(),
            success_url: "https://app.test/dashboard".into(),
            cancel_url: "https://app.test/courses".into(),
            metadata: BTreeMap::new(),
        };

        // The listener accepts connections but never answers.
        let started = std::time::Instant::now();
        let err = provider.create_checkout_session(&request).await.unwrap_err();

        assert!(matches!(err, PaymentError::Provider(_)));
        assert!(started.elapsed() < Duration::from_secs(5));
        drop(listener);
    }
}
