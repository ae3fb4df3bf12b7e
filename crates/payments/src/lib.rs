//! Payments: checkout initiation against a hosted provider and reconciliation
//! of the provider's signed completion notifications.
//!
//! The flow is:
//! 1. [`CheckoutService::initiate_checkout`] opens a pending purchase and a
//!    provider session, recording the session id as correlation id.
//! 2. The provider posts a signed notification; [`WebhookVerifier`]
//!    authenticates it before anything in it is read.
//! 3. [`Reconciler::handle_notification`] finds the purchase by correlation id
//!    and applies the reconciliation steps, each one retry-safe.

pub mod checkout;
pub mod error;
pub mod failures;
pub mod hosted;
pub mod provider;
pub mod reconcile;
pub mod webhook;

pub use checkout::{CheckoutService, CheckoutSettings, CheckoutStarted, PurchaseStatusReport};
pub use error::{PaymentError, Result};
pub use failures::{ReconciliationFailure, ReconciliationFailureLog};
pub use hosted::{DEFAULT_PROVIDER_TIMEOUT, HostedCheckoutProvider};
pub use provider::{CheckoutRequest, CheckoutSession, InMemoryPaymentProvider, PaymentProvider};
pub use reconcile::{NotificationOutcome, PreviewPolicy, Reconciler, ResumeAttempt};
pub use webhook::{
    CHECKOUT_COMPLETED, DEFAULT_TOLERANCE_SECS, ProviderNotification, WebhookVerifier,
};
