pub mod checkout;
pub mod courses;
pub mod health;
pub mod metrics;
pub mod progress;
pub mod reconciliation;
pub mod users;
pub mod webhooks;
