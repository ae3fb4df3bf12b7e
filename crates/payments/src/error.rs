//! Payment errors.

use common::PurchaseId;
use domain::{DomainError, ReconciliationStep};
use projections::ProjectionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PaymentError {
    /// The notification could not be authenticated or is not a notification
    /// at all. Nothing in it may be trusted.
    #[error("webhook verification failed: {0}")]
    Verification(String),

    /// The provider refused or failed to create a checkout session.
    #[error("payment provider error: {0}")]
    Provider(String),

    #[error("no purchase matches checkout session '{0}'")]
    UnknownSession(String),

    #[error("purchase {0} has no reconciliation left to resume")]
    NothingToResume(PurchaseId),

    /// One reconciliation step failed. Steps before it stay applied and a
    /// retry resumes at this step.
    #[error("reconciliation of purchase {purchase_id} failed at {step}: {source}")]
    Reconciliation {
        purchase_id: PurchaseId,
        step: ReconciliationStep,
        #[source]
        source: DomainError,
    },

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("read model error: {0}")]
    Projection(#[from] ProjectionError),
}

impl PaymentError {
    /// True when a referenced session, purchase or entity does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            PaymentError::UnknownSession(_) | PaymentError::NothingToResume(_) => true,
            PaymentError::Domain(e) => e.is_not_found(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, PaymentError>;
