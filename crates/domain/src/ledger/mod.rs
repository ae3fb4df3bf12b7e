//! Enrollment ledger: purchases and their reconciliation progress.

mod events;
mod purchase;
mod service;
mod status;

pub use events::{PurchaseCreatedData, PurchaseEvent};
pub use purchase::Purchase;
pub use service::LedgerService;
pub use status::{PurchaseStatus, ReconciliationStep};

use thiserror::Error;

use crate::error::DomainError;

#[derive(Debug, Error)]
pub enum PurchaseError {
    #[error("purchase not found")]
    PurchaseNotFound,

    #[error("purchase already created")]
    AlreadyCreated,

    #[error("cannot {action} a {status} purchase")]
    InvalidTransition {
        status: PurchaseStatus,
        action: &'static str,
    },

    #[error("checkout session id is required")]
    SessionIdRequired,

    #[error("purchase is already bound to checkout session {0}")]
    SessionAlreadyAttached(String),

    #[error("cannot finish reconciliation, {0} is outstanding")]
    StepOutstanding(ReconciliationStep),
}

impl From<PurchaseError> for DomainError {
    fn from(e: PurchaseError) -> Self {
        match e {
            PurchaseError::PurchaseNotFound => DomainError::NotFound("purchase"),
            other => DomainError::Purchase(other),
        }
    }
}
