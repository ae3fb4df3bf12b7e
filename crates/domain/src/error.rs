//! Domain error types.

use common::{AggregateId, IdParseError};
use event_store::EventStoreError;
use thiserror::Error;

use crate::account::AccountError;
use crate::catalog::CatalogError;
use crate::ledger::PurchaseError;

/// Errors surfaced by the domain services.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A client-supplied identifier was malformed.
    #[error("invalid reference: {0}")]
    InvalidReference(#[from] IdParseError),

    /// The named entity does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error(transparent)]
    Catalog(CatalogError),

    #[error(transparent)]
    Account(AccountError),

    #[error(transparent)]
    Purchase(PurchaseError),

    /// Every retry of a command lost the race against another writer.
    #[error("gave up on {aggregate_id} after {attempts} conflicting writes")]
    ConcurrencyExhausted {
        aggregate_id: AggregateId,
        attempts: u32,
    },

    #[error("event store error: {0}")]
    EventStore(#[from] EventStoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, DomainError::NotFound(_))
    }

    /// True for errors caused by the caller's input rather than the system.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            DomainError::InvalidReference(_)
                | DomainError::Catalog(_)
                | DomainError::Account(_)
                | DomainError::Purchase(_)
        )
    }
}
