//! Ledger service.

use common::{CourseId, PurchaseId, UserId};
use event_store::EventStore;

use crate::command::{CommandHandler, CommandResult};
use crate::error::DomainError;
use crate::money::Money;

use super::{Purchase, ReconciliationStep};

/// Writes to purchase streams. Lookups by correlation id or by user go
/// through the purchase ledger read model.
#[derive(Clone)]
pub struct LedgerService<S: EventStore> {
    handler: CommandHandler<S, Purchase>,
}

impl<S: EventStore> LedgerService<S> {
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store),
        }
    }

    /// Opens a pending purchase with no correlation id.
    #[tracing::instrument(skip(self))]
    pub async fn open_purchase(
        &self,
        user_id: UserId,
        course_id: CourseId,
        amount: Money,
    ) -> Result<Purchase, DomainError> {
        let purchase_id = PurchaseId::new();
        let result = self
            .handler
            .execute(purchase_id.into(), |p| {
                p.create(purchase_id, user_id, course_id, amount)
            })
            .await?;
        tracing::info!(%purchase_id, "purchase opened");
        Ok(result.aggregate)
    }

    #[tracing::instrument(skip(self))]
    pub async fn attach_checkout_session(
        &self,
        purchase_id: PurchaseId,
        correlation_id: &str,
    ) -> Result<Purchase, DomainError> {
        let result = self
            .handler
            .execute(purchase_id.into(), |p| p.attach_session(correlation_id))
            .await?;
        Ok(result.aggregate)
    }

    #[tracing::instrument(skip(self))]
    pub async fn settle_payment(
        &self,
        purchase_id: PurchaseId,
        settled_amount: Option<Money>,
    ) -> Result<CommandResult<Purchase>, DomainError> {
        self.handler
            .execute(purchase_id.into(), |p| p.settle(settled_amount))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn record_step(
        &self,
        purchase_id: PurchaseId,
        step: ReconciliationStep,
        lectures_unlocked: usize,
    ) -> Result<Purchase, DomainError> {
        let result = self
            .handler
            .execute(purchase_id.into(), |p| p.record_step(step, lectures_unlocked))
            .await?;
        Ok(result.aggregate)
    }

    pub async fn find_purchase(
        &self,
        purchase_id: PurchaseId,
    ) -> Result<Option<Purchase>, DomainError> {
        self.handler.load_existing(purchase_id.into()).await
    }

    pub async fn get_purchase(&self, purchase_id: PurchaseId) -> Result<Purchase, DomainError> {
        self.find_purchase(purchase_id)
            .await?
            .ok_or(DomainError::NotFound("purchase"))
    }
}
