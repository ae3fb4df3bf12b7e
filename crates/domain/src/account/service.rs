//! Account service.

use common::{CourseId, PurchaseId, UserId};
use event_store::EventStore;

use crate::command::CommandHandler;
use crate::error::DomainError;

use super::{NewUser, ProfileUpdate, User};

#[derive(Clone)]
pub struct AccountService<S: EventStore> {
    handler: CommandHandler<S, User>,
}

impl<S: EventStore> AccountService<S> {
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store),
        }
    }

    #[tracing::instrument(skip(self, new), fields(role = %new.role))]
    pub async fn register_user(&self, new: NewUser) -> Result<User, DomainError> {
        let user_id = UserId::new();
        let result = self
            .handler
            .execute(user_id.into(), |u| u.register(user_id, &new))
            .await?;
        tracing::info!(%user_id, "user registered");
        Ok(result.aggregate)
    }

    pub async fn get_profile(&self, user_id: UserId) -> Result<User, DomainError> {
        self.handler
            .load_existing(user_id.into())
            .await?
            .ok_or(DomainError::NotFound("user"))
    }

    #[tracing::instrument(skip(self, update))]
    pub async fn update_profile(
        &self,
        user_id: UserId,
        update: ProfileUpdate,
    ) -> Result<User, DomainError> {
        let result = self
            .handler
            .execute(user_id.into(), |u| u.update_profile(&update))
            .await?;
        Ok(result.aggregate)
    }

    /// Adds the course to the user's enrolled set. Returns whether anything
    /// changed.
    #[tracing::instrument(skip(self))]
    pub async fn enroll_in_course(
        &self,
        user_id: UserId,
        course_id: CourseId,
        purchase_id: PurchaseId,
    ) -> Result<bool, DomainError> {
        let result = self
            .handler
            .execute(user_id.into(), |u| u.enroll(course_id, purchase_id))
            .await?;
        Ok(result.changed())
    }
}
