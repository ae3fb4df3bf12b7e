//! Shared application state.

use std::sync::Arc;

use common::{CourseId, UserId};
use domain::{AccountService, CatalogService, Course, ProgressService, User};
use event_store::EventStore;
use payments::{CheckoutService, PaymentProvider, Reconciler, WebhookVerifier};
use projections::{CourseCatalogView, ProjectionProcessor};

use crate::error::ApiError;

pub type DynProvider = Arc<dyn PaymentProvider>;

pub struct AppState<S: EventStore> {
    pub accounts: AccountService<S>,
    pub catalog: CatalogService<S>,
    pub progress: ProgressService<S>,
    pub checkout: CheckoutService<S, DynProvider>,
    pub reconciler: Reconciler<S>,
    pub verifier: WebhookVerifier,
    pub courses: CourseCatalogView,
    pub projection_processor: Arc<ProjectionProcessor<S>>,
    /// Shared secret for the reconciliation endpoints; `None` disables them.
    pub operator_token: Option<String>,
}

impl<S: EventStore + Clone> AppState<S> {
    /// Loads the caller's profile and requires the creator role.
    pub async fn require_creator(&self, user_id: UserId) -> Result<User, ApiError> {
        let user = self.accounts.get_profile(user_id).await?;
        if !user.role().is_creator() {
            return Err(ApiError::Forbidden(
                "only creators can manage courses".to_string(),
            ));
        }
        Ok(user)
    }

    /// Loads a course the caller created.
    pub async fn owned_course(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Course, ApiError> {
        self.require_creator(user_id).await?;
        let course = self.catalog.get_course(course_id).await?;
        if course.creator_id() != Some(user_id) {
            return Err(ApiError::Forbidden(
                "course belongs to another creator".to_string(),
            ));
        }
        Ok(course)
    }
}
