use chrono::{DateTime, Utc};
use common::{CourseId, PurchaseId, UserId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum UserEvent {
    UserRegistered(UserRegisteredData),
    ProfileUpdated {
        name: Option<String>,
        photo_url: Option<String>,
    },
    /// Only ever emitted while reconciling a completed purchase.
    CourseEnrolled {
        course_id: CourseId,
        purchase_id: PurchaseId,
    },
}

impl DomainEvent for UserEvent {
    fn event_type(&self) -> &'static str {
        match self {
            UserEvent::UserRegistered(_) => "UserRegistered",
            UserEvent::ProfileUpdated { .. } => "ProfileUpdated",
            UserEvent::CourseEnrolled { .. } => "CourseEnrolled",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRegisteredData {
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub registered_at: DateTime<Utc>,
}
