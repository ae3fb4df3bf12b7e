use chrono::{DateTime, Utc};
use common::{CourseId, PurchaseId, UserId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::money::Money;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PurchaseEvent {
    PurchaseCreated(PurchaseCreatedData),

    /// The provider issued a checkout session; its id is the correlation id
    /// later carried by the provider's notifications.
    CheckoutSessionAttached { correlation_id: String },

    /// Status moved to completed. The amount is replaced by the provider's
    /// settled total when one was reported.
    PaymentSettled {
        settled_amount: Option<Money>,
        settled_at: DateTime<Utc>,
    },

    LecturePreviewsUnlocked { lectures: usize },
    UserEnrollmentApplied,
    CourseEnrollmentApplied,
    ReconciliationFinished { finished_at: DateTime<Utc> },
}

impl DomainEvent for PurchaseEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PurchaseEvent::PurchaseCreated(_) => "PurchaseCreated",
            PurchaseEvent::CheckoutSessionAttached { .. } => "CheckoutSessionAttached",
            PurchaseEvent::PaymentSettled { .. } => "PaymentSettled",
            PurchaseEvent::LecturePreviewsUnlocked { .. } => "LecturePreviewsUnlocked",
            PurchaseEvent::UserEnrollmentApplied => "UserEnrollmentApplied",
            PurchaseEvent::CourseEnrollmentApplied => "CourseEnrollmentApplied",
            PurchaseEvent::ReconciliationFinished { .. } => "ReconciliationFinished",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseCreatedData {
    pub purchase_id: PurchaseId,
    pub user_id: UserId,
    pub course_id: CourseId,
    pub amount: Money,
    pub created_at: DateTime<Utc>,
}
