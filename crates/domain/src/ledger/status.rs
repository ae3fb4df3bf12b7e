use serde::{Deserialize, Serialize};

/// Purchase lifecycle.
///
/// ```text
/// Pending ──(verified settlement)──► Completed
/// ```
///
/// `Failed` is part of the stored vocabulary but nothing in this system
/// moves a purchase there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseStatus {
    #[default]
    Pending,
    Completed,
    Failed,
}

impl PurchaseStatus {
    pub fn can_settle(&self) -> bool {
        matches!(self, PurchaseStatus::Pending)
    }

    /// Pending and completed purchases count as active.
    pub fn is_active(&self) -> bool {
        !matches!(self, PurchaseStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseStatus::Pending => "pending",
            PurchaseStatus::Completed => "completed",
            PurchaseStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The independently retriable writes that make up a reconciliation, in the
/// order they are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationStep {
    SettlePayment,
    UnlockPreviews,
    EnrollUser,
    EnrollCourse,
    Finish,
}

impl ReconciliationStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconciliationStep::SettlePayment => "settle_payment",
            ReconciliationStep::UnlockPreviews => "unlock_previews",
            ReconciliationStep::EnrollUser => "enroll_user",
            ReconciliationStep::EnrollCourse => "enroll_course",
            ReconciliationStep::Finish => "finish",
        }
    }
}

impl std::fmt::Display for ReconciliationStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
