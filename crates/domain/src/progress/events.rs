use chrono::{DateTime, Utc};
use common::{AggregateId, CourseId, LectureId, UserId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ProgressEvent {
    ProgressStarted(ProgressStartedData),
    LectureCompleted {
        lecture_id: LectureId,
        completed_at: DateTime<Utc>,
    },
    /// The course flag was derived from the lecture list after a view.
    CompletionRecomputed { completed: bool },
    /// Explicit override: every tracked lecture and the course flag were set
    /// to `completed`.
    CourseMarked {
        completed: bool,
        marked_at: DateTime<Utc>,
    },
}

impl DomainEvent for ProgressEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProgressEvent::ProgressStarted(_) => "ProgressStarted",
            ProgressEvent::LectureCompleted { .. } => "LectureCompleted",
            ProgressEvent::CompletionRecomputed { .. } => "CompletionRecomputed",
            ProgressEvent::CourseMarked { .. } => "CourseMarked",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressStartedData {
    pub record_id: AggregateId,
    pub user_id: UserId,
    pub course_id: CourseId,
    pub started_at: DateTime<Utc>,
}
