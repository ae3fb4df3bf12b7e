//! Catalog events.

use chrono::{DateTime, Utc};
use common::{CourseId, LectureId, PurchaseId, UserId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::money::Money;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CourseEvent {
    CourseCreated(CourseCreatedData),
    CourseDetailsEdited(CourseDetailsEditedData),
    LectureAttached { lecture_id: LectureId },
    LectureDetached { lecture_id: LectureId },
    CoursePublished { at: DateTime<Utc> },
    CourseUnpublished { at: DateTime<Utc> },
    /// A completed purchase granted the user access.
    StudentEnrolled {
        user_id: UserId,
        purchase_id: PurchaseId,
    },
}

impl DomainEvent for CourseEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CourseEvent::CourseCreated(_) => "CourseCreated",
            CourseEvent::CourseDetailsEdited(_) => "CourseDetailsEdited",
            CourseEvent::LectureAttached { .. } => "LectureAttached",
            CourseEvent::LectureDetached { .. } => "LectureDetached",
            CourseEvent::CoursePublished { .. } => "CoursePublished",
            CourseEvent::CourseUnpublished { .. } => "CourseUnpublished",
            CourseEvent::StudentEnrolled { .. } => "StudentEnrolled",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseCreatedData {
    pub course_id: CourseId,
    pub creator_id: UserId,
    pub title: String,
    pub subtitle: Option<String>,
    pub description: String,
    pub category: Option<String>,
    pub price: Money,
    pub created_at: DateTime<Utc>,
}

/// Only the fields that changed are present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CourseDetailsEditedData {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Option<Money>,
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum LectureEvent {
    LectureCreated(LectureCreatedData),
    LectureEdited(LectureEditedData),
    /// Lecture became openly previewable because its course was purchased.
    PreviewUnlocked { purchase_id: PurchaseId },
    LectureRemoved { at: DateTime<Utc> },
}

impl DomainEvent for LectureEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LectureEvent::LectureCreated(_) => "LectureCreated",
            LectureEvent::LectureEdited(_) => "LectureEdited",
            LectureEvent::PreviewUnlocked { .. } => "PreviewUnlocked",
            LectureEvent::LectureRemoved { .. } => "LectureRemoved",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LectureCreatedData {
    pub lecture_id: LectureId,
    pub course_id: CourseId,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LectureEditedData {
    pub title: Option<String>,
    pub video_url: Option<String>,
    pub media_id: Option<String>,
    pub preview_free: bool,
}

impl CourseEvent {
    pub fn course_created(
        course_id: CourseId,
        creator_id: UserId,
        course: &super::NewCourse,
    ) -> Self {
        CourseEvent::CourseCreated(CourseCreatedData {
            course_id,
            creator_id,
            title: course.title.trim().to_string(),
            subtitle: course.subtitle.clone(),
            description: course.description.clone(),
            category: course.category.clone(),
            price: course.price,
            created_at: Utc::now(),
        })
    }
}

impl LectureEvent {
    pub fn lecture_created(lecture_id: LectureId, course_id: CourseId, title: &str) -> Self {
        LectureEvent::LectureCreated(LectureCreatedData {
            lecture_id,
            course_id,
            title: title.trim().to_string(),
            created_at: Utc::now(),
        })
    }
}
