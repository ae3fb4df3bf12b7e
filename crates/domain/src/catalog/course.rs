//! Course aggregate.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use common::{AggregateId, CourseId, LectureId, PurchaseId, UserId};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::money::Money;

use super::{CatalogError, CourseDetailsEditedData, CourseEvent};

/// Input for creating a course.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCourse {
    pub title: String,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    pub price: Money,
}

/// Partial update of a course's descriptive fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CourseDetails {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Option<Money>,
    pub thumbnail_url: Option<String>,
}

/// A purchasable course.
///
/// The lecture list holds references only; lectures are their own aggregates.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Course {
    id: Option<CourseId>,
    #[serde(skip)]
    version: Version,
    creator_id: Option<UserId>,
    title: String,
    subtitle: Option<String>,
    description: String,
    category: Option<String>,
    price: Money,
    thumbnail_url: Option<String>,
    published: bool,
    lectures: Vec<LectureId>,
    enrolled_students: BTreeSet<UserId>,
    created_at: Option<DateTime<Utc>>,
}

impl Aggregate for Course {
    type Event = CourseEvent;
    type Error = CatalogError;

    fn aggregate_type() -> &'static str {
        "Course"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id.map(AggregateId::from)
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            CourseEvent::CourseCreated(data) => {
                self.id = Some(data.course_id);
                self.creator_id = Some(data.creator_id);
                self.title = data.title;
                self.subtitle = data.subtitle;
                self.description = data.description;
                self.category = data.category;
                self.price = data.price;
                self.created_at = Some(data.created_at);
            }
            CourseEvent::CourseDetailsEdited(data) => self.apply_details(data),
            CourseEvent::LectureAttached { lecture_id } => {
                if !self.lectures.contains(&lecture_id) {
                    self.lectures.push(lecture_id);
                }
            }
            CourseEvent::LectureDetached { lecture_id } => {
                self.lectures.retain(|id| *id != lecture_id);
            }
            CourseEvent::CoursePublished { .. } => self.published = true,
            CourseEvent::CourseUnpublished { .. } => self.published = false,
            CourseEvent::StudentEnrolled { user_id, .. } => {
                self.enrolled_students.insert(user_id);
            }
        }
    }
}

impl Course {
    fn apply_details(&mut self, data: CourseDetailsEditedData) {
        if let Some(title) = data.title {
            self.title = title;
        }
        if data.subtitle.is_some() {
            self.subtitle = data.subtitle;
        }
        if let Some(description) = data.description {
            self.description = description;
        }
        if data.category.is_some() {
            self.category = data.category;
        }
        if let Some(price) = data.price {
            self.price = price;
        }
        if data.thumbnail_url.is_some() {
            self.thumbnail_url = data.thumbnail_url;
        }
    }
}

// Queries
impl Course {
    pub fn course_id(&self) -> Option<CourseId> {
        self.id
    }

    pub fn creator_id(&self) -> Option<UserId> {
        self.creator_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn subtitle(&self) -> Option<&str> {
        self.subtitle.as_deref()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn price(&self) -> Money {
        self.price
    }

    pub fn thumbnail_url(&self) -> Option<&str> {
        self.thumbnail_url.as_deref()
    }

    pub fn is_published(&self) -> bool {
        self.published
    }

    /// Current lecture list, in course order.
    pub fn lectures(&self) -> &[LectureId] {
        &self.lectures
    }

    pub fn has_lecture(&self, lecture_id: LectureId) -> bool {
        self.lectures.contains(&lecture_id)
    }

    pub fn enrolled_students(&self) -> &BTreeSet<UserId> {
        &self.enrolled_students
    }

    pub fn is_enrolled(&self, user_id: UserId) -> bool {
        self.enrolled_students.contains(&user_id)
    }
}

// Commands
impl Course {
    pub fn create(
        &self,
        course_id: CourseId,
        creator_id: UserId,
        course: &NewCourse,
    ) -> Result<Vec<CourseEvent>, CatalogError> {
        if self.id.is_some() {
            return Err(CatalogError::AlreadyCreated);
        }
        if course.title.trim().is_empty() {
            return Err(CatalogError::TitleRequired);
        }
        if course.price.is_negative() {
            return Err(CatalogError::NegativePrice(course.price));
        }

        Ok(vec![CourseEvent::course_created(course_id, creator_id, course)])
    }

    pub fn edit(&self, details: &CourseDetails) -> Result<Vec<CourseEvent>, CatalogError> {
        self.ensure_created()?;

        let title = match &details.title {
            Some(title) if title.trim().is_empty() => return Err(CatalogError::TitleRequired),
            Some(title) => Some(title.trim().to_string()),
            None => None,
        };
        if let Some(price) = details.price
            && price.is_negative()
        {
            return Err(CatalogError::NegativePrice(price));
        }

        let data = CourseDetailsEditedData {
            title,
            subtitle: details.subtitle.clone(),
            description: details.description.clone(),
            category: details.category.clone(),
            price: details.price,
            thumbnail_url: details.thumbnail_url.clone(),
        };
        let empty = data.title.is_none()
            && data.subtitle.is_none()
            && data.description.is_none()
            && data.category.is_none()
            && data.price.is_none()
            && data.thumbnail_url.is_none();

        if empty {
            Ok(vec![])
        } else {
            Ok(vec![CourseEvent::CourseDetailsEdited(data)])
        }
    }

    pub fn publish(&self) -> Result<Vec<CourseEvent>, CatalogError> {
        self.ensure_created()?;
        if self.published {
            return Ok(vec![]);
        }
        Ok(vec![CourseEvent::CoursePublished { at: Utc::now() }])
    }

    pub fn unpublish(&self) -> Result<Vec<CourseEvent>, CatalogError> {
        self.ensure_created()?;
        if !self.published {
            return Ok(vec![]);
        }
        Ok(vec![CourseEvent::CourseUnpublished { at: Utc::now() }])
    }

    /// Adds a lecture to the end of the list unless it is already there.
    pub fn attach_lecture(&self, lecture_id: LectureId) -> Result<Vec<CourseEvent>, CatalogError> {
        self.ensure_created()?;
        if self.has_lecture(lecture_id) {
            return Ok(vec![]);
        }
        Ok(vec![CourseEvent::LectureAttached { lecture_id }])
    }

    pub fn detach_lecture(&self, lecture_id: LectureId) -> Result<Vec<CourseEvent>, CatalogError> {
        self.ensure_created()?;
        if !self.has_lecture(lecture_id) {
            return Ok(vec![]);
        }
        Ok(vec![CourseEvent::LectureDetached { lecture_id }])
    }

    /// Set insert: enrolling an already enrolled student is a no-op.
    pub fn enroll_student(
        &self,
        user_id: UserId,
        purchase_id: PurchaseId,
    ) -> Result<Vec<CourseEvent>, CatalogError> {
        self.ensure_created()?;
        if self.is_enrolled(user_id) {
            return Ok(vec![]);
        }
        Ok(vec![CourseEvent::StudentEnrolled {
            user_id,
            purchase_id,
        }])
    }

    fn ensure_created(&self) -> Result<(), CatalogError> {
        if self.id.is_none() {
            return Err(CatalogError::CourseNotFound);
        }
        Ok(())
    }
}
