//! Lecture aggregate.

use chrono::Utc;
use common::{AggregateId, CourseId, LectureId, PurchaseId};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;

use super::{CatalogError, LectureEditedData, LectureEvent};

/// Instructor edit of a lecture. `preview_free` is always written.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LectureDetails {
    pub title: Option<String>,
    pub video_url: Option<String>,
    /// Media host's id for the uploaded video.
    pub media_id: Option<String>,
    #[serde(default)]
    pub preview_free: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Lecture {
    id: Option<LectureId>,
    #[serde(skip)]
    version: Version,
    course_id: Option<CourseId>,
    title: String,
    video_url: Option<String>,
    media_id: Option<String>,
    preview_free: bool,
    #[serde(skip)]
    removed: bool,
}

impl Aggregate for Lecture {
    type Event = LectureEvent;
    type Error = CatalogError;

    fn aggregate_type() -> &'static str {
        "Lecture"
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
            LectureEvent::LectureCreated(data) => {
                self.id = Some(data.lecture_id);
                self.course_id = Some(data.course_id);
                self.title = data.title;
            }
            LectureEvent::LectureEdited(data) => {
                if let Some(title) = data.title {
                    self.title = title;
                }
                if data.video_url.is_some() {
                    self.video_url = data.video_url;
                }
                if data.media_id.is_some() {
                    self.media_id = data.media_id;
                }
                self.preview_free = data.preview_free;
            }
            LectureEvent::PreviewUnlocked { .. } => self.preview_free = true,
            LectureEvent::LectureRemoved { .. } => self.removed = true,
        }
    }
}

impl Lecture {
    pub fn lecture_id(&self) -> Option<LectureId> {
        self.id
    }

    pub fn course_id(&self) -> Option<CourseId> {
        self.course_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn video_url(&self) -> Option<&str> {
        self.video_url.as_deref()
    }

    pub fn media_id(&self) -> Option<&str> {
        self.media_id.as_deref()
    }

    pub fn is_preview_free(&self) -> bool {
        self.preview_free
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    /// Created and not removed.
    pub fn is_live(&self) -> bool {
        self.id.is_some() && !self.removed
    }
}

impl Lecture {
    pub fn create(
        &self,
        lecture_id: LectureId,
        course_id: CourseId,
        title: &str,
    ) -> Result<Vec<LectureEvent>, CatalogError> {
        if self.id.is_some() {
            return Err(CatalogError::AlreadyCreated);
        }
        if title.trim().is_empty() {
            return Err(CatalogError::TitleRequired);
        }
        Ok(vec![LectureEvent::lecture_created(lecture_id, course_id, title)])
    }

    pub fn edit(&self, details: &LectureDetails) -> Result<Vec<LectureEvent>, CatalogError> {
        self.ensure_live()?;

        let title = match &details.title {
            Some(title) if title.trim().is_empty() => return Err(CatalogError::TitleRequired),
            Some(title) => Some(title.trim().to_string()),
            None => None,
        };

        Ok(vec![LectureEvent::LectureEdited(LectureEditedData {
            title,
            video_url: details.video_url.clone(),
            media_id: details.media_id.clone(),
            preview_free: details.preview_free,
        })])
    }

    /// Makes the lecture openly previewable. Removed lectures are left alone.
    pub fn unlock_preview(&self, purchase_id: PurchaseId) -> Result<Vec<LectureEvent>, CatalogError> {
        if self.id.is_none() {
            return Err(CatalogError::LectureNotFound);
        }
        if self.removed || self.preview_free {
            return Ok(vec![]);
        }
        Ok(vec![LectureEvent::PreviewUnlocked { purchase_id }])
    }

    pub fn remove(&self) -> Result<Vec<LectureEvent>, CatalogError> {
        self.ensure_live()?;
        Ok(vec![LectureEvent::LectureRemoved { at: Utc::now() }])
    }

    fn ensure_live(&self) -> Result<(), CatalogError> {
        if !self.is_live() {
            return Err(CatalogError::LectureNotFound);
        }
        Ok(())
    }
}
