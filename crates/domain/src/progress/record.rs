//! Progress record aggregate.

use chrono::{DateTime, Utc};
use common::{AggregateId, CourseId, LectureId, UserId};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;

use super::{ProgressError, ProgressEvent, ProgressStartedData, course_completion};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LectureProgress {
    pub lecture_id: LectureId,
    pub completed: bool,
}

/// Where the stored course flag came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionSource {
    /// Computed from the lecture list on the last view.
    #[default]
    Derived,
    /// Set by an explicit complete/incomplete action.
    Marked,
}

/// Progress of one user through one course.
///
/// Lives in the stream `AggregateId::for_progress(user, course)` and is
/// created by the first lecture view.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProgressRecord {
    #[serde(skip)]
    id: Option<AggregateId>,
    #[serde(skip)]
    version: Version,
    user_id: Option<UserId>,
    course_id: Option<CourseId>,
    lectures: Vec<LectureProgress>,
    completed: bool,
    source: CompletionSource,
    started_at: Option<DateTime<Utc>>,
}

impl Aggregate for ProgressRecord {
    type Event = ProgressEvent;
    type Error = ProgressError;

    fn aggregate_type() -> &'static str {
        "CourseProgress"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            ProgressEvent::ProgressStarted(data) => {
                self.id = Some(data.record_id);
                self.user_id = Some(data.user_id);
                self.course_id = Some(data.course_id);
                self.started_at = Some(data.started_at);
            }
            ProgressEvent::LectureCompleted { lecture_id, .. } => {
                upsert_completed(&mut self.lectures, lecture_id);
            }
            ProgressEvent::CompletionRecomputed { completed } => {
                self.completed = completed;
                self.source = CompletionSource::Derived;
            }
            ProgressEvent::CourseMarked { completed, .. } => {
                for entry in &mut self.lectures {
                    entry.completed = completed;
                }
                self.completed = completed;
                self.source = CompletionSource::Marked;
            }
        }
    }
}

fn upsert_completed(lectures: &mut Vec<LectureProgress>, lecture_id: LectureId) {
    match lectures.iter_mut().find(|e| e.lecture_id == lecture_id) {
        Some(entry) => entry.completed = true,
        None => lectures.push(LectureProgress {
            lecture_id,
            completed: true,
        }),
    }
}

impl ProgressRecord {
    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn course_id(&self) -> Option<CourseId> {
        self.course_id
    }

    /// Tracked lectures in the order they were first viewed.
    pub fn lectures(&self) -> &[LectureProgress] {
        &self.lectures
    }

    /// The flag as last persisted.
    pub fn stored_completed(&self) -> bool {
        self.completed
    }

    pub fn source(&self) -> CompletionSource {
        self.source
    }

    /// Course completion against the course's current lecture list.
    ///
    /// A derived flag is recomputed so catalog edits since the last view are
    /// reflected; an explicit mark is reported as it was set.
    pub fn completion_against(&self, current_lectures: &[LectureId]) -> bool {
        match self.source {
            CompletionSource::Derived => course_completion(current_lectures, &self.lectures),
            CompletionSource::Marked => self.completed,
        }
    }
}

impl ProgressRecord {
    /// Records a lecture view and re-derives the course flag.
    ///
    /// Starts the record if this is the first view. Viewing a lecture that is
    /// already complete produces no events unless the derived flag changes.
    pub fn record_view(
        &self,
        record_id: AggregateId,
        user_id: UserId,
        course_id: CourseId,
        lecture_id: LectureId,
        current_lectures: &[LectureId],
    ) -> Result<Vec<ProgressEvent>, ProgressError> {
        let mut events = Vec::new();

        if self.id.is_none() {
            events.push(ProgressEvent::ProgressStarted(ProgressStartedData {
                record_id,
                user_id,
                course_id,
                started_at: Utc::now(),
            }));
        }

        let already_done = self
            .lectures
            .iter()
            .any(|e| e.lecture_id == lecture_id && e.completed);
        if !already_done {
            events.push(ProgressEvent::LectureCompleted {
                lecture_id,
                completed_at: Utc::now(),
            });
        }

        let mut after_view = self.lectures.clone();
        upsert_completed(&mut after_view, lecture_id);
        let completed = course_completion(current_lectures, &after_view);

        if completed != self.completed || self.source == CompletionSource::Marked {
            events.push(ProgressEvent::CompletionRecomputed { completed });
        }

        Ok(events)
    }

    /// Explicitly sets the course flag and every tracked lecture.
    ///
    /// Lectures that were never viewed stay untracked: marking a course
    /// complete does not invent entries for them.
    pub fn mark(&self, completed: bool) -> Result<Vec<ProgressEvent>, ProgressError> {
        if self.id.is_none() {
            return Err(ProgressError::RecordNotFound);
        }

        let unchanged = self.source == CompletionSource::Marked
            && self.completed == completed
            && self.lectures.iter().all(|e| e.completed == completed);
        if unchanged {
            return Ok(vec![]);
        }

        Ok(vec![ProgressEvent::CourseMarked {
            completed,
            marked_at: Utc::now(),
        }])
    }
}
