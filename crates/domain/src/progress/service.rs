//! Progress tracker service.

use common::{AggregateId, CourseId, LectureId, UserId};
use event_store::EventStore;
use serde::Serialize;

use crate::catalog::{CatalogService, Course, Lecture};
use crate::command::CommandHandler;
use crate::error::DomainError;

use super::{LectureProgress, ProgressRecord};

/// What a learner sees for one course.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressReport {
    pub course: Course,
    pub lectures: Vec<Lecture>,
    pub progress: Vec<LectureProgress>,
    pub completed: bool,
}

/// Tracks lecture completion per (user, course).
///
/// Reads the catalog for the live lecture list and never writes to it.
#[derive(Clone)]
pub struct ProgressService<S: EventStore> {
    records: CommandHandler<S, ProgressRecord>,
    catalog: CatalogService<S>,
}

impl<S: EventStore + Clone> ProgressService<S> {
    pub fn new(store: S) -> Self {
        Self {
            records: CommandHandler::new(store.clone()),
            catalog: CatalogService::new(store),
        }
    }

    /// Marks a lecture viewed and re-derives the course flag from the
    /// course's current lecture list.
    #[tracing::instrument(skip(self))]
    pub async fn record_lecture_viewed(
        &self,
        user_id: UserId,
        course_id: CourseId,
        lecture_id: LectureId,
    ) -> Result<ProgressRecord, DomainError> {
        let record_id = AggregateId::for_progress(user_id, course_id);
        let catalog = &self.catalog;

        // Re-read per attempt so a retry sees the current lecture list.
        let result = self
            .records
            .execute_with(
                record_id,
                move || catalog.get_course(course_id),
                |record, course: &Course| {
                    record.record_view(record_id, user_id, course_id, lecture_id, course.lectures())
                },
            )
            .await?;

        metrics::counter!("progress_lecture_views_total").increment(1);
        if result.changed() {
            tracing::debug!(
                completed = result.aggregate.stored_completed(),
                "lecture progress recorded"
            );
        }
        Ok(result.aggregate)
    }

    #[tracing::instrument(skip(self))]
    pub async fn mark_course_completed(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<(), DomainError> {
        self.mark(user_id, course_id, true).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn mark_course_incompleted(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<(), DomainError> {
        self.mark(user_id, course_id, false).await
    }

    async fn mark(
        &self,
        user_id: UserId,
        course_id: CourseId,
        completed: bool,
    ) -> Result<(), DomainError> {
        self.records
            .execute(AggregateId::for_progress(user_id, course_id), |record| {
                record.mark(completed)
            })
            .await?;
        Ok(())
    }

    /// Reports progress against the course as it is now.
    ///
    /// Only a missing course is an error. A user who has not started the
    /// course gets an empty, incomplete report.
    #[tracing::instrument(skip(self))]
    pub async fn get_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<ProgressReport, DomainError> {
        let course = self.catalog.get_course(course_id).await?;
        let lectures = self.catalog.load_lectures(course.lectures()).await?;

        let record = self
            .records
            .load_existing(AggregateId::for_progress(user_id, course_id))
            .await?;

        let (progress, completed) = match record {
            Some(record) => (
                record.lectures().to_vec(),
                record.completion_against(course.lectures()),
            ),
            None => (Vec::new(), false),
        };

        Ok(ProgressReport {
            course,
            lectures,
            progress,
            completed,
        })
    }

    /// The raw record, if the user has started the course.
    pub async fn find_record(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<ProgressRecord>, DomainError> {
        self.records
            .load_existing(AggregateId::for_progress(user_id, course_id))
            .await
    }
}
