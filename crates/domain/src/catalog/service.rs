//! Catalog service.

use common::{AggregateId, CourseId, LectureId, PurchaseId, UserId};
use event_store::EventStore;

use crate::command::{CommandHandler, CommandResult};
use crate::error::DomainError;

use super::{Course, CourseDetails, Lecture, LectureDetails, NewCourse};

/// Course and lecture operations over the event store.
#[derive(Clone)]
pub struct CatalogService<S: EventStore> {
    courses: CommandHandler<S, Course>,
    lectures: CommandHandler<S, Lecture>,
}

impl<S: EventStore + Clone> CatalogService<S> {
    pub fn new(store: S) -> Self {
        Self {
            courses: CommandHandler::new(store.clone()),
            lectures: CommandHandler::new(store),
        }
    }

    #[tracing::instrument(skip(self, course), fields(title = %course.title))]
    pub async fn create_course(
        &self,
        creator_id: UserId,
        course: NewCourse,
    ) -> Result<Course, DomainError> {
        let course_id = CourseId::new();
        let result = self
            .courses
            .execute(course_id.into(), |c| c.create(course_id, creator_id, &course))
            .await?;
        tracing::info!(%course_id, "course created");
        Ok(result.aggregate)
    }

    #[tracing::instrument(skip(self, details))]
    pub async fn edit_course(
        &self,
        course_id: CourseId,
        details: CourseDetails,
    ) -> Result<Course, DomainError> {
        let result = self
            .courses
            .execute(course_id.into(), |c| c.edit(&details))
            .await?;
        Ok(result.aggregate)
    }

    #[tracing::instrument(skip(self))]
    pub async fn publish_course(&self, course_id: CourseId) -> Result<Course, DomainError> {
        let result = self.courses.execute(course_id.into(), Course::publish).await?;
        Ok(result.aggregate)
    }

    #[tracing::instrument(skip(self))]
    pub async fn unpublish_course(&self, course_id: CourseId) -> Result<Course, DomainError> {
        let result = self
            .courses
            .execute(course_id.into(), Course::unpublish)
            .await?;
        Ok(result.aggregate)
    }

    pub async fn find_course(&self, course_id: CourseId) -> Result<Option<Course>, DomainError> {
        self.courses.load_existing(course_id.into()).await
    }

    /// Loads a course, failing with `NotFound` if it does not exist.
    pub async fn get_course(&self, course_id: CourseId) -> Result<Course, DomainError> {
        self.find_course(course_id)
            .await?
            .ok_or(DomainError::NotFound("course"))
    }

    /// Creates a lecture and appends it to the course's lecture list.
    #[tracing::instrument(skip(self))]
    pub async fn create_lecture(
        &self,
        course_id: CourseId,
        title: &str,
    ) -> Result<Lecture, DomainError> {
        self.get_course(course_id).await?;

        let lecture_id = LectureId::new();
        let lecture = self
            .lectures
            .execute(lecture_id.into(), |l| l.create(lecture_id, course_id, title))
            .await?;
        self.courses
            .execute(course_id.into(), |c| c.attach_lecture(lecture_id))
            .await?;

        tracing::info!(%lecture_id, "lecture created");
        Ok(lecture.aggregate)
    }

    /// Edits a lecture and makes sure the course lists it.
    ///
    /// An unknown course is tolerated: the lecture edit still applies.
    #[tracing::instrument(skip(self, details))]
    pub async fn edit_lecture(
        &self,
        course_id: CourseId,
        lecture_id: LectureId,
        details: LectureDetails,
    ) -> Result<Lecture, DomainError> {
        let lecture = self
            .lectures
            .execute(lecture_id.into(), |l| l.edit(&details))
            .await?;

        if self.find_course(course_id).await?.is_some() {
            self.courses
                .execute(course_id.into(), |c| c.attach_lecture(lecture_id))
                .await?;
        }

        Ok(lecture.aggregate)
    }

    /// Removes a lecture and detaches it from the course.
    #[tracing::instrument(skip(self))]
    pub async fn remove_lecture(
        &self,
        course_id: CourseId,
        lecture_id: LectureId,
    ) -> Result<(), DomainError> {
        self.get_course(course_id).await?;

        self.lectures.execute(lecture_id.into(), Lecture::remove).await?;
        self.courses
            .execute(course_id.into(), |c| c.detach_lecture(lecture_id))
            .await?;

        tracing::info!(%lecture_id, "lecture removed");
        Ok(())
    }

    pub async fn get_lecture(&self, lecture_id: LectureId) -> Result<Lecture, DomainError> {
        self.lectures
            .load_existing(lecture_id.into())
            .await?
            .filter(Lecture::is_live)
            .ok_or(DomainError::NotFound("lecture"))
    }

    /// The course's lectures in course order.
    pub async fn course_lectures(&self, course_id: CourseId) -> Result<Vec<Lecture>, DomainError> {
        let course = self.get_course(course_id).await?;
        self.load_lectures(course.lectures()).await
    }

    pub async fn load_lectures(&self, ids: &[LectureId]) -> Result<Vec<Lecture>, DomainError> {
        let mut lectures = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(lecture) = self.lectures.load_existing(AggregateId::from(*id)).await?
                && lecture.is_live()
            {
                lectures.push(lecture);
            }
        }
        Ok(lectures)
    }

    /// Marks every lecture of the course as openly previewable.
    ///
    /// Returns how many lectures changed. Already unlocked lectures are skipped,
    /// so repeating the call is harmless.
    #[tracing::instrument(skip(self))]
    pub async fn unlock_lecture_previews(
        &self,
        course_id: CourseId,
        purchase_id: PurchaseId,
    ) -> Result<usize, DomainError> {
        let course = self.get_course(course_id).await?;

        let mut unlocked = 0;
        for lecture_id in course.lectures() {
            let result = self
                .lectures
                .execute((*lecture_id).into(), |l| l.unlock_preview(purchase_id))
                .await;
            match result {
                Ok(result) if result.changed() => unlocked += 1,
                Ok(_) => {}
                // A dangling reference is not this operation's problem.
                Err(DomainError::NotFound(_)) => {
                    tracing::warn!(%lecture_id, "course lists a lecture that does not exist");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(unlocked)
    }

    /// Adds the user to the course's enrolled students. Returns whether
    /// anything changed.
    #[tracing::instrument(skip(self))]
    pub async fn enroll_student(
        &self,
        course_id: CourseId,
        user_id: UserId,
        purchase_id: PurchaseId,
    ) -> Result<bool, DomainError> {
        let result: CommandResult<Course> = self
            .courses
            .execute(course_id.into(), |c| c.enroll_student(user_id, purchase_id))
            .await?;
        Ok(result.changed())
    }
}
