//! Catalog store: courses and their lectures.

mod course;
mod events;
mod lecture;
mod service;

pub use course::{Course, CourseDetails, NewCourse};
pub use events::{
    CourseCreatedData, CourseDetailsEditedData, CourseEvent, LectureCreatedData,
    LectureEditedData, LectureEvent,
};
pub use lecture::{Lecture, LectureDetails};
pub use service::CatalogService;

use thiserror::Error;

use crate::error::DomainError;
use crate::money::Money;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("course not found")]
    CourseNotFound,

    #[error("lecture not found")]
    LectureNotFound,

    #[error("already created")]
    AlreadyCreated,

    #[error("title is required")]
    TitleRequired,

    #[error("price must not be negative, got {0}")]
    NegativePrice(Money),
}

impl From<CatalogError> for DomainError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::CourseNotFound => DomainError::NotFound("course"),
            CatalogError::LectureNotFound => DomainError::NotFound("lecture"),
            other => DomainError::Catalog(other),
        }
    }
}
