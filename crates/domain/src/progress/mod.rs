//! Per-user, per-course lecture completion tracking.

mod completion;
mod events;
mod record;
mod service;

pub use completion::course_completion;
pub use events::{ProgressEvent, ProgressStartedData};
pub use record::{CompletionSource, LectureProgress, ProgressRecord};
pub use service::{ProgressReport, ProgressService};

use thiserror::Error;

use crate::error::DomainError;

#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("course progress not found")]
    RecordNotFound,
}

impl From<ProgressError> for DomainError {
    fn from(e: ProgressError) -> Self {
        match e {
            ProgressError::RecordNotFound => DomainError::NotFound("course progress"),
        }
    }
}
