//! Event-sourced domain model of the learning platform.
//!
//! - [`catalog`]: courses and lectures
//! - [`account`]: users and their enrolled courses
//! - [`ledger`]: purchases and reconciliation markers
//! - [`progress`]: per-user lecture completion
//!
//! Every aggregate is rebuilt from its own stream and written through a
//! [`CommandHandler`], which retries on optimistic-concurrency conflicts.

pub mod account;
pub mod aggregate;
pub mod catalog;
pub mod command;
pub mod error;
pub mod ledger;
pub mod money;
pub mod progress;

pub use account::{AccountError, AccountService, NewUser, ProfileUpdate, Role, User};
pub use aggregate::{Aggregate, DomainEvent};
pub use catalog::{
    CatalogError, CatalogService, Course, CourseDetails, CourseEvent, Lecture, LectureDetails,
    LectureEvent, NewCourse,
};
pub use command::{CommandHandler, CommandResult, DEFAULT_MAX_ATTEMPTS};
pub use error::DomainError;
pub use ledger::{
    LedgerService, Purchase, PurchaseError, PurchaseEvent, PurchaseStatus, ReconciliationStep,
};
pub use money::Money;
pub use progress::{
    CompletionSource, LectureProgress, ProgressError, ProgressEvent, ProgressRecord,
    ProgressReport, ProgressService, course_completion,
};
