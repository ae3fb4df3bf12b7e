//! User accounts and enrollment sets.
//!
//! Credentials and sessions belong to the external identity service; this
//! module only keeps what the platform itself needs about a user.

mod events;
mod role;
mod service;
mod user;

pub use events::{UserEvent, UserRegisteredData};
pub use role::Role;
pub use service::AccountService;
pub use user::{NewUser, ProfileUpdate, User};

use thiserror::Error;

use crate::error::DomainError;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("user not found")]
    UserNotFound,

    #[error("user already registered")]
    AlreadyRegistered,

    #[error("name is required")]
    NameRequired,

    #[error("invalid email address '{0}'")]
    InvalidEmail(String),
}

impl From<AccountError> for DomainError {
    fn from(e: AccountError) -> Self {
        match e {
            AccountError::UserNotFound => DomainError::NotFound("user"),
            other => DomainError::Account(other),
        }
    }
}
