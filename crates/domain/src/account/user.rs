//! User aggregate.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use common::{AggregateId, CourseId, PurchaseId, UserId};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;

use super::{AccountError, Role, UserEvent, UserRegisteredData};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct User {
    id: Option<UserId>,
    #[serde(skip)]
    version: Version,
    name: String,
    email: String,
    role: Role,
    photo_url: Option<String>,
    enrolled_courses: BTreeSet<CourseId>,
    registered_at: Option<DateTime<Utc>>,
}

impl Aggregate for User {
    type Event = UserEvent;
    type Error = AccountError;

    fn aggregate_type() -> &'static str {
        "User"
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
            UserEvent::UserRegistered(data) => {
                self.id = Some(data.user_id);
                self.name = data.name;
                self.email = data.email;
                self.role = data.role;
                self.registered_at = Some(data.registered_at);
            }
            UserEvent::ProfileUpdated { name, photo_url } => {
                if let Some(name) = name {
                    self.name = name;
                }
                if photo_url.is_some() {
                    self.photo_url = photo_url;
                }
            }
            UserEvent::CourseEnrolled { course_id, .. } => {
                self.enrolled_courses.insert(course_id);
            }
        }
    }
}

impl User {
    pub fn user_id(&self) -> Option<UserId> {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn photo_url(&self) -> Option<&str> {
        self.photo_url.as_deref()
    }

    pub fn enrolled_courses(&self) -> &BTreeSet<CourseId> {
        &self.enrolled_courses
    }

    pub fn is_enrolled_in(&self, course_id: CourseId) -> bool {
        self.enrolled_courses.contains(&course_id)
    }
}

/// Lower-cases and trims an address, rejecting anything without a local part
/// and a dotted domain.
pub(crate) fn normalize_email(raw: &str) -> Result<String, AccountError> {
    let email = raw.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && !email.contains(char::is_whitespace)
                && domain
                    .split_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
        }
        None => false,
    };
    if !valid {
        return Err(AccountError::InvalidEmail(raw.to_string()));
    }
    Ok(email)
}

impl User {
    pub fn register(&self, user_id: UserId, new: &NewUser) -> Result<Vec<UserEvent>, AccountError> {
        if self.id.is_some() {
            return Err(AccountError::AlreadyRegistered);
        }
        let name = new.name.trim();
        if name.is_empty() {
            return Err(AccountError::NameRequired);
        }
        let email = normalize_email(&new.email)?;

        Ok(vec![UserEvent::UserRegistered(UserRegisteredData {
            user_id,
            name: name.to_string(),
            email,
            role: new.role,
            registered_at: Utc::now(),
        })])
    }

    pub fn update_profile(&self, update: &ProfileUpdate) -> Result<Vec<UserEvent>, AccountError> {
        if self.id.is_none() {
            return Err(AccountError::UserNotFound);
        }
        let name = match &update.name {
            Some(name) if name.trim().is_empty() => return Err(AccountError::NameRequired),
            Some(name) => Some(name.trim().to_string()),
            None => None,
        };
        if name.is_none() && update.photo_url.is_none() {
            return Ok(vec![]);
        }
        Ok(vec![UserEvent::ProfileUpdated {
            name,
            photo_url: update.photo_url.clone(),
        }])
    }

    /// Set insert into the enrolled courses.
    pub fn enroll(
        &self,
        course_id: CourseId,
        purchase_id: PurchaseId,
    ) -> Result<Vec<UserEvent>, AccountError> {
        if self.id.is_none() {
            return Err(AccountError::UserNotFound);
        }
        if self.is_enrolled_in(course_id) {
            return Ok(vec![]);
        }
        Ok(vec![UserEvent::CourseEnrolled {
            course_id,
            purchase_id,
        }])
    }
}
