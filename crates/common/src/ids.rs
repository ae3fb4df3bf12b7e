use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Returned when a client-supplied string is not a well-formed identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind} '{value}'")]
pub struct IdParseError {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }

            /// Parses a client-supplied identifier.
            pub fn parse(value: &str) -> Result<Self, IdParseError> {
                Uuid::parse_str(value.trim())
                    .map(Self)
                    .map_err(|_| IdParseError {
                        kind: $kind,
                        value: value.to_string(),
                    })
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

uuid_id!(
    /// Identifies one event stream (one aggregate instance) in the event store.
    AggregateId,
    "aggregate id"
);
uuid_id!(
    /// Identifies a user account.
    UserId,
    "user id"
);
uuid_id!(
    /// Identifies a course.
    CourseId,
    "course id"
);
uuid_id!(
    /// Identifies a lecture.
    LectureId,
    "lecture id"
);
uuid_id!(
    /// Identifies a purchase in the enrollment ledger.
    PurchaseId,
    "purchase id"
);

// Namespace for deterministic per-(user, course) stream ids.
const PROGRESS_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2b8e_4d3a_4c55_9a7e_0b1d_2c3e_4f50);

impl AggregateId {
    /// Returns the stream id of the progress record for a user in a course.
    ///
    /// The same pair always maps to the same stream, so the record can be
    /// located without an index.
    pub fn for_progress(user_id: UserId, course_id: CourseId) -> Self {
        let mut name = [0u8; 32];
        name[..16].copy_from_slice(user_id.as_uuid().as_bytes());
        name[16..].copy_from_slice(course_id.as_uuid().as_bytes());
        Self(Uuid::new_v5(&PROGRESS_NAMESPACE, &name))
    }
}

impl From<UserId> for AggregateId {
    fn from(id: UserId) -> Self {
        Self(id.0)
    }
}

impl From<CourseId> for AggregateId {
    fn from(id: CourseId) -> Self {
        Self(id.0)
    }
}

impl From<LectureId> for AggregateId {
    fn from(id: LectureId) -> Self {
        Self(id.0)
    }
}

impl From<PurchaseId> for AggregateId {
    fn from(id: PurchaseId) -> Self {
        Self(id.0)
    }
}
