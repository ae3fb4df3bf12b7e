use serde::{Deserialize, Serialize};

/// What a user may do on the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    #[serde(alias = "student")]
    Learner,

    /// May create and edit courses.
    #[serde(alias = "instructor")]
    Creator,
}

impl Role {
    pub fn is_creator(&self) -> bool {
        matches!(self, Role::Creator)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Learner => "learner",
            Role::Creator => "creator",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
