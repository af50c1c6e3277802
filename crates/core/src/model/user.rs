use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::UserId;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum UserError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("email must not be empty")]
    EmptyEmail,

    #[error("only parent accounts may reference a child")]
    ChildOnNonParent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleParseError {
    raw: String,
}

impl fmt::Display for RoleParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown role: {}", self.raw)
    }
}

impl std::error::Error for RoleParseError {}

//
// ─── ROLE ─────────────────────────────────────────────────────────────────────
//

/// Account role, decides which dashboard a signed-in user lands on and which
/// controller operations are available to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
    Student,
    Parent,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Teacher => "teacher",
            Role::Student => "student",
            Role::Parent => "parent",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "teacher" => Ok(Role::Teacher),
            "student" => Ok(Role::Student),
            "parent" => Ok(Role::Parent),
            other => Err(RoleParseError {
                raw: other.to_string(),
            }),
        }
    }
}

//
// ─── USER ─────────────────────────────────────────────────────────────────────
//

/// A user profile as mirrored from the hosted store.
///
/// Email is owned by the auth service and is never edited through this
/// system. A `parent` may carry a non-owning reference to one student via
/// `child_id`; the target is not validated for existence at write time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    id: UserId,
    name: String,
    email: String,
    role: Role,
    child_id: Option<UserId>,
}

impl User {
    /// Build a profile, enforcing that only parents may reference a child.
    ///
    /// # Errors
    ///
    /// Returns `UserError` for an empty name/email or a `child_id` on a
    /// non-parent role.
    pub fn new(
        id: UserId,
        name: impl Into<String>,
        email: impl Into<String>,
        role: Role,
        child_id: Option<UserId>,
    ) -> Result<Self, UserError> {
        let name = name.into();
        let email = email.into();
        if name.trim().is_empty() {
            return Err(UserError::EmptyName);
        }
        if email.trim().is_empty() {
            return Err(UserError::EmptyEmail);
        }
        if child_id.is_some() && role != Role::Parent {
            return Err(UserError::ChildOnNonParent);
        }

        Ok(Self {
            id,
            name,
            email,
            role,
            child_id,
        })
    }

    #[must_use]
    pub fn id(&self) -> UserId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub fn child_id(&self) -> Option<UserId> {
        self.child_id
    }

    #[must_use]
    pub fn is_student(&self) -> bool {
        self.role == Role::Student
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_may_reference_child() {
        let child = UserId::random();
        let user = User::new(
            UserId::random(),
            "Pat",
            "pat@example.com",
            Role::Parent,
            Some(child),
        )
        .unwrap();
        assert_eq!(user.child_id(), Some(child));
    }

    #[test]
    fn student_with_child_is_rejected() {
        let err = User::new(
            UserId::random(),
            "Sam",
            "sam@example.com",
            Role::Student,
            Some(UserId::random()),
        )
        .unwrap_err();
        assert_eq!(err, UserError::ChildOnNonParent);
    }

    #[test]
    fn role_parses_lowercase_names() {
        assert_eq!("teacher".parse::<Role>().unwrap(), Role::Teacher);
        assert!("principal".parse::<Role>().is_err());
    }
}
