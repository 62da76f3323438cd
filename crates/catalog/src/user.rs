use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shelfwise_auth::Role;
use shelfwise_core::validation::{required_text, NAME_MAX};
use shelfwise_core::{DomainError, DomainResult, Entity, UserId};

/// An account that can log into the admin tool.
///
/// Authentication itself is external; the directory only keeps what the
/// visibility policy needs (role and memberships).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> UserId {
        self.id
    }
}

/// Input for registering a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDraft {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
}

impl UserDraft {
    pub fn new(name: impl Into<String>, email: impl Into<String>, role: Role) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            role,
        }
    }

    pub fn validate(self) -> DomainResult<Self> {
        let name = required_text("name", &self.name, NAME_MAX)?;
        let email = required_text("email", &self.email, NAME_MAX)?.to_lowercase();
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => {}
            _ => {
                return Err(DomainError::validation(format!(
                    "email must be a valid email address (got '{email}')"
                )));
            }
        }
        Ok(Self {
            name,
            email,
            role: self.role,
        })
    }
}
