use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Permission strings checked by the HTTP boundary.
pub mod permissions {
    pub const QUESTION_CREATE: &str = "quest:create";
    pub const QUESTION_READ: &str = "quest:read";
    pub const QUESTION_UPDATE: &str = "quest:update";
    pub const QUESTION_DELETE: &str = "quest:del";
    pub const TEST_ADD: &str = "course:test:add";
    pub const TEST_READ: &str = "course:test:read";
    pub const TEST_WRITE: &str = "course:test:write";
    pub const TEST_DELETE: &str = "course:test:del";
    pub const TEST_ATTEMPTS_READ: &str = "course:test:answer:read";
}

/// Caller resolved by the authorization gate. Passed explicitly to every
/// attempt operation; the engine trusts `user_id` as given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: i64,
    pub role: String,
    pub permissions: HashSet<String>,
    pub blocked: bool,
}

impl Identity {
    pub fn new(user_id: i64, role: impl Into<String>) -> Self {
        Self {
            user_id,
            role: role.into(),
            permissions: HashSet::new(),
            blocked: false,
        }
    }

    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions.extend(permissions.into_iter().map(Into::into));
        self
    }

    pub fn blocked(mut self) -> Self {
        self.blocked = true;
        self
    }

    pub fn ensure_not_blocked(&self) -> Result<()> {
        if self.blocked {
            return Err(Error::Blocked(self.user_id));
        }
        Ok(())
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    pub fn require(&self, permission: &str) -> Result<()> {
        self.ensure_not_blocked()?;
        if !self.has_permission(permission) {
            return Err(Error::Forbidden(format!("missing permission {}", permission)));
        }
        Ok(())
    }
}
