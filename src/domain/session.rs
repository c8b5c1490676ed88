use super::StudentId;
use crate::error::{HostelError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Admin,
}

/// Caller identity, supplied explicitly to every workflow invocation.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: StudentId,
    pub role: Role,
    /// Bearer token forwarded to the hosted store, when there is one.
    pub access_token: Option<String>,
}

impl Session {
    pub fn student(user_id: StudentId) -> Self {
        Self {
            user_id,
            role: Role::Student,
            access_token: None,
        }
    }

    pub fn admin(user_id: StudentId) -> Self {
        Self {
            user_id,
            role: Role::Admin,
            access_token: None,
        }
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn require_admin(&self, action: &str) -> Result<()> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(HostelError::Forbidden(format!(
                "only administrators may {action}"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_admin() {
        let id = StudentId::new();
        assert!(Session::admin(id).require_admin("approve bookings").is_ok());
        assert!(matches!(
            Session::student(id).require_admin("approve bookings"),
            Err(HostelError::Forbidden(msg)) if msg.contains("approve bookings")
        ));
    }
}
