//! The authenticated identity attached to a request

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

use super::user::Role;

/// Authenticated caller. Built from a verified token and passed explicitly to
/// every catalog and transaction operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Principal {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

impl Principal {
    pub fn is_staff(&self) -> bool {
        self.role == Role::Staff
    }

    /// Authorization gate: the token must still be valid and the role must be
    /// one of `allowed`.
    pub fn require_role(&self, allowed: &[Role], action: &str) -> AppResult<()> {
        if self.expires_at <= Utc::now() {
            return Err(AppError::Unauthorized("token expired".to_string()));
        }
        if !allowed.contains(&self.role) {
            tracing::debug!(user_id = %self.user_id, role = %self.role, "{} denied", action);
            return Err(AppError::Unauthorized(format!(
                "{} cant {}",
                self.role, action
            )));
        }
        Ok(())
    }

    /// Any authenticated, unexpired principal.
    pub fn require_authenticated(&self) -> AppResult<()> {
        self.require_role(&[Role::Staff, Role::Customer], "access this resource")
    }
}
