//! User account model.

use chrono::{DateTime, Utc};
use serde::Serialize;

use andes_core::{Email, Rut, UserId, UserRole};

use super::CurrentUser;

/// A registered user.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub email: Email,
    pub full_name: String,
    pub rut: Option<Rut>,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            role: user.role,
        }
    }
}
