//! Session-related types.
//!
//! Types stored in the session for authentication and guest cart state.

use serde::{Deserialize, Serialize};

use andes_core::{Email, UserId, UserRole};

/// Session-stored user identity.
///
/// The role is a snapshot taken at login; staff and admin extractors re-read
/// it from the database before granting access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: UserId,
    pub email: Email,
    pub full_name: String,
    pub role: UserRole,
}

/// Session keys.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the guest cart token (matches `cart.session_key`).
    pub const GUEST_CART: &str = "guest_cart";
}
