//! Authentication extractors.
//!
//! The session only stores a [`CurrentUser`] snapshot. Customer routes trust
//! it; staff and admin routes re-read the account so that a demoted or
//! deactivated user loses access on the next request.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use andes_core::UserRole;

use crate::db::UserRepository;
use crate::error::AppError;
use crate::models::{CurrentUser, session_keys};
use crate::state::AppState;

/// Extractor that requires a logged-in user.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", user.full_name)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        session_user(parts)
            .await
            .map(Self)
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))
    }
}

/// Extractor that optionally gets the current user.
pub struct OptionalAuth(pub Option<CurrentUser>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(session_user(parts).await))
    }
}

/// Extractor for staff or admin users.
pub struct RequireStaff(pub CurrentUser);

impl FromRequestParts<AppState> for RequireStaff {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        require_role(parts, state, UserRole::Staff).await.map(Self)
    }
}

/// Extractor for admin users.
pub struct RequireAdmin(pub CurrentUser);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        require_role(parts, state, UserRole::Admin).await.map(Self)
    }
}

async fn session_user(parts: &Parts) -> Option<CurrentUser> {
    let session = parts.extensions.get::<Session>()?;
    session
        .get::<CurrentUser>(session_keys::CURRENT_USER)
        .await
        .ok()
        .flatten()
}

async fn require_role(
    parts: &Parts,
    state: &AppState,
    required: UserRole,
) -> Result<CurrentUser, AppError> {
    let user = session_user(parts)
        .await
        .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))?;

    let account = UserRepository::new(state.pool())
        .get_by_id(user.id)
        .await?
        .filter(|account| account.is_active)
        .ok_or_else(|| AppError::Unauthorized("Account is no longer active".to_string()))?;

    if !account.role.at_least(required) {
        tracing::warn!(user_id = %account.id, role = %account.role, "Role check failed");
        return Err(AppError::Forbidden(format!("{required} role required")));
    }

    Ok(CurrentUser::from(&account))
}

/// Store the logged-in user in the session.
///
/// The session id is cycled first so a pre-login id cannot be reused.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_USER, user).await
}

/// Clear the whole session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}
