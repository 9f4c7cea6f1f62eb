//! Authentication route handlers.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{RequireAuth, clear_current_user, set_current_user};
use crate::models::{CurrentUser, User};
use crate::routes::cart::merge_guest_cart;
use crate::services::auth::{AuthService, Registration};
use crate::state::AppState;

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

async fn start_session(state: &AppState, session: &Session, user: &User) -> Result<CurrentUser> {
    let current = CurrentUser::from(user);
    set_current_user(session, &current).await?;
    merge_guest_cart(state, session, &current).await?;
    set_sentry_user(&current.id, Some(current.email.as_str()));
    Ok(current)
}

/// Create a customer account and log it in.
#[instrument(skip(state, session, registration), fields(email = %registration.email))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Json(registration): Json<Registration>,
) -> Result<(StatusCode, Json<CurrentUser>)> {
    let user = AuthService::new(state.pool())
        .register(&registration)
        .await?;
    tracing::info!(user_id = %user.id, "User registered");

    let current = start_session(&state, &session, &user).await?;
    Ok((StatusCode::CREATED, Json(current)))
}

#[instrument(skip(state, session, body))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<LoginRequest>,
) -> Result<Json<CurrentUser>> {
    let user = AuthService::new(state.pool())
        .login(&body.email, &body.password)
        .await
        .inspect_err(|e| tracing::info!(error = %e, "Login failed"))?;

    let current = start_session(&state, &session, &user).await?;
    tracing::info!(user_id = %current.id, "User logged in");
    Ok(Json(current))
}

#[instrument(skip(session))]
pub async fn logout(session: Session) -> Result<StatusCode> {
    clear_current_user(&session).await?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}

/// The logged-in user as stored in the session.
pub async fn me(RequireAuth(user): RequireAuth) -> Json<CurrentUser> {
    Json(user)
}

