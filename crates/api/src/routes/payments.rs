//! Payment routes.
//!
//! The gateway calls the webhook with a form-encoded `token` and redirects
//! the payer to the return URL with the same token.

use axum::{
    Form, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::services::payments::{PaymentReport, PaymentService, StartedPayment};
use crate::state::AppState;

/// Gateway callback parameters.
#[derive(Debug, Deserialize)]
pub struct TokenParams {
    pub token: String,
}

fn service(state: &AppState) -> Result<PaymentService<'_>> {
    let gateway = state.gateway().ok_or(AppError::PaymentsDisabled)?;
    Ok(PaymentService::new(
        state.pool(),
        gateway,
        &state.config().base_url,
    ))
}

fn require_token(token: &str) -> Result<&str> {
    let token = token.trim();
    if token.is_empty() {
        return Err(AppError::BadRequest("token is required".to_string()));
    }
    Ok(token)
}

/// Start paying one of the user's pending orders.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn start(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(number): Path<String>,
) -> Result<(StatusCode, Json<StartedPayment>)> {
    let started = service(&state)?
        .start(user.id, user.email.as_str(), &number)
        .await?;
    Ok((StatusCode::CREATED, Json(started)))
}

/// Gateway confirmation callback.
#[instrument(skip(state, params))]
pub async fn webhook(
    State(state): State<AppState>,
    Form(params): Form<TokenParams>,
) -> Result<StatusCode> {
    let token = require_token(&params.token)?;
    let transaction = service(&state)?.confirm(token).await?;
    tracing::info!(
        payment_id = %transaction.id,
        status = ?transaction.status,
        "Payment notification processed"
    );
    Ok(StatusCode::OK)
}

/// Status shown after the payer returns from the gateway.
#[instrument(skip(state, params))]
pub async fn payment_return(
    State(state): State<AppState>,
    Query(params): Query<TokenParams>,
) -> Result<Json<PaymentReport>> {
    let token = require_token(&params.token)?;
    Ok(Json(service(&state)?.report(token).await?))
}
