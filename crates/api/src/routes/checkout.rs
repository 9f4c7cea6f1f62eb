//! Checkout route.

use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;
use serde_json::json;
use tracing::instrument;

use crate::error::{Result, add_breadcrumb};
use crate::middleware::{ClientIp, RequireAuth};
use crate::models::{AddressInput, OrderDetail};
use crate::services::audit::{AuditActor, AuditService};
use crate::services::checkout::{CheckoutRequest, CheckoutService};
use crate::state::AppState;

/// Turn the user's cart into a `pending_payment` order.
#[instrument(skip(state, user, ip, request), fields(user_id = %user.id))]
pub async fn checkout(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ip: ClientIp,
    Json(mut request): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<OrderDetail>)> {
    request.address = request
        .address
        .take()
        .map(AddressInput::normalized)
        .transpose()?;

    let detail = CheckoutService::new(state.pool(), state.config().reservation_ttl)
        .checkout(&user, &request, Utc::now())
        .await?;

    add_breadcrumb(
        "checkout",
        "Order placed",
        Some(&[("order_number", detail.order.number.as_str())]),
    );
    AuditService::new(state.pool())
        .record(
            &AuditActor::new(user.id, ip.0),
            "order.create",
            "order",
            &detail.order.number,
            json!({
                "total": detail.order.total,
                "items": detail.items.len(),
            }),
        )
        .await;

    Ok((StatusCode::CREATED, Json(detail)))
}
