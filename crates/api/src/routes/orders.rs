//! Customer order routes.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde_json::json;
use tracing::instrument;

use andes_core::OrderStatus;

use crate::db::OrderRepository;
use crate::error::{AppError, Result};
use crate::middleware::{ClientIp, RequireAuth};
use crate::models::{Order, OrderDetail, Page, PageParams};
use crate::services::audit::{AuditActor, AuditService};
use crate::services::orders::OrderService;
use crate::state::AppState;

/// The user's orders, newest first.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<Order>>> {
    let pagination = params.resolve()?;
    let (orders, total) = OrderRepository::new(state.pool())
        .list_for_user(user.id, pagination)
        .await?;
    Ok(Json(Page::new(orders, pagination, total)))
}

/// One of the user's orders with its items and shipping snapshot.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(number): Path<String>,
) -> Result<Json<OrderDetail>> {
    let repo = OrderRepository::new(state.pool());
    let order = repo
        .get_by_number(&number)
        .await?
        .filter(|o| o.user_id == Some(user.id))
        .ok_or_else(|| AppError::NotFound("Order".to_string()))?;
    Ok(Json(repo.detail(order).await?))
}

/// Cancel an order that has not been paid, releasing its stock.
#[instrument(skip(state, user, ip), fields(user_id = %user.id))]
pub async fn cancel(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ip: ClientIp,
    Path(number): Path<String>,
) -> Result<Json<Order>> {
    let order = OrderService::new(state.pool())
        .cancel_by_customer(user.id, &number)
        .await?;

    AuditService::new(state.pool())
        .record(
            &AuditActor::new(user.id, ip.0),
            "order.cancel",
            "order",
            &order.number,
            json!({ "from": OrderStatus::PendingPayment, "to": order.status }),
        )
        .await;

    Ok(Json(order))
}
