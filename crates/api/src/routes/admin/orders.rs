//! Admin order handling.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::instrument;

use andes_core::OrderStatus;

use super::record;
use crate::db::{OrderRepository, PaymentRepository};
use crate::error::{AppError, Result};
use crate::middleware::{ClientIp, RequireStaff};
use crate::models::{Order, OrderDetail, OrderFilter, Page, PageParams, PaymentTransaction};
use crate::services::orders::OrderService;
use crate::state::AppState;

/// `POST /api/admin/orders/{number}/status` body.
#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: OrderStatus,
}

/// Order detail plus its payment attempts.
#[derive(Debug, Serialize)]
pub struct AdminOrderDetail {
    #[serde(flatten)]
    pub detail: OrderDetail,
    pub payments: Vec<PaymentTransaction>,
}

#[instrument(skip(state, _user))]
pub async fn index(
    State(state): State<AppState>,
    RequireStaff(_user): RequireStaff,
    Query(filter): Query<OrderFilter>,
) -> Result<Json<Page<Order>>> {
    let pagination = PageParams {
        page: filter.page,
        per_page: filter.per_page,
    }
    .resolve()?;
    let (orders, total) = OrderRepository::new(state.pool())
        .list_admin(filter.status, pagination)
        .await?;
    Ok(Json(Page::new(orders, pagination, total)))
}

#[instrument(skip(state, _user))]
pub async fn show(
    State(state): State<AppState>,
    RequireStaff(_user): RequireStaff,
    Path(number): Path<String>,
) -> Result<Json<AdminOrderDetail>> {
    let repo = OrderRepository::new(state.pool());
    let order = repo
        .get_by_number(&number)
        .await?
        .ok_or_else(|| AppError::NotFound("Order".to_string()))?;
    let payments = PaymentRepository::new(state.pool())
        .list_for_order(order.id)
        .await?;
    let detail = repo.detail(order).await?;
    Ok(Json(AdminOrderDetail { detail, payments }))
}

/// Move an order to a new status, applying its stock side effects.
#[instrument(skip(state, user, ip), fields(staff_id = %user.id))]
pub async fn set_status(
    State(state): State<AppState>,
    RequireStaff(user): RequireStaff,
    ip: ClientIp,
    Path(number): Path<String>,
    Json(body): Json<StatusChange>,
) -> Result<Json<Order>> {
    let (order, previous) = OrderService::new(state.pool())
        .transition(&number, body.status)
        .await?;
    tracing::info!(
        order_number = %order.number,
        from = %previous,
        to = %order.status,
        "Order status changed"
    );

    record(
        &state,
        &user,
        &ip,
        "order.status",
        "order",
        &order.number,
        json!({ "from": previous, "to": order.status }),
    )
    .await;

    Ok(Json(order))
}
