//! Admin stock adjustments and the movement ledger.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde_json::json;
use tracing::instrument;

use andes_core::ProductId;

use super::record;
use crate::db::InventoryRepository;
use crate::error::Result;
use crate::middleware::{ClientIp, RequireStaff};
use crate::models::{InventoryMovement, Page, PageParams, Product, StockAdjustment};
use crate::services::inventory::adjust_stock;
use crate::state::AppState;

/// Restock or correct on-hand stock. Writes a ledger entry.
#[instrument(skip(state, user, ip), fields(staff_id = %user.id))]
pub async fn adjust(
    State(state): State<AppState>,
    RequireStaff(user): RequireStaff,
    ip: ClientIp,
    Path(id): Path<ProductId>,
    Json(adjustment): Json<StockAdjustment>,
) -> Result<Json<Product>> {
    let product = adjust_stock(state.pool(), id, &adjustment, Some(user.id)).await?;

    record(
        &state,
        &user,
        &ip,
        "product.stock",
        "product",
        product.id,
        json!({
            "kind": adjustment.resolved_kind(),
            "delta": adjustment.delta,
            "reason": adjustment.reason(),
            "stock": product.stock,
        }),
    )
    .await;

    Ok(Json(product))
}

/// Ledger entries for a product, newest first.
#[instrument(skip(state, _user))]
pub async fn movements(
    State(state): State<AppState>,
    RequireStaff(_user): RequireStaff,
    Path(id): Path<ProductId>,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<InventoryMovement>>> {
    let pagination = params.resolve()?;
    let (movements, total) = InventoryRepository::new(state.pool())
        .list_for_product(id, pagination)
        .await?;
    Ok(Json(Page::new(movements, pagination, total)))
}
