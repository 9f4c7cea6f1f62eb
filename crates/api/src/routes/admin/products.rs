//! Admin product management.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use andes_core::ProductId;

use super::record;
use crate::db::{ProductRepository, like_pattern};
use crate::error::{AppError, Result};
use crate::middleware::{ClientIp, RequireAdmin, RequireStaff};
use crate::models::{Page, PageParams, Product, ProductInput};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct AdminProductFilter {
    pub q: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Every product, including inactive ones.
#[instrument(skip(state, _user))]
pub async fn index(
    State(state): State<AppState>,
    RequireStaff(_user): RequireStaff,
    Query(filter): Query<AdminProductFilter>,
) -> Result<Json<Page<Product>>> {
    let pagination = PageParams {
        page: filter.page,
        per_page: filter.per_page,
    }
    .resolve()?;
    let pattern = filter
        .q
        .as_deref()
        .filter(|q| !q.trim().is_empty())
        .map(like_pattern);

    let (products, total) = ProductRepository::new(state.pool())
        .list_admin(pattern.as_deref(), pagination)
        .await?;
    Ok(Json(Page::new(products, pagination, total)))
}

#[instrument(skip(state, _user))]
pub async fn show(
    State(state): State<AppState>,
    RequireStaff(_user): RequireStaff,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>> {
    ProductRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Product".to_string()))
}

/// Create a product. Stock starts at zero; use the stock endpoint to restock.
#[instrument(skip(state, user, ip, input), fields(admin_id = %user.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    ip: ClientIp,
    Json(input): Json<ProductInput>,
) -> Result<(StatusCode, Json<Product>)> {
    let draft = input.validate()?;
    let product = ProductRepository::new(state.pool()).create(&draft).await?;

    record(
        &state,
        &user,
        &ip,
        "product.create",
        "product",
        product.id,
        json!({ "sku": product.sku, "price": product.pricing.price }),
    )
    .await;

    Ok((StatusCode::CREATED, Json(product)))
}

#[instrument(skip(state, user, ip, input), fields(admin_id = %user.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    ip: ClientIp,
    Path(id): Path<ProductId>,
    Json(input): Json<ProductInput>,
) -> Result<Json<Product>> {
    let draft = input.validate()?;
    let repo = ProductRepository::new(state.pool());
    let before = repo
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;
    let product = repo.update(id, &draft).await?;

    record(
        &state,
        &user,
        &ip,
        "product.update",
        "product",
        product.id,
        json!({ "before": before, "after": product }),
    )
    .await;

    Ok(Json(product))
}

/// Hide a product. Order history keeps referring to it.
#[instrument(skip(state, user, ip), fields(admin_id = %user.id))]
pub async fn deactivate(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    ip: ClientIp,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>> {
    let product = ProductRepository::new(state.pool()).deactivate(id).await?;

    record(
        &state,
        &user,
        &ip,
        "product.deactivate",
        "product",
        product.id,
        json!({ "is_active": false }),
    )
    .await;

    Ok(Json(product))
}
