//! Storefront product routes.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::Utc;
use tracing::instrument;

use crate::db::{CategoryRepository, ProductRepository, like_pattern, products::StorefrontQuery};
use crate::error::{AppError, Result};
use crate::models::{Page, PageParams, ProductFilter, ProductView};
use crate::state::AppState;

/// Active products, optionally filtered by category subtree, text and sale.
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
) -> Result<Json<Page<ProductView>>> {
    let category = match filter.category.as_deref() {
        Some(slug) => Some(category_id(&state, slug).await?),
        None => None,
    };
    list(&state, category, &filter).await.map(Json)
}

/// Products of one category and its descendants.
#[instrument(skip(state))]
pub async fn by_category(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(filter): Query<ProductFilter>,
) -> Result<Json<Page<ProductView>>> {
    let category = category_id(&state, &slug).await?;
    list(&state, Some(category), &filter).await.map(Json)
}

/// Product detail with available stock.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ProductView>> {
    let product = ProductRepository::new(state.pool())
        .get_active_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

    Ok(Json(ProductView::at(&product, Utc::now())))
}

async fn category_id(state: &AppState, slug: &str) -> Result<andes_core::CategoryId> {
    CategoryRepository::new(state.pool())
        .get_active_by_slug(slug)
        .await?
        .map(|c| c.id)
        .ok_or_else(|| AppError::NotFound("Category".to_string()))
}

async fn list(
    state: &AppState,
    category: Option<andes_core::CategoryId>,
    filter: &ProductFilter,
) -> Result<Page<ProductView>> {
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
    let query = StorefrontQuery {
        category,
        pattern: pattern.as_deref(),
        on_sale: filter.on_sale.unwrap_or(false),
    };

    let now = Utc::now();
    let (products, total) = ProductRepository::new(state.pool())
        .list_storefront(query, now, pagination)
        .await?;

    Ok(Page::new(products, pagination, total).map(|p| ProductView::at(&p, now)))
}
