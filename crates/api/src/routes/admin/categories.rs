//! Admin category management.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde_json::json;
use tracing::instrument;

use andes_core::CategoryId;
use andes_core::catalog::Category;

use super::record;
use crate::db::CategoryRepository;
use crate::error::Result;
use crate::middleware::{ClientIp, RequireAdmin, RequireStaff};
use crate::models::CategoryInput;
use crate::services::catalog::CatalogService;
use crate::state::AppState;

/// All categories, inactive included, as a flat list.
#[instrument(skip(state, _user))]
pub async fn index(
    State(state): State<AppState>,
    RequireStaff(_user): RequireStaff,
) -> Result<Json<Vec<Category>>> {
    let categories = CategoryRepository::new(state.pool()).list(true).await?;
    Ok(Json(categories))
}

#[instrument(skip(state, user, ip, input), fields(admin_id = %user.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    ip: ClientIp,
    Json(input): Json<CategoryInput>,
) -> Result<(StatusCode, Json<Category>)> {
    let category = CatalogService::new(state.pool())
        .create_category(&input)
        .await?;
    state.cache().invalidate_categories().await;

    record(
        &state,
        &user,
        &ip,
        "category.create",
        "category",
        category.id,
        json!({ "slug": category.slug, "parent_id": category.parent_id }),
    )
    .await;

    Ok((StatusCode::CREATED, Json(category)))
}

/// Update a category. Changing `parent_id` moves the whole subtree.
#[instrument(skip(state, user, ip, input), fields(admin_id = %user.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    ip: ClientIp,
    Path(id): Path<CategoryId>,
    Json(input): Json<CategoryInput>,
) -> Result<Json<Category>> {
    let category = CatalogService::new(state.pool())
        .update_category(id, &input)
        .await?;
    state.cache().invalidate_categories().await;

    record(
        &state,
        &user,
        &ip,
        "category.update",
        "category",
        category.id,
        json!({ "after": category }),
    )
    .await;

    Ok(Json(category))
}

/// Delete a category with no children and no products.
#[instrument(skip(state, user, ip), fields(admin_id = %user.id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    ip: ClientIp,
    Path(id): Path<CategoryId>,
) -> Result<StatusCode> {
    let category = CatalogService::new(state.pool())
        .delete_category(id)
        .await?;
    state.cache().invalidate_categories().await;

    record(
        &state,
        &user,
        &ip,
        "category.delete",
        "category",
        category.id,
        json!({ "slug": category.slug }),
    )
    .await;

    Ok(StatusCode::NO_CONTENT)
}
