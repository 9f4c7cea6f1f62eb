//! Category tree route.

use std::sync::Arc;

use axum::{Json, extract::State};
use tracing::instrument;

use andes_core::catalog::CategoryNode;

use crate::error::Result;
use crate::state::AppState;

/// Nested tree of active categories.
#[instrument(skip(state))]
pub async fn tree(State(state): State<AppState>) -> Result<Json<Arc<Vec<CategoryNode>>>> {
    let tree = state.cache().category_tree(state.pool()).await?;
    Ok(Json(tree))
}
