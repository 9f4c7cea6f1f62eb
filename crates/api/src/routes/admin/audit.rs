//! Audit log browser.

use axum::{
    Json,
    extract::{Query, State},
};
use tracing::instrument;

use andes_core::UserId;

use crate::db::AuditRepository;
use crate::db::audit::AuditQuery;
use crate::error::Result;
use crate::middleware::RequireStaff;
use crate::models::{AuditEntry, AuditFilter, Page, PageParams};
use crate::state::AppState;

#[instrument(skip(state, _user))]
pub async fn index(
    State(state): State<AppState>,
    RequireStaff(_user): RequireStaff,
    Query(filter): Query<AuditFilter>,
) -> Result<Json<Page<AuditEntry>>> {
    let pagination = PageParams {
        page: filter.page,
        per_page: filter.per_page,
    }
    .resolve()?;
    let query = AuditQuery {
        entity_type: filter.entity_type.as_deref().filter(|s| !s.is_empty()),
        entity_id: filter.entity_id.as_deref().filter(|s| !s.is_empty()),
        actor_id: filter.actor.map(UserId::new),
    };
    let (entries, total) = AuditRepository::new(state.pool())
        .list(&query, pagination)
        .await?;
    Ok(Json(Page::new(entries, pagination, total)))
}
