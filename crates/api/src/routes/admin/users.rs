//! Admin user management.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use andes_core::{UserId, UserRole};

use super::record;
use crate::db::UserRepository;
use crate::error::{AppError, Result};
use crate::middleware::{ClientIp, RequireAdmin, RequireStaff};
use crate::models::{Page, PageParams, User};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct UserFilter {
    pub q: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RoleChange {
    pub role: UserRole,
}

#[instrument(skip(state, _user))]
pub async fn index(
    State(state): State<AppState>,
    RequireStaff(_user): RequireStaff,
    Query(filter): Query<UserFilter>,
) -> Result<Json<Page<User>>> {
    let pagination = PageParams {
        page: filter.page,
        per_page: filter.per_page,
    }
    .resolve()?;
    let search = filter.q.as_deref().map(str::trim).filter(|q| !q.is_empty());
    let (users, total) = UserRepository::new(state.pool())
        .list(search, pagination)
        .await?;
    Ok(Json(Page::new(users, pagination, total)))
}

/// Change a user's role. Admins cannot demote themselves.
#[instrument(skip(state, user, ip), fields(admin_id = %user.id))]
pub async fn set_role(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    ip: ClientIp,
    Path(id): Path<UserId>,
    Json(body): Json<RoleChange>,
) -> Result<Json<User>> {
    if id == user.id && body.role != UserRole::Admin {
        return Err(AppError::Conflict(
            "admins cannot remove their own admin role".to_string(),
        ));
    }

    let repo = UserRepository::new(state.pool());
    let previous = repo
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User".to_string()))?
        .role;
    let updated = repo.set_role(id, body.role).await?;

    record(
        &state,
        &user,
        &ip,
        "user.role",
        "user",
        updated.id,
        json!({ "from": previous, "to": updated.role }),
    )
    .await;

    Ok(Json(updated))
}
