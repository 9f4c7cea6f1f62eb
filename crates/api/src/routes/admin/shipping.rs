//! Admin shipping configuration: zones, carriers and rules.
//!
//! Every write drops the cached shipping context used for quotes.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde_json::json;
use tracing::instrument;

use andes_core::shipping::{ShippingCarrier, ShippingContext, ShippingRule, ShippingZone};
use andes_core::{CarrierId, ShippingRuleId, ZoneId};

use super::record;
use crate::db::ShippingRepository;
use crate::error::Result;
use crate::middleware::{ClientIp, RequireAdmin, RequireStaff};
use crate::models::{CarrierInput, CurrentUser, RuleInput, ZoneInput};
use crate::state::AppState;

/// Zones, carriers and rules, inactive ones included.
#[instrument(skip(state, _user))]
pub async fn index(
    State(state): State<AppState>,
    RequireStaff(_user): RequireStaff,
) -> Result<Json<ShippingContext>> {
    let ctx = ShippingRepository::new(state.pool()).context().await?;
    Ok(Json(ctx))
}

async fn changed(
    state: &AppState,
    user: &CurrentUser,
    ip: &ClientIp,
    action: &str,
    entity_type: &str,
    entity_id: i32,
    changes: serde_json::Value,
) {
    state.cache().invalidate_shipping().await;
    record(state, user, ip, action, entity_type, entity_id, changes).await;
}

// =============================================================================
// Zones
// =============================================================================

#[instrument(skip(state, user, ip, input), fields(admin_id = %user.id))]
pub async fn create_zone(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    ip: ClientIp,
    Json(input): Json<ZoneInput>,
) -> Result<(StatusCode, Json<ShippingZone>)> {
    let input = input.normalized()?;
    let zone = ShippingRepository::new(state.pool())
        .create_zone(&input.name, &input.region_codes, input.is_active)
        .await?;
    changed(
        &state,
        &user,
        &ip,
        "shipping_zone.create",
        "shipping_zone",
        zone.id.as_i32(),
        json!(zone),
    )
    .await;
    Ok((StatusCode::CREATED, Json(zone)))
}

#[instrument(skip(state, user, ip, input), fields(admin_id = %user.id))]
pub async fn update_zone(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    ip: ClientIp,
    Path(id): Path<ZoneId>,
    Json(input): Json<ZoneInput>,
) -> Result<Json<ShippingZone>> {
    let input = input.normalized()?;
    let zone = ShippingRepository::new(state.pool())
        .update_zone(id, &input.name, &input.region_codes, input.is_active)
        .await?;
    changed(
        &state,
        &user,
        &ip,
        "shipping_zone.update",
        "shipping_zone",
        zone.id.as_i32(),
        json!(zone),
    )
    .await;
    Ok(Json(zone))
}

/// Delete a zone together with its rules.
#[instrument(skip(state, user, ip), fields(admin_id = %user.id))]
pub async fn delete_zone(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    ip: ClientIp,
    Path(id): Path<ZoneId>,
) -> Result<StatusCode> {
    ShippingRepository::new(state.pool()).delete_zone(id).await?;
    changed(
        &state,
        &user,
        &ip,
        "shipping_zone.delete",
        "shipping_zone",
        id.as_i32(),
        json!({}),
    )
    .await;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Carriers
// =============================================================================

#[instrument(skip(state, user, ip, input), fields(admin_id = %user.id))]
pub async fn create_carrier(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    ip: ClientIp,
    Json(input): Json<CarrierInput>,
) -> Result<(StatusCode, Json<ShippingCarrier>)> {
    let input = input.normalized()?;
    let carrier = ShippingRepository::new(state.pool())
        .create_carrier(&input.code, &input.name, input.is_active)
        .await?;
    changed(
        &state,
        &user,
        &ip,
        "shipping_carrier.create",
        "shipping_carrier",
        carrier.id.as_i32(),
        json!(carrier),
    )
    .await;
    Ok((StatusCode::CREATED, Json(carrier)))
}

#[instrument(skip(state, user, ip, input), fields(admin_id = %user.id))]
pub async fn update_carrier(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    ip: ClientIp,
    Path(id): Path<CarrierId>,
    Json(input): Json<CarrierInput>,
) -> Result<Json<ShippingCarrier>> {
    let input = input.normalized()?;
    let carrier = ShippingRepository::new(state.pool())
        .update_carrier(id, &input.code, &input.name, input.is_active)
        .await?;
    changed(
        &state,
        &user,
        &ip,
        "shipping_carrier.update",
        "shipping_carrier",
        carrier.id.as_i32(),
        json!(carrier),
    )
    .await;
    Ok(Json(carrier))
}

#[instrument(skip(state, user, ip), fields(admin_id = %user.id))]
pub async fn delete_carrier(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    ip: ClientIp,
    Path(id): Path<CarrierId>,
) -> Result<StatusCode> {
    ShippingRepository::new(state.pool()).delete_carrier(id).await?;
    changed(
        &state,
        &user,
        &ip,
        "shipping_carrier.delete",
        "shipping_carrier",
        id.as_i32(),
        json!({}),
    )
    .await;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Rules
// =============================================================================

#[instrument(skip(state, user, ip, input), fields(admin_id = %user.id))]
pub async fn create_rule(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    ip: ClientIp,
    Json(input): Json<RuleInput>,
) -> Result<(StatusCode, Json<ShippingRule>)> {
    let rule = input.into_rule(ShippingRuleId::new(0))?;
    let rule = ShippingRepository::new(state.pool()).create_rule(&rule).await?;
    changed(
        &state,
        &user,
        &ip,
        "shipping_rule.create",
        "shipping_rule",
        rule.id.as_i32(),
        json!(rule),
    )
    .await;
    Ok((StatusCode::CREATED, Json(rule)))
}

#[instrument(skip(state, user, ip, input), fields(admin_id = %user.id))]
pub async fn update_rule(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    ip: ClientIp,
    Path(id): Path<ShippingRuleId>,
    Json(input): Json<RuleInput>,
) -> Result<Json<ShippingRule>> {
    let rule = input.into_rule(id)?;
    let rule = ShippingRepository::new(state.pool())
        .update_rule(id, &rule)
        .await?;
    changed(
        &state,
        &user,
        &ip,
        "shipping_rule.update",
        "shipping_rule",
        rule.id.as_i32(),
        json!(rule),
    )
    .await;
    Ok(Json(rule))
}

#[instrument(skip(state, user, ip), fields(admin_id = %user.id))]
pub async fn delete_rule(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    ip: ClientIp,
    Path(id): Path<ShippingRuleId>,
) -> Result<StatusCode> {
    ShippingRepository::new(state.pool()).delete_rule(id).await?;
    changed(
        &state,
        &user,
        &ip,
        "shipping_rule.delete",
        "shipping_rule",
        id.as_i32(),
        json!({}),
    )
    .await;
    Ok(StatusCode::NO_CONTENT)
}
