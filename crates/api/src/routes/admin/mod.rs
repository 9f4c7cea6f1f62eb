//! Admin JSON API.
//!
//! Staff may read everything, move orders through their lifecycle and adjust
//! stock. Catalog, shipping and user-role writes need the admin role. Every
//! write records an audit entry.

pub mod audit;
pub mod categories;
pub mod inventory;
pub mod orders;
pub mod products;
pub mod shipping;
pub mod users;

use std::fmt::Display;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::middleware::ClientIp;
use crate::models::CurrentUser;
use crate::services::audit::{AuditActor, AuditService};
use crate::state::AppState;

/// Record an admin write. Never fails the request.
async fn record(
    state: &AppState,
    user: &CurrentUser,
    ip: &ClientIp,
    action: &str,
    entity_type: &str,
    entity_id: impl Display,
    changes: serde_json::Value,
) {
    AuditService::new(state.pool())
        .record(
            &AuditActor::new(user.id, ip.0),
            action,
            entity_type,
            entity_id,
            changes,
        )
        .await;
}

/// Create the admin routes router, nested under `/api/admin`.
pub fn routes() -> Router<AppState> {
    Router::new()
        // Products
        .route("/products", get(products::index).post(products::create))
        .route(
            "/products/{id}",
            get(products::show)
                .put(products::update)
                .delete(products::deactivate),
        )
        .route("/products/{id}/stock", post(inventory::adjust))
        .route("/products/{id}/movements", get(inventory::movements))
        // Categories
        .route(
            "/categories",
            get(categories::index).post(categories::create),
        )
        .route(
            "/categories/{id}",
            put(categories::update).delete(categories::delete),
        )
        // Shipping
        .route("/shipping", get(shipping::index))
        .route("/shipping/zones", post(shipping::create_zone))
        .route(
            "/shipping/zones/{id}",
            put(shipping::update_zone).delete(shipping::delete_zone),
        )
        .route("/shipping/carriers", post(shipping::create_carrier))
        .route(
            "/shipping/carriers/{id}",
            put(shipping::update_carrier).delete(shipping::delete_carrier),
        )
        .route("/shipping/rules", post(shipping::create_rule))
        .route(
            "/shipping/rules/{id}",
            put(shipping::update_rule).delete(shipping::delete_rule),
        )
        // Orders
        .route("/orders", get(orders::index))
        .route("/orders/{number}", get(orders::show))
        .route("/orders/{number}/status", post(orders::set_status))
        // Users
        .route("/users", get(users::index))
        .route("/users/{id}/role", put(users::set_role))
        // Audit log
        .route("/audit", get(audit::index))
}
