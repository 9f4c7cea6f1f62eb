//! Database operations for the Andes Market `PostgreSQL` database.
//!
//! ## Tables
//!
//! - `app_user`, `user_password`, `address` - Accounts and shipping addresses
//! - `category`, `product` - Catalog (stock counters live on `product`)
//! - `cart`, `cart_item` - User and guest carts
//! - `shipping_zone`, `shipping_carrier`, `shipping_rule` - Shipping configuration
//! - `orders`, `order_item`, `order_item_snapshot`, `order_shipping_snapshot` - Orders
//! - `payment_transaction` - Payment gateway transactions
//! - `inventory_movement` - Stock ledger
//! - `audit_log` - Admin audit trail
//! - `tower_sessions.session` - Session storage
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p andes-cli -- migrate
//! ```
//!
//! Queries are built at runtime with `sqlx::query_as` and decoded through
//! private `FromRow` row structs.

pub mod addresses;
pub mod audit;
pub mod carts;
pub mod categories;
pub mod inventory;
pub mod orders;
pub mod payments;
pub mod products;
pub mod shipping;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use addresses::AddressRepository;
pub use audit::AuditRepository;
pub use carts::CartRepository;
pub use categories::CategoryRepository;
pub use inventory::InventoryRepository;
pub use orders::OrderRepository;
pub use payments::PaymentRepository;
pub use products::ProductRepository;
pub use shipping::ShippingRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate SKU or email) or a write that
    /// conflicts with existing rows.
    #[error("{0}")]
    Conflict(String),

    /// Check or foreign key constraint violation.
    #[error("{0}")]
    Invalid(String),
}

/// Classifies constraint violations so they surface as client errors.
impl From<sqlx::Error> for RepositoryError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = e {
            let subject = constraint_subject(db_err.constraint().unwrap_or("value"));
            if db_err.is_unique_violation() {
                return Self::Conflict(format!("{subject} already exists"));
            }
            if db_err.is_foreign_key_violation() {
                return Self::Invalid(format!("{subject} refers to a missing record"));
            }
            if db_err.is_check_violation() {
                return Self::Invalid(format!("{subject} is out of range"));
            }
        }
        Self::Database(e)
    }
}

/// `product_sku_key` -> `product sku`.
fn constraint_subject(constraint: &str) -> String {
    constraint
        .trim_end_matches("_key")
        .trim_end_matches("_fkey")
        .replace('_', " ")
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Escape `%`, `_` and `\` for use inside an `ILIKE` pattern.
#[must_use]
pub fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.trim().chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_subject() {
        assert_eq!(constraint_subject("product_sku_key"), "product sku");
        assert_eq!(constraint_subject("cart_item_product_id_fkey"), "cart item product id");
        assert_eq!(
            constraint_subject("product_price_positive"),
            "product price positive"
        );
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(" café "), "%café%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }
}
