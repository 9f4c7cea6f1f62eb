//! Order repository.
//!
//! Reads for the storefront and admin panel go through [`OrderRepository`].
//! Checkout, cancellation, payment confirmation and reservation expiry use
//! the free functions below inside their own transactions.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgConnection, PgPool};

use andes_core::checkout::{OrderTotals, PlannedLine, order_number};
use andes_core::{
    CarrierId, Clp, OrderId, OrderItemId, OrderStatus, ProductId, ShippingRuleId, UserId,
};

use super::RepositoryError;
use crate::models::{Order, OrderDetail, OrderItem, Pagination, ShippingSnapshot};

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i32,
    number: String,
    user_id: Option<i32>,
    status: OrderStatus,
    subtotal: i64,
    shipping_cost: i64,
    total: i64,
    notes: Option<String>,
    reserved_until: Option<DateTime<Utc>>,
    paid_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Self {
            id: OrderId::new(row.id),
            number: row.number,
            user_id: row.user_id.map(UserId::new),
            status: row.status,
            subtotal: Clp::new(row.subtotal),
            shipping_cost: Clp::new(row.shipping_cost),
            total: Clp::new(row.total),
            notes: row.notes,
            reserved_until: row.reserved_until,
            paid_at: row.paid_at,
            cancelled_at: row.cancelled_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: i32,
    product_id: Option<i32>,
    sku: String,
    name: String,
    quantity: i32,
    list_price: i64,
    unit_price: i64,
    line_total: i64,
    weight_grams: i32,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: OrderItemId::new(row.id),
            product_id: row.product_id.map(ProductId::new),
            sku: row.sku,
            name: row.name,
            quantity: row.quantity,
            list_price: Clp::new(row.list_price),
            unit_price: Clp::new(row.unit_price),
            line_total: Clp::new(row.line_total),
            weight_grams: row.weight_grams,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ShippingSnapshotRow {
    customer_name: String,
    customer_email: String,
    customer_phone: String,
    customer_rut: Option<String>,
    recipient: String,
    phone: String,
    street: String,
    number: String,
    apartment: Option<String>,
    commune: String,
    city: String,
    region_code: String,
    carrier_id: i32,
    carrier_code: String,
    carrier_name: String,
    rule_id: i32,
    rule_name: String,
    zone_name: String,
    shipping_cost: i64,
    eta_days: i32,
}

impl From<ShippingSnapshotRow> for ShippingSnapshot {
    fn from(row: ShippingSnapshotRow) -> Self {
        Self {
            customer_name: row.customer_name,
            customer_email: row.customer_email,
            customer_phone: row.customer_phone,
            customer_rut: row.customer_rut,
            recipient: row.recipient,
            phone: row.phone,
            street: row.street,
            number: row.number,
            apartment: row.apartment,
            commune: row.commune,
            city: row.city,
            region_code: row.region_code,
            carrier_id: CarrierId::new(row.carrier_id),
            carrier_code: row.carrier_code,
            carrier_name: row.carrier_name,
            rule_id: ShippingRuleId::new(row.rule_id),
            rule_name: row.rule_name,
            zone_name: row.zone_name,
            shipping_cost: Clp::new(row.shipping_cost),
            eta_days: row.eta_days,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StockLineRow {
    product_id: i32,
    quantity: i32,
}

const ORDER_COLUMNS: &str = "id, number, user_id, status, subtotal, shipping_cost, total, notes, \
    reserved_until, paid_at, cancelled_at, created_at, updated_at";

/// Repository for order reads.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// A user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(
        &self,
        user_id: UserId,
        pagination: Pagination,
    ) -> Result<(Vec<Order>, i64), RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "
        ))
        .bind(user_id)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(self.pool)
            .await?;

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    /// All orders, optionally filtered by status, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_admin(
        &self,
        status: Option<OrderStatus>,
        pagination: Pagination,
    ) -> Result<(Vec<Order>, i64), RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE $1::order_status IS NULL OR status = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "
        ))
        .bind(status)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM orders WHERE $1::order_status IS NULL OR status = $1",
        )
        .bind(status)
        .fetch_one(self.pool)
        .await?;

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    /// Get an order by its public number.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_number(&self, number: &str) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE number = $1"
        ))
        .bind(number)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Get an order by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Load lines and shipping snapshot for an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn detail(&self, order: Order) -> Result<OrderDetail, RepositoryError> {
        let items = sqlx::query_as::<_, OrderItemRow>(
            r"
            SELECT oi.id, oi.product_id, s.sku, s.name, oi.quantity, s.list_price,
                   oi.unit_price, oi.line_total, s.weight_grams
            FROM order_item oi
            JOIN order_item_snapshot s ON s.order_item_id = oi.id
            WHERE oi.order_id = $1
            ORDER BY oi.id
            ",
        )
        .bind(order.id)
        .fetch_all(self.pool)
        .await?;

        let shipping = sqlx::query_as::<_, ShippingSnapshotRow>(
            r"
            SELECT customer_name, customer_email, customer_phone, customer_rut, recipient,
                   phone, street, number, apartment, commune, city, region_code, carrier_id,
                   carrier_code, carrier_name, rule_id, rule_name, zone_name, shipping_cost,
                   eta_days
            FROM order_shipping_snapshot
            WHERE order_id = $1
            ",
        )
        .bind(order.id)
        .fetch_optional(self.pool)
        .await?;

        Ok(OrderDetail {
            order,
            items: items.into_iter().map(Into::into).collect(),
            shipping: shipping.map(Into::into),
        })
    }
}

// =============================================================================
// Transactional helpers
// =============================================================================

/// Allocate the next order number for `date`.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the sequence cannot be read.
pub async fn next_number(conn: &mut PgConnection, date: NaiveDate) -> Result<String, RepositoryError> {
    let seq: i64 = sqlx::query_scalar("SELECT nextval('order_number_seq')")
        .fetch_one(&mut *conn)
        .await?;
    Ok(order_number(date, seq))
}

/// Header fields for [`insert`].
#[derive(Debug, Clone)]
pub struct NewOrder<'a> {
    pub number: &'a str,
    pub user_id: UserId,
    pub totals: OrderTotals,
    pub notes: Option<&'a str>,
    pub reserved_until: DateTime<Utc>,
}

/// Insert a `pending_payment` order header.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` on a duplicate number.
pub async fn insert(conn: &mut PgConnection, order: &NewOrder<'_>) -> Result<Order, RepositoryError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        r"
        INSERT INTO orders (number, user_id, status, subtotal, shipping_cost, total, notes, reserved_until)
        VALUES ($1, $2, 'pending_payment', $3, $4, $5, $6, $7)
        RETURNING {ORDER_COLUMNS}
        "
    ))
    .bind(order.number)
    .bind(order.user_id)
    .bind(order.totals.subtotal)
    .bind(order.totals.shipping)
    .bind(order.totals.total)
    .bind(order.notes)
    .bind(order.reserved_until)
    .fetch_one(&mut *conn)
    .await?;

    Ok(row.into())
}

/// Insert an order line and its snapshot.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a query fails.
pub async fn insert_item(
    conn: &mut PgConnection,
    order_id: OrderId,
    line: &PlannedLine,
) -> Result<OrderItemId, RepositoryError> {
    let id: i32 = sqlx::query_scalar(
        r"
        INSERT INTO order_item (order_id, product_id, quantity, unit_price, line_total)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        ",
    )
    .bind(order_id)
    .bind(line.product_id)
    .bind(line.quantity)
    .bind(line.unit_price)
    .bind(line.line_total)
    .fetch_one(&mut *conn)
    .await?;

    sqlx::query(
        r"
        INSERT INTO order_item_snapshot (order_item_id, sku, name, list_price, unit_price, weight_grams)
        VALUES ($1, $2, $3, $4, $5, $6)
        ",
    )
    .bind(id)
    .bind(&line.sku)
    .bind(&line.name)
    .bind(line.list_price)
    .bind(line.unit_price)
    .bind(line.weight_grams)
    .execute(&mut *conn)
    .await?;

    Ok(OrderItemId::new(id))
}

/// Insert the order's shipping snapshot.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn insert_shipping_snapshot(
    conn: &mut PgConnection,
    order_id: OrderId,
    snapshot: &ShippingSnapshot,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        INSERT INTO order_shipping_snapshot
            (order_id, customer_name, customer_email, customer_phone, customer_rut,
             recipient, phone, street, number, apartment, commune, city, region_code,
             carrier_id, carrier_code, carrier_name, rule_id, rule_name, zone_name,
             shipping_cost, eta_days)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                $17, $18, $19, $20, $21)
        ",
    )
    .bind(order_id)
    .bind(&snapshot.customer_name)
    .bind(&snapshot.customer_email)
    .bind(&snapshot.customer_phone)
    .bind(snapshot.customer_rut.as_deref())
    .bind(&snapshot.recipient)
    .bind(&snapshot.phone)
    .bind(&snapshot.street)
    .bind(&snapshot.number)
    .bind(snapshot.apartment.as_deref())
    .bind(&snapshot.commune)
    .bind(&snapshot.city)
    .bind(&snapshot.region_code)
    .bind(snapshot.carrier_id)
    .bind(&snapshot.carrier_code)
    .bind(&snapshot.carrier_name)
    .bind(snapshot.rule_id)
    .bind(&snapshot.rule_name)
    .bind(&snapshot.zone_name)
    .bind(snapshot.shipping_cost)
    .bind(snapshot.eta_days)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Lock an order by number.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_by_number(
    conn: &mut PgConnection,
    number: &str,
) -> Result<Option<Order>, RepositoryError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE number = $1 FOR UPDATE"
    ))
    .bind(number)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row.map(Into::into))
}

/// Lock an order by id.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_by_id(conn: &mut PgConnection, id: OrderId) -> Result<Option<Order>, RepositoryError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row.map(Into::into))
}

/// Lock up to `limit` pending orders whose reservation ran out, skipping
/// rows another worker already holds.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_expired(
    conn: &mut PgConnection,
    now: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<Order>, RepositoryError> {
    let rows = sqlx::query_as::<_, OrderRow>(&format!(
        r"
        SELECT {ORDER_COLUMNS} FROM orders
        WHERE status = 'pending_payment' AND reserved_until < $1
        ORDER BY reserved_until
        LIMIT $2
        FOR UPDATE SKIP LOCKED
        "
    ))
    .bind(now)
    .bind(limit)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

/// Product quantities on an order, merged per product and ordered by id.
/// Lines whose product was deleted are skipped.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn stock_lines(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<Vec<(ProductId, i32)>, RepositoryError> {
    let rows = sqlx::query_as::<_, StockLineRow>(
        r"
        SELECT product_id, SUM(quantity)::INT AS quantity
        FROM order_item
        WHERE order_id = $1 AND product_id IS NOT NULL
        GROUP BY product_id
        ORDER BY product_id
        ",
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| (ProductId::new(r.product_id), r.quantity))
        .collect())
}

/// Move an order to `status`, stamping `paid_at` / `cancelled_at` and
/// clearing the reservation deadline once the order leaves `pending_payment`.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the order does not exist.
pub async fn set_status(
    conn: &mut PgConnection,
    id: OrderId,
    status: OrderStatus,
) -> Result<Order, RepositoryError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        r"
        UPDATE orders SET
            status = $2,
            reserved_until = CASE WHEN $2 = 'pending_payment'::order_status THEN reserved_until END,
            paid_at = CASE WHEN $2 = 'paid'::order_status THEN NOW() ELSE paid_at END,
            cancelled_at = CASE WHEN $2 = 'cancelled'::order_status THEN NOW() ELSE cancelled_at END,
            updated_at = NOW()
        WHERE id = $1
        RETURNING {ORDER_COLUMNS}
        "
    ))
    .bind(id)
    .bind(status)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(RepositoryError::NotFound)?;
    Ok(row.into())
}
