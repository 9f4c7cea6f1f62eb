//! Shipping zones, carriers and rules.

use sqlx::{PgConnection, PgPool};

use andes_core::shipping::{ShippingCarrier, ShippingContext, ShippingRule, ShippingZone};
use andes_core::{CarrierId, Clp, ShippingRuleId, ZoneId};

use super::RepositoryError;

#[derive(Debug, sqlx::FromRow)]
struct ZoneRow {
    id: i32,
    name: String,
    region_codes: Vec<String>,
    is_active: bool,
}

impl From<ZoneRow> for ShippingZone {
    fn from(row: ZoneRow) -> Self {
        Self {
            id: ZoneId::new(row.id),
            name: row.name,
            region_codes: row.region_codes,
            is_active: row.is_active,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CarrierRow {
    id: i32,
    code: String,
    name: String,
    is_active: bool,
}

impl From<CarrierRow> for ShippingCarrier {
    fn from(row: CarrierRow) -> Self {
        Self {
            id: CarrierId::new(row.id),
            code: row.code,
            name: row.name,
            is_active: row.is_active,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RuleRow {
    id: i32,
    carrier_id: i32,
    zone_id: i32,
    name: String,
    priority: i32,
    min_weight_grams: i32,
    max_weight_grams: Option<i32>,
    min_amount: i64,
    max_amount: Option<i64>,
    base_cost: i64,
    cost_per_kg: i64,
    free_over_amount: Option<i64>,
    eta_days: i32,
    is_active: bool,
}

impl From<RuleRow> for ShippingRule {
    fn from(row: RuleRow) -> Self {
        Self {
            id: ShippingRuleId::new(row.id),
            carrier_id: CarrierId::new(row.carrier_id),
            zone_id: ZoneId::new(row.zone_id),
            name: row.name,
            priority: row.priority,
            min_weight_grams: row.min_weight_grams,
            max_weight_grams: row.max_weight_grams,
            min_amount: Clp::new(row.min_amount),
            max_amount: row.max_amount.map(Clp::new),
            base_cost: Clp::new(row.base_cost),
            cost_per_kg: Clp::new(row.cost_per_kg),
            free_over_amount: row.free_over_amount.map(Clp::new),
            eta_days: row.eta_days,
            is_active: row.is_active,
        }
    }
}

const ZONE_COLUMNS: &str = "id, name, region_codes, is_active";
const CARRIER_COLUMNS: &str = "id, code, name, is_active";
const RULE_COLUMNS: &str = "id, carrier_id, zone_id, name, priority, min_weight_grams, \
    max_weight_grams, min_amount, max_amount, base_cost, cost_per_kg, free_over_amount, \
    eta_days, is_active";

/// Repository for shipping configuration.
pub struct ShippingRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ShippingRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Every zone, carrier and rule, active or not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn context(&self) -> Result<ShippingContext, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        load_context(&mut conn).await
    }

    // -------------------------------------------------------------------------
    // Zones
    // -------------------------------------------------------------------------

    /// Create a zone.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name is taken.
    pub async fn create_zone(
        &self,
        name: &str,
        region_codes: &[String],
        is_active: bool,
    ) -> Result<ShippingZone, RepositoryError> {
        let row = sqlx::query_as::<_, ZoneRow>(&format!(
            "INSERT INTO shipping_zone (name, region_codes, is_active) VALUES ($1, $2, $3) RETURNING {ZONE_COLUMNS}"
        ))
        .bind(name)
        .bind(region_codes)
        .bind(is_active)
        .fetch_one(self.pool)
        .await?;
        Ok(row.into())
    }

    /// Replace a zone.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the zone does not exist.
    pub async fn update_zone(
        &self,
        id: ZoneId,
        name: &str,
        region_codes: &[String],
        is_active: bool,
    ) -> Result<ShippingZone, RepositoryError> {
        let row = sqlx::query_as::<_, ZoneRow>(&format!(
            r"
            UPDATE shipping_zone SET name = $2, region_codes = $3, is_active = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING {ZONE_COLUMNS}
            "
        ))
        .bind(id)
        .bind(name)
        .bind(region_codes)
        .bind(is_active)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;
        Ok(row.into())
    }

    /// Delete a zone and its rules.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the zone does not exist.
    pub async fn delete_zone(&self, id: ZoneId) -> Result<(), RepositoryError> {
        delete_by_id(self.pool, "shipping_zone", id.as_i32()).await
    }

    // -------------------------------------------------------------------------
    // Carriers
    // -------------------------------------------------------------------------

    /// Create a carrier.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the code is taken.
    pub async fn create_carrier(
        &self,
        code: &str,
        name: &str,
        is_active: bool,
    ) -> Result<ShippingCarrier, RepositoryError> {
        let row = sqlx::query_as::<_, CarrierRow>(&format!(
            "INSERT INTO shipping_carrier (code, name, is_active) VALUES ($1, $2, $3) RETURNING {CARRIER_COLUMNS}"
        ))
        .bind(code)
        .bind(name)
        .bind(is_active)
        .fetch_one(self.pool)
        .await?;
        Ok(row.into())
    }

    /// Replace a carrier.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the carrier does not exist.
    pub async fn update_carrier(
        &self,
        id: CarrierId,
        code: &str,
        name: &str,
        is_active: bool,
    ) -> Result<ShippingCarrier, RepositoryError> {
        let row = sqlx::query_as::<_, CarrierRow>(&format!(
            r"
            UPDATE shipping_carrier SET code = $2, name = $3, is_active = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING {CARRIER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(code)
        .bind(name)
        .bind(is_active)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;
        Ok(row.into())
    }

    /// Delete a carrier and its rules.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the carrier does not exist.
    pub async fn delete_carrier(&self, id: CarrierId) -> Result<(), RepositoryError> {
        delete_by_id(self.pool, "shipping_carrier", id.as_i32()).await
    }

    // -------------------------------------------------------------------------
    // Rules
    // -------------------------------------------------------------------------

    /// Create a rule. `rule.id` is ignored.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Invalid` for an unknown zone or carrier.
    pub async fn create_rule(&self, rule: &ShippingRule) -> Result<ShippingRule, RepositoryError> {
        let row = sqlx::query_as::<_, RuleRow>(&format!(
            r"
            INSERT INTO shipping_rule
                (carrier_id, zone_id, name, priority, min_weight_grams, max_weight_grams,
                 min_amount, max_amount, base_cost, cost_per_kg, free_over_amount, eta_days,
                 is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {RULE_COLUMNS}
            "
        ))
        .bind(rule.carrier_id)
        .bind(rule.zone_id)
        .bind(&rule.name)
        .bind(rule.priority)
        .bind(rule.min_weight_grams)
        .bind(rule.max_weight_grams)
        .bind(rule.min_amount)
        .bind(rule.max_amount)
        .bind(rule.base_cost)
        .bind(rule.cost_per_kg)
        .bind(rule.free_over_amount)
        .bind(rule.eta_days)
        .bind(rule.is_active)
        .fetch_one(self.pool)
        .await?;
        Ok(row.into())
    }

    /// Replace a rule. `rule.id` is ignored in favour of `id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the rule does not exist.
    pub async fn update_rule(
        &self,
        id: ShippingRuleId,
        rule: &ShippingRule,
    ) -> Result<ShippingRule, RepositoryError> {
        let row = sqlx::query_as::<_, RuleRow>(&format!(
            r"
            UPDATE shipping_rule SET
                carrier_id = $2, zone_id = $3, name = $4, priority = $5,
                min_weight_grams = $6, max_weight_grams = $7, min_amount = $8,
                max_amount = $9, base_cost = $10, cost_per_kg = $11,
                free_over_amount = $12, eta_days = $13, is_active = $14, updated_at = NOW()
            WHERE id = $1
            RETURNING {RULE_COLUMNS}
            "
        ))
        .bind(id)
        .bind(rule.carrier_id)
        .bind(rule.zone_id)
        .bind(&rule.name)
        .bind(rule.priority)
        .bind(rule.min_weight_grams)
        .bind(rule.max_weight_grams)
        .bind(rule.min_amount)
        .bind(rule.max_amount)
        .bind(rule.base_cost)
        .bind(rule.cost_per_kg)
        .bind(rule.free_over_amount)
        .bind(rule.eta_days)
        .bind(rule.is_active)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;
        Ok(row.into())
    }

    /// Delete a rule.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the rule does not exist.
    pub async fn delete_rule(&self, id: ShippingRuleId) -> Result<(), RepositoryError> {
        delete_by_id(self.pool, "shipping_rule", id.as_i32()).await
    }
}

/// `table` is always one of the fixed names above, never user input.
async fn delete_by_id(pool: &PgPool, table: &str, id: i32) -> Result<(), RepositoryError> {
    let result = sqlx::query(&format!("DELETE FROM {table} WHERE id = $1"))
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}

/// Load every zone, carrier and rule on an existing connection.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a query fails.
pub async fn load_context(conn: &mut PgConnection) -> Result<ShippingContext, RepositoryError> {
    let zones = sqlx::query_as::<_, ZoneRow>(&format!(
        "SELECT {ZONE_COLUMNS} FROM shipping_zone ORDER BY name"
    ))
    .fetch_all(&mut *conn)
    .await?;

    let carriers = sqlx::query_as::<_, CarrierRow>(&format!(
        "SELECT {CARRIER_COLUMNS} FROM shipping_carrier ORDER BY code"
    ))
    .fetch_all(&mut *conn)
    .await?;

    let rules = sqlx::query_as::<_, RuleRow>(&format!(
        "SELECT {RULE_COLUMNS} FROM shipping_rule ORDER BY priority DESC, id"
    ))
    .fetch_all(&mut *conn)
    .await?;

    Ok(ShippingContext {
        zones: zones.into_iter().map(Into::into).collect(),
        carriers: carriers.into_iter().map(Into::into).collect(),
        rules: rules.into_iter().map(Into::into).collect(),
    })
}
