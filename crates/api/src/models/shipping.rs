//! Admin inputs for shipping configuration.

use serde::Deserialize;

use andes_core::shipping::{ShippingRule, validate_rule};
use andes_core::{CarrierId, Clp, ShippingRuleId, ZoneId};

use crate::error::AppError;

#[derive(Debug, Clone, Deserialize)]
pub struct ZoneInput {
    pub name: String,
    pub region_codes: Vec<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl ZoneInput {
    /// Trim the name and uppercase, trim and dedupe region codes.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for a blank name or no region codes.
    pub fn normalized(self) -> Result<Self, AppError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::BadRequest("zone name is required".to_string()));
        }
        let mut region_codes: Vec<String> = self
            .region_codes
            .iter()
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty())
            .collect();
        region_codes.sort();
        region_codes.dedup();
        if region_codes.is_empty() {
            return Err(AppError::BadRequest(
                "zone needs at least one region code".to_string(),
            ));
        }
        Ok(Self {
            name,
            region_codes,
            is_active: self.is_active,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CarrierInput {
    pub code: String,
    pub name: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl CarrierInput {
    /// Lowercase the code and trim both fields.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for a blank code or name, or a code
    /// with characters other than ASCII letters, digits, `-` and `_`.
    pub fn normalized(self) -> Result<Self, AppError> {
        let code = self.code.trim().to_ascii_lowercase();
        let valid = !code.is_empty()
            && code
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(AppError::BadRequest(
                "carrier code must be letters, digits, '-' or '_'".to_string(),
            ));
        }
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::BadRequest("carrier name is required".to_string()));
        }
        Ok(Self {
            code,
            name,
            is_active: self.is_active,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuleInput {
    pub carrier_id: CarrierId,
    pub zone_id: ZoneId,
    pub name: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub min_weight_grams: i32,
    pub max_weight_grams: Option<i32>,
    #[serde(default)]
    pub min_amount: Clp,
    pub max_amount: Option<Clp>,
    pub base_cost: Clp,
    #[serde(default)]
    pub cost_per_kg: Clp,
    pub free_over_amount: Option<Clp>,
    pub eta_days: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl RuleInput {
    /// Build and validate the rule. The id is assigned by the database on
    /// insert and taken from the path on update.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Shipping` when the bands or costs are inconsistent.
    pub fn into_rule(self, id: ShippingRuleId) -> Result<ShippingRule, AppError> {
        let rule = ShippingRule {
            id,
            carrier_id: self.carrier_id,
            zone_id: self.zone_id,
            name: self.name.trim().to_string(),
            priority: self.priority,
            min_weight_grams: self.min_weight_grams,
            max_weight_grams: self.max_weight_grams,
            min_amount: self.min_amount,
            max_amount: self.max_amount,
            base_cost: self.base_cost,
            cost_per_kg: self.cost_per_kg,
            free_over_amount: self.free_over_amount,
            eta_days: self.eta_days,
            is_active: self.is_active,
        };
        validate_rule(&rule)?;
        Ok(rule)
    }
}

const fn default_true() -> bool {
    true
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_codes_are_normalized() {
        let zone = ZoneInput {
            name: " Centro ".to_string(),
            region_codes: vec!["rm".to_string(), " CL-VS".to_string(), "RM".to_string()],
            is_active: true,
        }
        .normalized()
        .unwrap();
        assert_eq!(zone.name, "Centro");
        assert_eq!(zone.region_codes, vec!["CL-VS", "RM"]);
    }

    #[test]
    fn test_zone_without_regions_is_rejected() {
        let zone = ZoneInput {
            name: "Sur".to_string(),
            region_codes: vec!["  ".to_string()],
            is_active: true,
        };
        assert!(matches!(zone.normalized(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_carrier_code() {
        let carrier = CarrierInput {
            code: " Chilexpress ".to_string(),
            name: "Chilexpress".to_string(),
            is_active: true,
        }
        .normalized()
        .unwrap();
        assert_eq!(carrier.code, "chilexpress");

        let bad = CarrierInput {
            code: "blue express".to_string(),
            name: "Blue".to_string(),
            is_active: true,
        };
        assert!(bad.normalized().is_err());
    }

    #[test]
    fn test_rule_bands_are_validated() {
        let input: RuleInput = serde_json::from_value(serde_json::json!({
            "carrier_id": 1,
            "zone_id": 1,
            "name": "Liviano",
            "min_weight_grams": 2000,
            "max_weight_grams": 1000,
            "base_cost": 3990,
            "eta_days": 2
        }))
        .unwrap();
        assert!(matches!(
            input.into_rule(ShippingRuleId::new(0)),
            Err(AppError::Shipping(_))
        ));
    }
}
