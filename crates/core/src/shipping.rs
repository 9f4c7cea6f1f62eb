//! Shipping zones, carriers and cost rules.
//!
//! A rule prices deliveries of one carrier into one zone for a weight band and a
//! cart-subtotal band. When several rules match, the highest `priority` wins and
//! the lowest rule id breaks ties, so the same cart always gets the same quote.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{CarrierId, Clp, ShippingRuleId, ZoneId};

/// Errors from shipping evaluation and rule validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShippingError {
    #[error("no shipping zone covers region {0}")]
    NoZoneForRegion(String),
    #[error("no shipping rule matches this order")]
    NoMatchingRule,
    #[error("weight cannot be negative")]
    NegativeWeight,
    #[error("invalid shipping rule: {0}")]
    InvalidRule(&'static str),
}

/// A named group of regions served with the same rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingZone {
    pub id: ZoneId,
    pub name: String,
    /// Region codes such as `RM` or `CL-VS`.
    pub region_codes: Vec<String>,
    pub is_active: bool,
}

impl ShippingZone {
    /// Whether the zone lists `region_code`, ignoring case and surrounding spaces.
    #[must_use]
    pub fn covers(&self, region_code: &str) -> bool {
        let wanted = region_code.trim();
        self.region_codes
            .iter()
            .any(|code| code.trim().eq_ignore_ascii_case(wanted))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingCarrier {
    pub id: CarrierId,
    pub code: String,
    pub name: String,
    pub is_active: bool,
}

/// A priced band for one carrier in one zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingRule {
    pub id: ShippingRuleId,
    pub carrier_id: CarrierId,
    pub zone_id: ZoneId,
    pub name: String,
    pub priority: i32,
    pub min_weight_grams: i32,
    /// Inclusive upper bound; `None` is unbounded.
    pub max_weight_grams: Option<i32>,
    pub min_amount: Clp,
    /// Inclusive upper bound; `None` is unbounded.
    pub max_amount: Option<Clp>,
    pub base_cost: Clp,
    pub cost_per_kg: Clp,
    /// Subtotal at or above which shipping is free.
    pub free_over_amount: Option<Clp>,
    pub eta_days: i32,
    pub is_active: bool,
}

impl ShippingRule {
    fn matches(&self, weight_grams: i64, subtotal: Clp) -> bool {
        let weight_ok = weight_grams >= i64::from(self.min_weight_grams)
            && self
                .max_weight_grams
                .is_none_or(|max| weight_grams <= i64::from(max));
        let amount_ok =
            subtotal >= self.min_amount && self.max_amount.is_none_or(|max| subtotal <= max);
        weight_ok && amount_ok
    }

    /// Price for a parcel of `weight_grams` on a cart worth `subtotal`.
    ///
    /// Weight is charged per started kilogram.
    #[must_use]
    pub fn cost_for(&self, weight_grams: i64, subtotal: Clp) -> Clp {
        if self.free_over_amount.is_some_and(|free| subtotal >= free) {
            return Clp::ZERO;
        }
        let kilos = (weight_grams.max(0) + 999) / 1000;
        let per_kg = Clp::new(self.cost_per_kg.pesos().saturating_mul(kilos));
        self.base_cost + per_kg
    }

    /// Ordering key: higher priority first, then lower id.
    fn precedence(&self) -> (core::cmp::Reverse<i32>, ShippingRuleId) {
        (core::cmp::Reverse(self.priority), self.id)
    }
}

/// Everything [`evaluate_shipping`] needs to look at.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingContext {
    pub zones: Vec<ShippingZone>,
    pub carriers: Vec<ShippingCarrier>,
    pub rules: Vec<ShippingRule>,
}

/// What is being shipped, and where.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShippingRequest<'a> {
    pub region_code: &'a str,
    pub weight_grams: i64,
    pub subtotal: Clp,
    /// Restrict to a single carrier.
    pub carrier_code: Option<&'a str>,
}

/// The selected rule and its price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingQuote {
    pub rule_id: ShippingRuleId,
    pub rule_name: String,
    pub carrier_id: CarrierId,
    pub carrier_code: String,
    pub carrier_name: String,
    pub zone_id: ZoneId,
    pub zone_name: String,
    pub cost: Clp,
    pub eta_days: i32,
    pub free_shipping: bool,
}

impl ShippingContext {
    fn zones_for(&self, region_code: &str) -> Vec<&ShippingZone> {
        self.zones
            .iter()
            .filter(|z| z.is_active && z.covers(region_code))
            .collect()
    }

    /// Rules matching `request`, paired with their zone and carrier.
    fn candidates<'c>(
        &'c self,
        request: &ShippingRequest<'_>,
    ) -> Result<Vec<(&'c ShippingRule, &'c ShippingZone, &'c ShippingCarrier)>, ShippingError>
    {
        if request.weight_grams < 0 {
            return Err(ShippingError::NegativeWeight);
        }
        let zones = self.zones_for(request.region_code);
        if zones.is_empty() {
            return Err(ShippingError::NoZoneForRegion(
                request.region_code.trim().to_owned(),
            ));
        }

        let found = self
            .rules
            .iter()
            .filter(|rule| rule.is_active && rule.matches(request.weight_grams, request.subtotal))
            .filter_map(|rule| {
                let zone = zones.iter().find(|z| z.id == rule.zone_id)?;
                let carrier = self
                    .carriers
                    .iter()
                    .find(|c| c.id == rule.carrier_id && c.is_active)?;
                if let Some(code) = request.carrier_code
                    && !carrier.code.eq_ignore_ascii_case(code)
                {
                    return None;
                }
                Some((rule, *zone, carrier))
            })
            .collect();
        Ok(found)
    }
}

fn quote(
    rule: &ShippingRule,
    zone: &ShippingZone,
    carrier: &ShippingCarrier,
    request: &ShippingRequest<'_>,
) -> ShippingQuote {
    let cost = rule.cost_for(request.weight_grams, request.subtotal);
    ShippingQuote {
        rule_id: rule.id,
        rule_name: rule.name.clone(),
        carrier_id: carrier.id,
        carrier_code: carrier.code.clone(),
        carrier_name: carrier.name.clone(),
        zone_id: zone.id,
        zone_name: zone.name.clone(),
        cost,
        eta_days: rule.eta_days,
        free_shipping: cost == Clp::ZERO,
    }
}

/// Pick the winning rule for `request` and price it.
///
/// # Errors
///
/// Returns [`ShippingError::NoZoneForRegion`] when no active zone lists the
/// region, [`ShippingError::NoMatchingRule`] when no rule fits the weight and
/// subtotal, and [`ShippingError::NegativeWeight`] for a negative weight.
pub fn evaluate_shipping(
    ctx: &ShippingContext,
    request: &ShippingRequest<'_>,
) -> Result<ShippingQuote, ShippingError> {
    ctx.candidates(request)?
        .into_iter()
        .min_by_key(|(rule, _, _)| rule.precedence())
        .map(|(rule, zone, carrier)| quote(rule, zone, carrier, request))
        .ok_or(ShippingError::NoMatchingRule)
}

/// The winning quote of every carrier that can serve `request`, cheapest first.
///
/// An empty list means the region is served but nothing fits this cart.
///
/// # Errors
///
/// Same zone and weight errors as [`evaluate_shipping`].
pub fn quote_options(
    ctx: &ShippingContext,
    request: &ShippingRequest<'_>,
) -> Result<Vec<ShippingQuote>, ShippingError> {
    let mut best: BTreeMap<CarrierId, (&ShippingRule, &ShippingZone, &ShippingCarrier)> =
        BTreeMap::new();
    for candidate in ctx.candidates(request)? {
        let carrier_id = candidate.2.id;
        let better = best
            .get(&carrier_id)
            .is_none_or(|current| candidate.0.precedence() < current.0.precedence());
        if better {
            best.insert(carrier_id, candidate);
        }
    }

    let mut quotes: Vec<ShippingQuote> = best
        .into_values()
        .map(|(rule, zone, carrier)| quote(rule, zone, carrier, request))
        .collect();
    quotes.sort_by(|a, b| {
        a.cost
            .cmp(&b.cost)
            .then_with(|| a.carrier_code.cmp(&b.carrier_code))
    });
    Ok(quotes)
}

/// Check a rule before it is saved.
///
/// # Errors
///
/// Returns [`ShippingError::InvalidRule`] naming the first problem found.
pub fn validate_rule(rule: &ShippingRule) -> Result<(), ShippingError> {
    if rule.name.trim().is_empty() {
        return Err(ShippingError::InvalidRule("name cannot be empty"));
    }
    if rule.base_cost.is_negative() || rule.cost_per_kg.is_negative() {
        return Err(ShippingError::InvalidRule("costs cannot be negative"));
    }
    if rule.min_weight_grams < 0 || rule.min_amount.is_negative() {
        return Err(ShippingError::InvalidRule("minimums cannot be negative"));
    }
    if rule.free_over_amount.is_some_and(Clp::is_negative) {
        return Err(ShippingError::InvalidRule(
            "free shipping threshold cannot be negative",
        ));
    }
    if rule
        .max_weight_grams
        .is_some_and(|max| max < rule.min_weight_grams)
    {
        return Err(ShippingError::InvalidRule(
            "max weight is below min weight",
        ));
    }
    if rule.max_amount.is_some_and(|max| max < rule.min_amount) {
        return Err(ShippingError::InvalidRule(
            "max amount is below min amount",
        ));
    }
    if rule.eta_days < 0 {
        return Err(ShippingError::InvalidRule("eta cannot be negative"));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn rule(id: i32, carrier: i32, zone: i32, priority: i32) -> ShippingRule {
        ShippingRule {
            id: ShippingRuleId::new(id),
            carrier_id: CarrierId::new(carrier),
            zone_id: ZoneId::new(zone),
            name: format!("rule {id}"),
            priority,
            min_weight_grams: 0,
            max_weight_grams: None,
            min_amount: Clp::ZERO,
            max_amount: None,
            base_cost: Clp::new(3_990),
            cost_per_kg: Clp::new(500),
            free_over_amount: None,
            eta_days: 3,
            is_active: true,
        }
    }

    fn ctx(rules: Vec<ShippingRule>) -> ShippingContext {
        ShippingContext {
            zones: vec![
                ShippingZone {
                    id: ZoneId::new(1),
                    name: "Santiago".to_owned(),
                    region_codes: vec!["RM".to_owned()],
                    is_active: true,
                },
                ShippingZone {
                    id: ZoneId::new(2),
                    name: "Sur".to_owned(),
                    region_codes: vec!["BI".to_owned(), "AR".to_owned()],
                    is_active: true,
                },
                ShippingZone {
                    id: ZoneId::new(3),
                    name: "Cerrada".to_owned(),
                    region_codes: vec!["MA".to_owned()],
                    is_active: false,
                },
            ],
            carriers: vec![
                ShippingCarrier {
                    id: CarrierId::new(10),
                    code: "chilexpress".to_owned(),
                    name: "Chilexpress".to_owned(),
                    is_active: true,
                },
                ShippingCarrier {
                    id: CarrierId::new(20),
                    code: "starken".to_owned(),
                    name: "Starken".to_owned(),
                    is_active: true,
                },
                ShippingCarrier {
                    id: CarrierId::new(30),
                    code: "retired".to_owned(),
                    name: "Retired".to_owned(),
                    is_active: false,
                },
            ],
            rules,
        }
    }

    fn request(region: &str, weight: i64, subtotal: i64) -> ShippingRequest<'_> {
        ShippingRequest {
            region_code: region,
            weight_grams: weight,
            subtotal: Clp::new(subtotal),
            carrier_code: None,
        }
    }

    #[test]
    fn test_cost_charges_started_kilograms() {
        let r = rule(1, 10, 1, 0);
        assert_eq!(r.cost_for(0, Clp::ZERO), Clp::new(3_990));
        assert_eq!(r.cost_for(1, Clp::ZERO), Clp::new(4_490));
        assert_eq!(r.cost_for(1_000, Clp::ZERO), Clp::new(4_490));
        assert_eq!(r.cost_for(2_500, Clp::ZERO), Clp::new(5_490));
    }

    #[test]
    fn test_free_over_amount_is_inclusive() {
        let r = ShippingRule {
            free_over_amount: Some(Clp::new(50_000)),
            ..rule(1, 10, 1, 0)
        };
        assert_eq!(r.cost_for(3_000, Clp::new(49_999)), Clp::new(5_490));
        assert_eq!(r.cost_for(3_000, Clp::new(50_000)), Clp::ZERO);
    }

    #[test]
    fn test_region_match_is_case_insensitive() {
        let c = ctx(vec![rule(1, 10, 2, 0)]);
        let q = evaluate_shipping(&c, &request(" bi ", 500, 10_000)).unwrap();
        assert_eq!(q.zone_id, ZoneId::new(2));
        assert_eq!(q.carrier_code, "chilexpress");
    }

    #[test]
    fn test_unknown_or_inactive_region() {
        let c = ctx(vec![rule(1, 10, 3, 0)]);
        assert_eq!(
            evaluate_shipping(&c, &request("XX", 0, 0)),
            Err(ShippingError::NoZoneForRegion("XX".to_owned()))
        );
        assert_eq!(
            evaluate_shipping(&c, &request("MA", 0, 0)),
            Err(ShippingError::NoZoneForRegion("MA".to_owned()))
        );
    }

    #[test]
    fn test_highest_priority_wins_then_lowest_id() {
        let c = ctx(vec![
            rule(7, 10, 1, 5),
            rule(3, 20, 1, 10),
            rule(4, 10, 1, 10),
        ]);
        let q = evaluate_shipping(&c, &request("RM", 100, 1_000)).unwrap();
        assert_eq!(q.rule_id, ShippingRuleId::new(3));
    }

    #[test]
    fn test_weight_and_amount_bounds_are_inclusive() {
        let bounded = ShippingRule {
            min_weight_grams: 1_000,
            max_weight_grams: Some(5_000),
            min_amount: Clp::new(10_000),
            max_amount: Some(Clp::new(20_000)),
            ..rule(1, 10, 1, 1)
        };
        let c = ctx(vec![bounded]);
        assert!(evaluate_shipping(&c, &request("RM", 1_000, 10_000)).is_ok());
        assert!(evaluate_shipping(&c, &request("RM", 5_000, 20_000)).is_ok());
        assert_eq!(
            evaluate_shipping(&c, &request("RM", 5_001, 15_000)),
            Err(ShippingError::NoMatchingRule)
        );
        assert_eq!(
            evaluate_shipping(&c, &request("RM", 999, 15_000)),
            Err(ShippingError::NoMatchingRule)
        );
        assert_eq!(
            evaluate_shipping(&c, &request("RM", 2_000, 20_001)),
            Err(ShippingError::NoMatchingRule)
        );
    }

    #[test]
    fn test_inactive_rules_and_carriers_are_skipped() {
        let c = ctx(vec![
            ShippingRule {
                is_active: false,
                ..rule(1, 10, 1, 100)
            },
            rule(2, 30, 1, 50),
            rule(3, 20, 1, 0),
        ]);
        let q = evaluate_shipping(&c, &request("RM", 0, 0)).unwrap();
        assert_eq!(q.rule_id, ShippingRuleId::new(3));
    }

    #[test]
    fn test_carrier_filter() {
        let c = ctx(vec![rule(1, 10, 1, 100), rule(2, 20, 1, 0)]);
        let req = ShippingRequest {
            carrier_code: Some("STARKEN"),
            ..request("RM", 0, 0)
        };
        let q = evaluate_shipping(&c, &req).unwrap();
        assert_eq!(q.carrier_code, "starken");

        let req = ShippingRequest {
            carrier_code: Some("correos"),
            ..request("RM", 0, 0)
        };
        assert_eq!(
            evaluate_shipping(&c, &req),
            Err(ShippingError::NoMatchingRule)
        );
    }

    #[test]
    fn test_rule_must_belong_to_matched_zone() {
        let c = ctx(vec![rule(1, 10, 2, 0)]);
        assert_eq!(
            evaluate_shipping(&c, &request("RM", 0, 0)),
            Err(ShippingError::NoMatchingRule)
        );
    }

    #[test]
    fn test_negative_weight() {
        let c = ctx(vec![rule(1, 10, 1, 0)]);
        assert_eq!(
            evaluate_shipping(&c, &request("RM", -1, 0)),
            Err(ShippingError::NegativeWeight)
        );
    }

    #[test]
    fn test_quote_options_one_per_carrier_sorted_by_cost() {
        let cheap = ShippingRule {
            base_cost: Clp::new(2_000),
            ..rule(5, 20, 1, 0)
        };
        let c = ctx(vec![
            rule(1, 10, 1, 1),
            ShippingRule {
                base_cost: Clp::new(100),
                ..rule(2, 10, 1, 0)
            },
            cheap,
        ]);
        let quotes = quote_options(&c, &request("RM", 500, 0)).unwrap();
        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[0].carrier_code, "starken");
        assert_eq!(quotes[0].cost, Clp::new(2_500));
        // Chilexpress keeps its priority-1 rule even though rule 2 is cheaper.
        assert_eq!(quotes[1].rule_id, ShippingRuleId::new(1));
    }

    #[test]
    fn test_quote_options_empty_when_nothing_fits() {
        let c = ctx(vec![ShippingRule {
            max_weight_grams: Some(100),
            ..rule(1, 10, 1, 0)
        }]);
        assert!(quote_options(&c, &request("RM", 500, 0)).unwrap().is_empty());
    }

    #[test]
    fn test_validate_rule() {
        assert!(validate_rule(&rule(1, 10, 1, 0)).is_ok());
        let bad = ShippingRule {
            base_cost: Clp::new(-1),
            ..rule(1, 10, 1, 0)
        };
        assert!(validate_rule(&bad).is_err());
        let bad = ShippingRule {
            min_weight_grams: 10,
            max_weight_grams: Some(5),
            ..rule(1, 10, 1, 0)
        };
        assert!(validate_rule(&bad).is_err());
        let bad = ShippingRule {
            min_amount: Clp::new(10),
            max_amount: Some(Clp::new(9)),
            ..rule(1, 10, 1, 0)
        };
        assert!(validate_rule(&bad).is_err());
    }
}
