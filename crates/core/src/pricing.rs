//! Product pricing and discount precedence.
//!
//! A product carries a list price plus two optional discount mechanisms: a fixed
//! sale price and a percentage. When both are present the fixed price wins, and
//! both only apply inside the optional discount window.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Clp;

/// Validation failures for [`Pricing`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingError {
    #[error("price must be greater than zero")]
    NonPositivePrice,
    #[error("discount price must be between 1 and the list price (exclusive)")]
    DiscountPriceOutOfRange,
    #[error("discount percent must be greater than 0 and at most 100")]
    DiscountPercentOutOfRange,
    #[error("discount window must end after it starts")]
    InvertedWindow,
}

/// Price inputs stored on a product row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pricing {
    /// List price.
    pub price: Clp,
    /// Fixed sale price; takes precedence over `discount_percent`.
    pub discount_price: Option<Clp>,
    /// Percentage off the list price, e.g. `15` or `12.5`.
    pub discount_percent: Option<Decimal>,
    /// Discounts apply from this instant (inclusive).
    pub discount_starts_at: Option<DateTime<Utc>>,
    /// Discounts stop applying at this instant (exclusive).
    pub discount_ends_at: Option<DateTime<Utc>>,
}

impl Pricing {
    /// A plain list price with no discounts.
    #[must_use]
    pub const fn list(price: Clp) -> Self {
        Self {
            price,
            discount_price: None,
            discount_percent: None,
            discount_starts_at: None,
            discount_ends_at: None,
        }
    }

    /// Check the invariants enforced when a product is saved.
    ///
    /// # Errors
    ///
    /// Returns the first [`PricingError`] found.
    pub fn validate(&self) -> Result<(), PricingError> {
        if !self.price.is_positive() {
            return Err(PricingError::NonPositivePrice);
        }
        if let Some(dp) = self.discount_price
            && (!dp.is_positive() || dp >= self.price)
        {
            return Err(PricingError::DiscountPriceOutOfRange);
        }
        if let Some(pct) = self.discount_percent
            && (pct <= Decimal::ZERO || pct > Decimal::ONE_HUNDRED)
        {
            return Err(PricingError::DiscountPercentOutOfRange);
        }
        if let (Some(start), Some(end)) = (self.discount_starts_at, self.discount_ends_at)
            && end <= start
        {
            return Err(PricingError::InvertedWindow);
        }
        Ok(())
    }

    /// Whether `now` falls inside the discount window (an open window always does).
    #[must_use]
    pub fn window_open(&self, now: DateTime<Utc>) -> bool {
        let started = self.discount_starts_at.is_none_or(|start| now >= start);
        let not_ended = self.discount_ends_at.is_none_or(|end| now < end);
        started && not_ended
    }

    /// The price a customer pays at `now`.
    #[must_use]
    pub fn effective_price(&self, now: DateTime<Utc>) -> Clp {
        if !self.window_open(now) {
            return self.price;
        }

        if let Some(dp) = self.discount_price
            && dp.is_positive()
            && dp < self.price
        {
            return dp;
        }

        if let Some(pct) = self.discount_percent
            && pct > Decimal::ZERO
            && pct <= Decimal::ONE_HUNDRED
        {
            return self.price.saturating_sub(percent_of(self.price, pct));
        }

        self.price
    }

    /// How much is taken off the list price at `now`.
    #[must_use]
    pub fn discount_amount(&self, now: DateTime<Utc>) -> Clp {
        self.price.saturating_sub(self.effective_price(now))
    }

    /// Whether a discount is currently in effect.
    #[must_use]
    pub fn is_on_sale(&self, now: DateTime<Utc>) -> bool {
        self.effective_price(now) < self.price
    }
}

/// `amount * pct / 100`, rounded half away from zero to whole pesos.
fn percent_of(amount: Clp, pct: Decimal) -> Clp {
    let raw = Decimal::from(amount.pesos()) * pct / Decimal::ONE_HUNDRED;
    let rounded = raw.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    Clp::new(rounded.to_i64().unwrap_or(0))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 11, 29, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_list_price_without_discounts() {
        let p = Pricing::list(Clp::new(19_990));
        assert_eq!(p.effective_price(now()), Clp::new(19_990));
        assert!(!p.is_on_sale(now()));
    }

    #[test]
    fn test_fixed_discount_beats_percent() {
        let p = Pricing {
            discount_price: Some(Clp::new(14_990)),
            discount_percent: Some(Decimal::from(50)),
            ..Pricing::list(Clp::new(19_990))
        };
        assert_eq!(p.effective_price(now()), Clp::new(14_990));
        assert_eq!(p.discount_amount(now()), Clp::new(5_000));
    }

    #[test]
    fn test_percent_rounds_half_away_from_zero() {
        // 12.5% of 9_990 = 1_248.75 -> 1_249
        let p = Pricing {
            discount_percent: Some(Decimal::new(125, 1)),
            ..Pricing::list(Clp::new(9_990))
        };
        assert_eq!(p.effective_price(now()), Clp::new(8_741));

        // 10% of 1_005 = 100.5 -> 101
        let p = Pricing {
            discount_percent: Some(Decimal::from(10)),
            ..Pricing::list(Clp::new(1_005))
        };
        assert_eq!(p.effective_price(now()), Clp::new(904));
    }

    #[test]
    fn test_full_percent_is_free_not_negative() {
        let p = Pricing {
            discount_percent: Some(Decimal::ONE_HUNDRED),
            ..Pricing::list(Clp::new(5_000))
        };
        assert_eq!(p.effective_price(now()), Clp::ZERO);
    }

    #[test]
    fn test_invalid_fixed_discount_falls_through_to_percent() {
        let p = Pricing {
            discount_price: Some(Clp::new(25_000)),
            discount_percent: Some(Decimal::from(10)),
            ..Pricing::list(Clp::new(20_000))
        };
        assert_eq!(p.effective_price(now()), Clp::new(18_000));
    }

    #[test]
    fn test_window_bounds() {
        let start = now();
        let end = now() + Duration::days(2);
        let p = Pricing {
            discount_price: Some(Clp::new(9_000)),
            discount_starts_at: Some(start),
            discount_ends_at: Some(end),
            ..Pricing::list(Clp::new(10_000))
        };
        assert_eq!(p.effective_price(start - Duration::seconds(1)), Clp::new(10_000));
        assert_eq!(p.effective_price(start), Clp::new(9_000));
        assert_eq!(p.effective_price(end - Duration::seconds(1)), Clp::new(9_000));
        assert_eq!(p.effective_price(end), Clp::new(10_000));
    }

    #[test]
    fn test_open_ended_window() {
        let p = Pricing {
            discount_price: Some(Clp::new(9_000)),
            discount_starts_at: Some(now()),
            ..Pricing::list(Clp::new(10_000))
        };
        assert!(p.is_on_sale(now() + Duration::days(365)));
    }

    #[test]
    fn test_validate() {
        assert_eq!(
            Pricing::list(Clp::ZERO).validate(),
            Err(PricingError::NonPositivePrice)
        );
        let p = Pricing {
            discount_price: Some(Clp::new(10_000)),
            ..Pricing::list(Clp::new(10_000))
        };
        assert_eq!(p.validate(), Err(PricingError::DiscountPriceOutOfRange));
        let p = Pricing {
            discount_percent: Some(Decimal::new(1001, 1)),
            ..Pricing::list(Clp::new(10_000))
        };
        assert_eq!(p.validate(), Err(PricingError::DiscountPercentOutOfRange));
        let p = Pricing {
            discount_starts_at: Some(now()),
            discount_ends_at: Some(now()),
            ..Pricing::list(Clp::new(10_000))
        };
        assert_eq!(p.validate(), Err(PricingError::InvertedWindow));
        assert!(Pricing::list(Clp::new(1)).validate().is_ok());
    }
}
