//! Chilean peso amounts.
//!
//! CLP has no minor unit, so every amount is a whole number of pesos stored as
//! `BIGINT`. Negative amounts are never valid for prices, costs or totals; the
//! arithmetic helpers either check or saturate at zero.

use core::fmt;
use core::iter::Sum;
use core::ops::Add;

use serde::{Deserialize, Serialize};

/// An amount of Chilean pesos.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(transparent))]
pub struct Clp(i64);

impl Clp {
    /// Zero pesos.
    pub const ZERO: Self = Self(0);

    /// Wrap a raw peso amount.
    #[must_use]
    pub const fn new(pesos: i64) -> Self {
        Self(pesos)
    }

    /// The raw peso amount.
    #[must_use]
    pub const fn pesos(self) -> i64 {
        self.0
    }

    /// Whether the amount is strictly positive.
    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Whether the amount is negative.
    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Add two amounts, returning `None` on overflow.
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Subtract, clamping at zero.
    #[must_use]
    pub const fn saturating_sub(self, other: Self) -> Self {
        let v = self.0.saturating_sub(other.0);
        if v < 0 { Self::ZERO } else { Self(v) }
    }

    /// Multiply a unit amount by a quantity.
    #[must_use]
    pub const fn times(self, quantity: i32) -> Self {
        Self(self.0.saturating_mul(quantity as i64))
    }
}

impl Add for Clp {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Sum for Clp {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl From<i64> for Clp {
    fn from(pesos: i64) -> Self {
        Self(pesos)
    }
}

impl From<Clp> for i64 {
    fn from(amount: Clp) -> Self {
        amount.0
    }
}

/// Formats as `$12.990`, the way prices are printed in Chile.
impl fmt::Display for Clp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.0.unsigned_abs().to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, c) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(c);
        }
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{sign}${grouped}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_groups_thousands() {
        assert_eq!(Clp::new(0).to_string(), "$0");
        assert_eq!(Clp::new(990).to_string(), "$990");
        assert_eq!(Clp::new(12_990).to_string(), "$12.990");
        assert_eq!(Clp::new(1_234_567).to_string(), "$1.234.567");
        assert_eq!(Clp::new(-4_500).to_string(), "-$4.500");
    }

    #[test]
    fn test_saturating_sub_never_negative() {
        assert_eq!(Clp::new(100).saturating_sub(Clp::new(300)), Clp::ZERO);
        assert_eq!(Clp::new(300).saturating_sub(Clp::new(100)), Clp::new(200));
    }

    #[test]
    fn test_times_and_sum() {
        let lines = [Clp::new(1_990).times(3), Clp::new(5_000).times(1)];
        assert_eq!(lines.into_iter().sum::<Clp>(), Clp::new(10_970));
    }
}
