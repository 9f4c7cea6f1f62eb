//! Stock bookkeeping for a single product.
//!
//! `on_hand` is the physical count (`stock_qty`), `reserved` is the part held by
//! orders awaiting payment (`stock_reserved`). Every operation returns a new level
//! together with the ledger delta it implies; the input is never modified.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::MovementKind;

/// Errors from stock operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StockError {
    #[error("quantity must be greater than zero")]
    NonPositiveQuantity,
    #[error("only {available} units available, {requested} requested")]
    Insufficient { requested: i32, available: i32 },
    #[error("cannot release or commit {requested} units, only {reserved} reserved")]
    NotReserved { requested: i32, reserved: i32 },
    #[error("adjustment would leave {on_hand} on hand with {reserved} reserved")]
    BelowReserved { on_hand: i32, reserved: i32 },
    #[error("stock counter overflow")]
    Overflow,
}

/// On-hand and reserved units for a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub on_hand: i32,
    pub reserved: i32,
}

/// A stock change to append to the inventory ledger.
///
/// `quantity` is signed from the point of view of the counter the kind touches:
/// `stock_qty` for restock/sale/adjustment/return, `stock_reserved` for reserve/release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Movement {
    pub kind: MovementKind,
    pub quantity: i32,
}

impl StockLevel {
    /// Build a level, checking `0 <= reserved <= on_hand`.
    ///
    /// # Errors
    ///
    /// Returns [`StockError::BelowReserved`] if the invariant does not hold.
    pub const fn new(on_hand: i32, reserved: i32) -> Result<Self, StockError> {
        if reserved < 0 || on_hand < reserved {
            return Err(StockError::BelowReserved { on_hand, reserved });
        }
        Ok(Self { on_hand, reserved })
    }

    /// Units that can still be sold.
    #[must_use]
    pub const fn available(self) -> i32 {
        self.on_hand - self.reserved
    }

    /// Hold `qty` units for a pending order.
    ///
    /// # Errors
    ///
    /// Fails if `qty <= 0` or more than [`available`](Self::available).
    pub const fn reserve(self, qty: i32) -> Result<(Self, Movement), StockError> {
        if qty <= 0 {
            return Err(StockError::NonPositiveQuantity);
        }
        if qty > self.available() {
            return Err(StockError::Insufficient {
                requested: qty,
                available: self.available(),
            });
        }
        Ok((
            Self {
                on_hand: self.on_hand,
                reserved: self.reserved + qty,
            },
            Movement {
                kind: MovementKind::Reserve,
                quantity: qty,
            },
        ))
    }

    /// Drop a reservation without selling.
    ///
    /// # Errors
    ///
    /// Fails if `qty <= 0` or more than is reserved.
    pub const fn release(self, qty: i32) -> Result<(Self, Movement), StockError> {
        if qty <= 0 {
            return Err(StockError::NonPositiveQuantity);
        }
        if qty > self.reserved {
            return Err(StockError::NotReserved {
                requested: qty,
                reserved: self.reserved,
            });
        }
        Ok((
            Self {
                on_hand: self.on_hand,
                reserved: self.reserved - qty,
            },
            Movement {
                kind: MovementKind::Release,
                quantity: -qty,
            },
        ))
    }

    /// Turn a reservation into a sale.
    ///
    /// # Errors
    ///
    /// Fails if `qty <= 0` or more than is reserved.
    pub const fn commit(self, qty: i32) -> Result<(Self, Movement), StockError> {
        if qty <= 0 {
            return Err(StockError::NonPositiveQuantity);
        }
        if qty > self.reserved {
            return Err(StockError::NotReserved {
                requested: qty,
                reserved: self.reserved,
            });
        }
        Ok((
            Self {
                on_hand: self.on_hand - qty,
                reserved: self.reserved - qty,
            },
            Movement {
                kind: MovementKind::Sale,
                quantity: -qty,
            },
        ))
    }

    /// Receive goods (`Restock`) or take back sold goods (`Return`).
    ///
    /// # Errors
    ///
    /// Fails if `qty <= 0` or the counter would overflow.
    pub const fn receive(self, qty: i32, kind: MovementKind) -> Result<(Self, Movement), StockError> {
        if qty <= 0 {
            return Err(StockError::NonPositiveQuantity);
        }
        let Some(on_hand) = self.on_hand.checked_add(qty) else {
            return Err(StockError::Overflow);
        };
        Ok((
            Self {
                on_hand,
                reserved: self.reserved,
            },
            Movement {
                kind,
                quantity: qty,
            },
        ))
    }

    /// Apply a manual correction to `on_hand`.
    ///
    /// # Errors
    ///
    /// Fails if `delta == 0`, on overflow, or if the result would drop below
    /// the reserved count.
    pub const fn adjust(self, delta: i32) -> Result<(Self, Movement), StockError> {
        if delta == 0 {
            return Err(StockError::NonPositiveQuantity);
        }
        let Some(on_hand) = self.on_hand.checked_add(delta) else {
            return Err(StockError::Overflow);
        };
        if on_hand < self.reserved || on_hand < 0 {
            return Err(StockError::BelowReserved {
                on_hand,
                reserved: self.reserved,
            });
        }
        Ok((
            Self {
                on_hand,
                reserved: self.reserved,
            },
            Movement {
                kind: MovementKind::Adjustment,
                quantity: delta,
            },
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn level(on_hand: i32, reserved: i32) -> StockLevel {
        StockLevel::new(on_hand, reserved).unwrap()
    }

    #[test]
    fn test_new_enforces_invariant() {
        assert!(StockLevel::new(5, 6).is_err());
        assert!(StockLevel::new(5, -1).is_err());
        assert_eq!(level(5, 5).available(), 0);
    }

    #[test]
    fn test_reserve_then_commit() {
        let (reserved, mv) = level(10, 2).reserve(3).unwrap();
        assert_eq!(reserved, level(10, 5));
        assert_eq!(mv.kind, MovementKind::Reserve);
        assert_eq!(mv.quantity, 3);

        let (sold, mv) = reserved.commit(3).unwrap();
        assert_eq!(sold, level(7, 2));
        assert_eq!(mv.kind, MovementKind::Sale);
        assert_eq!(mv.quantity, -3);
    }

    #[test]
    fn test_reserve_beyond_available() {
        let err = level(10, 8).reserve(3).unwrap_err();
        assert_eq!(
            err,
            StockError::Insufficient {
                requested: 3,
                available: 2
            }
        );
    }

    #[test]
    fn test_release_more_than_reserved() {
        assert!(matches!(
            level(10, 1).release(2),
            Err(StockError::NotReserved { .. })
        ));
        let (after, mv) = level(10, 4).release(4).unwrap();
        assert_eq!(after, level(10, 0));
        assert_eq!(mv.quantity, -4);
    }

    #[test]
    fn test_adjust_cannot_go_below_reserved() {
        assert!(matches!(
            level(10, 6).adjust(-5),
            Err(StockError::BelowReserved { .. })
        ));
        let (after, mv) = level(10, 6).adjust(-4).unwrap();
        assert_eq!(after, level(6, 6));
        assert_eq!(mv.kind, MovementKind::Adjustment);
        assert_eq!(level(1, 0).adjust(0), Err(StockError::NonPositiveQuantity));
    }

    #[test]
    fn test_receive() {
        let (after, mv) = level(0, 0).receive(12, MovementKind::Restock).unwrap();
        assert_eq!(after.on_hand, 12);
        assert_eq!(mv.kind, MovementKind::Restock);
        assert_eq!(
            level(i32::MAX, 0).receive(1, MovementKind::Return),
            Err(StockError::Overflow)
        );
    }
}
