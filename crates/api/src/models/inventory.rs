//! Inventory ledger model and stock adjustment input.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use andes_core::{MovementId, MovementKind, OrderId, ProductId, UserId};

/// One entry of the stock ledger.
#[derive(Debug, Clone, Serialize)]
pub struct InventoryMovement {
    pub id: MovementId,
    pub product_id: ProductId,
    pub kind: MovementKind,
    pub quantity: i32,
    pub order_id: Option<OrderId>,
    pub actor_id: Option<UserId>,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Kind of manual stock change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentKind {
    /// Goods received; `delta` must be positive.
    Restock,
    /// Signed correction of the on-hand count.
    Adjustment,
}

/// Manual stock change requested from the admin panel.
///
/// Without an explicit `kind`, a positive delta is a restock and a negative
/// one an adjustment.
#[derive(Debug, Clone, Deserialize)]
pub struct StockAdjustment {
    pub delta: i32,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub kind: Option<AdjustmentKind>,
}

impl StockAdjustment {
    #[must_use]
    pub fn resolved_kind(&self) -> AdjustmentKind {
        self.kind.unwrap_or(if self.delta > 0 {
            AdjustmentKind::Restock
        } else {
            AdjustmentKind::Adjustment
        })
    }

    /// Trimmed reason, `None` when blank.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref().map(str::trim).filter(|r| !r.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adjustment(delta: i32, kind: Option<AdjustmentKind>) -> StockAdjustment {
        StockAdjustment {
            delta,
            reason: Some("  conteo  ".to_owned()),
            kind,
        }
    }

    #[test]
    fn test_kind_defaults_from_sign() {
        assert_eq!(adjustment(5, None).resolved_kind(), AdjustmentKind::Restock);
        assert_eq!(adjustment(-2, None).resolved_kind(), AdjustmentKind::Adjustment);
        assert_eq!(
            adjustment(5, Some(AdjustmentKind::Adjustment)).resolved_kind(),
            AdjustmentKind::Adjustment
        );
    }

    #[test]
    fn test_reason_is_trimmed() {
        assert_eq!(adjustment(1, None).reason(), Some("conteo"));
        let blank = StockAdjustment {
            delta: 1,
            reason: Some("   ".to_owned()),
            kind: None,
        };
        assert_eq!(blank.reason(), None);
    }
}
