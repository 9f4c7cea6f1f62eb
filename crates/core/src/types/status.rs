//! Status enums for orders, payments, stock movements and user roles.

use serde::{Deserialize, Serialize};

/// Lifecycle of an order.
///
/// ```text
/// pending_payment ──► paid ──► processing ──► shipped ──► delivered
///        │              │           │                         │
///        ▼              ├──► refunded ◄───────────────────────┘
///    cancelled ◄────────┴───────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created at checkout; stock is reserved until payment or expiry.
    #[default]
    PendingPayment,
    /// Payment confirmed; reserved stock has been committed.
    Paid,
    /// Being picked and packed.
    Processing,
    /// Handed to the carrier.
    Shipped,
    /// Received by the customer.
    Delivered,
    /// Cancelled before delivery.
    Cancelled,
    /// Money returned to the customer.
    Refunded,
}

impl OrderStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 7] = [
        Self::PendingPayment,
        Self::Paid,
        Self::Processing,
        Self::Shipped,
        Self::Delivered,
        Self::Cancelled,
        Self::Refunded,
    ];

    /// Whether moving from `self` to `next` is allowed.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::PendingPayment, Self::Paid | Self::Cancelled)
                | (Self::Paid, Self::Processing | Self::Cancelled | Self::Refunded)
                | (Self::Processing, Self::Shipped | Self::Cancelled)
                | (Self::Shipped, Self::Delivered)
                | (Self::Delivered, Self::Refunded)
        )
    }

    /// No further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Refunded)
    }

    /// Stock for this order is still held as a reservation.
    #[must_use]
    pub const fn holds_reservation(self) -> bool {
        matches!(self, Self::PendingPayment)
    }

    /// Stock for this order has left `stock_qty`.
    #[must_use]
    pub const fn has_committed_stock(self) -> bool {
        matches!(
            self,
            Self::Paid | Self::Processing | Self::Shipped | Self::Delivered
        )
    }

    /// Wire / database name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PendingPayment => "pending_payment",
            Self::Paid => "paid",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("invalid order status: {s}"))
    }
}

/// State of a payment gateway transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "payment_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Initiated,
    Paid,
    Rejected,
    Cancelled,
    Refunded,
}

impl PaymentStatus {
    /// The gateway will not report further changes.
    #[must_use]
    pub const fn is_final(self) -> bool {
        !matches!(self, Self::Initiated)
    }
}

/// Kind of entry in the inventory ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "movement_kind", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    /// Goods received; `stock_qty` goes up.
    Restock,
    /// Held for a pending order; `stock_reserved` goes up.
    Reserve,
    /// Reservation dropped; `stock_reserved` goes down.
    Release,
    /// Reservation turned into a sale; both counters go down.
    Sale,
    /// Manual correction of `stock_qty`.
    Adjustment,
    /// Sold goods came back; `stock_qty` goes up.
    Return,
}

/// User role with increasing privileges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "user_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Shopper: own cart, orders and addresses.
    Customer,
    /// Back-office read access, order handling and stock adjustments.
    Staff,
    /// Full access, including catalog, shipping rules and user roles.
    Admin,
}

impl UserRole {
    /// Whether this role grants at least the privileges of `required`.
    #[must_use]
    pub fn at_least(self, required: Self) -> bool {
        self >= required
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Customer => write!(f, "customer"),
            Self::Staff => write!(f, "staff"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "staff" => Ok(Self::Staff),
            "admin" => Ok(Self::Admin),
            _ => Err(format!("invalid user role: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_payment_transitions() {
        let s = OrderStatus::PendingPayment;
        assert!(s.can_transition_to(OrderStatus::Paid));
        assert!(s.can_transition_to(OrderStatus::Cancelled));
        assert!(!s.can_transition_to(OrderStatus::Shipped));
        assert!(!s.can_transition_to(OrderStatus::Refunded));
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for from in [OrderStatus::Cancelled, OrderStatus::Refunded] {
            assert!(from.is_terminal());
            for to in OrderStatus::ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn test_no_self_transitions() {
        for status in OrderStatus::ALL {
            assert!(!status.can_transition_to(status));
        }
    }

    #[test]
    fn test_order_status_parse_and_display() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>(), Ok(status));
        }
        assert!("lost".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_order_status_serde_snake_case() {
        let json = serde_json::to_string(&OrderStatus::PendingPayment).unwrap_or_default();
        assert_eq!(json, "\"pending_payment\"");
    }

    #[test]
    fn test_role_ordering() {
        assert!(UserRole::Admin.at_least(UserRole::Staff));
        assert!(UserRole::Staff.at_least(UserRole::Staff));
        assert!(!UserRole::Customer.at_least(UserRole::Staff));
        assert_eq!("staff".parse::<UserRole>(), Ok(UserRole::Staff));
        assert_eq!(UserRole::Admin.to_string(), "admin");
    }
}
