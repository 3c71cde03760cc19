//! Persisted status vocabularies and the order state machine.

use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when a stored or submitted status name is unknown.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} status: {value}")]
pub struct UnknownStatus {
    pub kind: &'static str,
    pub value: String,
}

/// Order lifecycle status.
///
/// The names are rows in the `order_status` lookup table; this enum is the
/// typed view of those rows.
///
/// ```text
/// pending ──► paid ──► refund_pending ──► refunded
///    │         │  ▲          │
///    │         │  └──────────┘ (refund failed)
///    │         ▼
///    │      disputed ──► paid (resolved) | refunded
///    ▼
/// cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Paid,
    Cancelled,
    Disputed,
    RefundPending,
    Refunded,
}

impl OrderStatus {
    pub const ALL: [Self; 6] = [
        Self::Pending,
        Self::Paid,
        Self::Cancelled,
        Self::Disputed,
        Self::RefundPending,
        Self::Refunded,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Cancelled => "cancelled",
            Self::Disputed => "disputed",
            Self::RefundPending => "refund_pending",
            Self::Refunded => "refunded",
        }
    }

    /// States an order may move into `self` from.
    #[must_use]
    pub const fn sources(self) -> &'static [Self] {
        match self {
            Self::Pending => &[],
            Self::Paid => &[Self::Pending, Self::Disputed, Self::RefundPending],
            Self::Cancelled => &[Self::Pending],
            Self::Disputed => &[Self::Paid],
            Self::RefundPending => &[Self::Paid],
            Self::Refunded => &[Self::Paid, Self::RefundPending, Self::Disputed],
        }
    }

    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        next.sources().contains(&self)
    }

    /// No further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Refunded)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus {
                kind: "order",
                value: s.to_owned(),
            })
    }
}

/// Stored status of one payment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
    Disputed,
    Refunded,
    Reversed,
}

impl TransactionStatus {
    pub const ALL: [Self; 6] = [
        Self::Pending,
        Self::Success,
        Self::Failed,
        Self::Disputed,
        Self::Refunded,
        Self::Reversed,
    ];

    /// The gateway has not confirmed money for this attempt yet.
    pub const UNSETTLED: &'static [Self] = &[Self::Pending, Self::Failed];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Disputed => "disputed",
            Self::Refunded => "refunded",
            Self::Reversed => "reversed",
        }
    }

    /// The gateway has confirmed money moved for this attempt at some
    /// point. Once settled, a repeated success signal must not re-run
    /// fulfillment side effects.
    #[must_use]
    pub const fn is_settled(self) -> bool {
        matches!(
            self,
            Self::Success | Self::Disputed | Self::Refunded | Self::Reversed
        )
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            "disputed" => Ok(Self::Disputed),
            "refunded" => Ok(Self::Refunded),
            "reversed" => Ok(Self::Reversed),
            other => Err(UnknownStatus {
                kind: "transaction",
                value: other.to_owned(),
            }),
        }
    }
}

/// Status as reported by the payment gateway's verify call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayStatus {
    Success,
    Failed,
    Abandoned,
    Reversed,
    /// Still in flight (`ongoing`, `processing`, `queued`, ...).
    Pending,
}

impl GatewayStatus {
    /// Map a raw gateway status string. Anything unrecognized is treated as
    /// still pending so it can never advance or cancel an order.
    #[must_use]
    pub fn from_gateway(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "success" => Self::Success,
            "failed" => Self::Failed,
            "abandoned" => Self::Abandoned,
            "reversed" => Self::Reversed,
            _ => Self::Pending,
        }
    }

    /// The transaction status to store for this gateway report.
    #[must_use]
    pub const fn transaction_status(self) -> TransactionStatus {
        match self {
            Self::Success => TransactionStatus::Success,
            Self::Failed | Self::Abandoned => TransactionStatus::Failed,
            Self::Reversed => TransactionStatus::Reversed,
            Self::Pending => TransactionStatus::Pending,
        }
    }
}

/// Admin role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AdminRole {
    SuperAdmin,
    #[default]
    Admin,
    /// Read-only access.
    Viewer,
}

impl AdminRole {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SuperAdmin => "super_admin",
            Self::Admin => "admin",
            Self::Viewer => "viewer",
        }
    }

    /// May change order status, reconcile payments and edit settings.
    #[must_use]
    pub const fn can_write(self) -> bool {
        matches!(self, Self::SuperAdmin | Self::Admin)
    }
}

impl fmt::Display for AdminRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdminRole {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "super_admin" => Ok(Self::SuperAdmin),
            "admin" => Ok(Self::Admin),
            "viewer" => Ok(Self::Viewer),
            other => Err(UnknownStatus {
                kind: "admin role",
                value: other.to_owned(),
            }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_state_machine_edges() {
        use OrderStatus::*;

        assert!(Pending.can_transition_to(Paid));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Paid.can_transition_to(Disputed));
        assert!(Paid.can_transition_to(RefundPending));
        assert!(RefundPending.can_transition_to(Refunded));
        assert!(Disputed.can_transition_to(Paid));
        assert!(Disputed.can_transition_to(Refunded));

        assert!(!Pending.can_transition_to(Refunded));
        assert!(!Cancelled.can_transition_to(Paid));
        assert!(!Paid.can_transition_to(Pending));
        assert!(!Paid.can_transition_to(Cancelled));
        assert!(!Refunded.can_transition_to(Paid));
    }

    #[test]
    fn test_nothing_returns_to_pending() {
        for status in OrderStatus::ALL {
            assert!(!status.can_transition_to(OrderStatus::Pending));
        }
    }

    #[test]
    fn test_order_status_names_roundtrip() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("shipped".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_settled_transaction_statuses() {
        assert!(TransactionStatus::Success.is_settled());
        assert!(TransactionStatus::Disputed.is_settled());
        assert!(!TransactionStatus::Pending.is_settled());
        assert!(!TransactionStatus::Failed.is_settled());
    }

    #[test]
    fn test_gateway_status_mapping() {
        assert_eq!(GatewayStatus::from_gateway("success"), GatewayStatus::Success);
        assert_eq!(GatewayStatus::from_gateway("abandoned"), GatewayStatus::Abandoned);
        assert_eq!(GatewayStatus::from_gateway("ongoing"), GatewayStatus::Pending);
        assert_eq!(GatewayStatus::from_gateway("weird"), GatewayStatus::Pending);
        assert_eq!(
            GatewayStatus::Abandoned.transaction_status(),
            TransactionStatus::Failed
        );
    }

    #[test]
    fn test_viewer_is_read_only() {
        assert!(!AdminRole::Viewer.can_write());
        assert!(AdminRole::Admin.can_write());
        assert_eq!("super_admin".parse::<AdminRole>().unwrap(), AdminRole::SuperAdmin);
    }
}
