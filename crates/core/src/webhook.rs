//! Inbound payment webhooks.
//!
//! The provider signs the raw body with HMAC-SHA512 using the shared secret
//! and sends the hex digest in the `x-paystack-signature` header. The
//! signature is checked before any field of the body is looked at.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha512;
use thiserror::Error;

use crate::types::{OrderId, OrderStatus, TransactionStatus};

pub const SIGNATURE_HEADER: &str = "x-paystack-signature";

type HmacSha512 = Hmac<Sha512>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WebhookError {
    #[error("missing webhook signature")]
    MissingSignature,
    #[error("invalid webhook signature")]
    InvalidSignature,
    #[error("malformed webhook body: {0}")]
    Malformed(String),
}

/// Hex HMAC-SHA512 of `body`, as the provider computes it.
///
/// # Errors
///
/// Returns [`WebhookError::InvalidSignature`] if the key is rejected.
pub fn sign(secret: &[u8], body: &[u8]) -> Result<String, WebhookError> {
    let mut mac =
        HmacSha512::new_from_slice(secret).map_err(|_| WebhookError::InvalidSignature)?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verify a webhook signature in constant time.
///
/// # Errors
///
/// Returns [`WebhookError::MissingSignature`] for an empty header and
/// [`WebhookError::InvalidSignature`] when the digest does not match.
pub fn verify_signature(secret: &[u8], body: &[u8], signature: &str) -> Result<(), WebhookError> {
    let signature = signature.trim();
    if signature.is_empty() {
        return Err(WebhookError::MissingSignature);
    }
    let expected = hex::decode(signature).map_err(|_| WebhookError::InvalidSignature)?;

    let mut mac =
        HmacSha512::new_from_slice(secret).map_err(|_| WebhookError::InvalidSignature)?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| WebhookError::InvalidSignature)
}

/// A parsed webhook event. Only the fields reconciliation needs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    #[serde(default)]
    pub data: WebhookData,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WebhookData {
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// Dispute and refund payloads nest the charge under `transaction`.
    #[serde(default)]
    pub transaction: Option<NestedCharge>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NestedCharge {
    #[serde(default)]
    pub reference: Option<String>,
}

impl WebhookEvent {
    /// Parse a verified body.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookError::Malformed`] if the body is not JSON or has
    /// no `event` field.
    pub fn parse(body: &[u8]) -> Result<Self, WebhookError> {
        serde_json::from_slice(body).map_err(|e| WebhookError::Malformed(e.to_string()))
    }

    #[must_use]
    pub fn kind(&self) -> EventKind {
        EventKind::from_name(&self.event)
    }

    /// Charge reference, wherever the event type puts it.
    #[must_use]
    pub fn reference(&self) -> Option<&str> {
        self.data
            .reference
            .as_deref()
            .or_else(|| {
                self.data
                    .transaction
                    .as_ref()
                    .and_then(|t| t.reference.as_deref())
            })
            .filter(|r| !r.is_empty())
    }

    /// Order id from the metadata attached at initialization. Accepts a
    /// number or a numeric string, and metadata sent as a JSON string.
    #[must_use]
    pub fn order_hint(&self) -> Option<OrderId> {
        let metadata = match &self.data.metadata {
            serde_json::Value::String(s) => serde_json::from_str(s).ok()?,
            other => other.clone(),
        };
        match metadata.get("order_id")? {
            serde_json::Value::Number(n) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        }
        .map(OrderId::new)
    }
}

/// Webhook event types the shop reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    ChargeSuccess,
    ChargeFailed,
    DisputeCreate,
    DisputeRemind,
    DisputeResolve,
    RefundPending,
    RefundProcessed,
    RefundFailed,
    ChargeReversed,
    Unknown,
}

/// Fixed effect of a dispute/refund event. These never touch stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventEffect {
    /// New stored transaction status, if the event changes it.
    pub transaction: Option<TransactionStatus>,
    /// Target order status and the states it may be entered from.
    pub order: OrderStatus,
    pub from: &'static [OrderStatus],
}

impl EventKind {
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            "charge.success" => Self::ChargeSuccess,
            "charge.failed" => Self::ChargeFailed,
            "charge.dispute.create" | "dispute.create" => Self::DisputeCreate,
            "charge.dispute.remind" | "dispute.remind" | "dispute.escalate" => {
                Self::DisputeRemind
            }
            "charge.dispute.resolve" | "dispute.resolve" => Self::DisputeResolve,
            "refund.pending" => Self::RefundPending,
            "refund.processed" => Self::RefundProcessed,
            "refund.failed" => Self::RefundFailed,
            "charge.reversed" => Self::ChargeReversed,
            _ => Self::Unknown,
        }
    }

    /// Whether the event is a charge outcome that must be confirmed against
    /// the gateway through reconciliation.
    #[must_use]
    pub const fn needs_verification(self) -> bool {
        matches!(self, Self::ChargeSuccess | Self::ChargeFailed)
    }

    /// Status table for dispute, refund and reversal events.
    #[must_use]
    pub const fn effect(self) -> Option<EventEffect> {
        use OrderStatus::{Disputed, Paid, RefundPending, Refunded};

        let effect = match self {
            Self::DisputeCreate | Self::DisputeRemind => EventEffect {
                transaction: Some(TransactionStatus::Disputed),
                order: Disputed,
                from: &[Paid],
            },
            Self::DisputeResolve => EventEffect {
                transaction: Some(TransactionStatus::Success),
                order: Paid,
                from: &[Disputed],
            },
            Self::RefundPending => EventEffect {
                transaction: None,
                order: RefundPending,
                from: &[Paid],
            },
            Self::RefundProcessed => EventEffect {
                transaction: Some(TransactionStatus::Refunded),
                order: Refunded,
                from: &[Paid, RefundPending, Disputed],
            },
            Self::RefundFailed => EventEffect {
                transaction: Some(TransactionStatus::Success),
                order: Paid,
                from: &[RefundPending],
            },
            Self::ChargeReversed => EventEffect {
                transaction: Some(TransactionStatus::Reversed),
                order: Refunded,
                from: &[Paid, RefundPending, Disputed],
            },
            Self::ChargeSuccess | Self::ChargeFailed | Self::Unknown => return None,
        };
        Some(effect)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"sk_test_4f0c1d2e3a4b5c6d7e8f9a0b1c2d3e4f";

    #[test]
    fn test_valid_signature_accepted() {
        let body = br#"{"event":"charge.success","data":{"reference":"TX1"}}"#;
        let signature = sign(SECRET, body).unwrap();
        assert_eq!(signature.len(), 128);
        assert!(verify_signature(SECRET, body, &signature).is_ok());
    }

    #[test]
    fn test_tampered_body_rejected() {
        let body = br#"{"event":"charge.success","data":{"reference":"TX1"}}"#;
        let signature = sign(SECRET, body).unwrap();
        let tampered = br#"{"event":"charge.success","data":{"reference":"TX2"}}"#;
        assert_eq!(
            verify_signature(SECRET, tampered, &signature),
            Err(WebhookError::InvalidSignature)
        );
    }

    #[test]
    fn test_wrong_secret_and_garbage_rejected() {
        let body = b"{}";
        let signature = sign(b"another-secret", body).unwrap();
        assert_eq!(
            verify_signature(SECRET, body, &signature),
            Err(WebhookError::InvalidSignature)
        );
        assert_eq!(
            verify_signature(SECRET, body, "not-hex"),
            Err(WebhookError::InvalidSignature)
        );
        assert_eq!(
            verify_signature(SECRET, body, ""),
            Err(WebhookError::MissingSignature)
        );
    }

    #[test]
    fn test_parse_rejects_bodies_without_event() {
        assert!(WebhookEvent::parse(b"not json").is_err());
        assert!(WebhookEvent::parse(br#"{"data":{}}"#).is_err());
    }

    #[test]
    fn test_order_hint_from_metadata_shapes() {
        let numeric = WebhookEvent::parse(
            br#"{"event":"charge.success","data":{"reference":"TX1","metadata":{"order_id":17}}}"#,
        )
        .unwrap();
        assert_eq!(numeric.order_hint(), Some(OrderId::new(17)));

        let stringly = WebhookEvent::parse(
            br#"{"event":"charge.success","data":{"metadata":"{\"order_id\":\"18\"}"}}"#,
        )
        .unwrap();
        assert_eq!(stringly.order_hint(), Some(OrderId::new(18)));
        assert_eq!(stringly.reference(), None);
    }

    #[test]
    fn test_nested_reference_for_disputes() {
        let event = WebhookEvent::parse(
            br#"{"event":"charge.dispute.create","data":{"transaction":{"reference":"TX9"}}}"#,
        )
        .unwrap();
        assert_eq!(event.kind(), EventKind::DisputeCreate);
        assert_eq!(event.reference(), Some("TX9"));
    }

    #[test]
    fn test_event_table() {
        assert!(EventKind::ChargeSuccess.effect().is_none());
        assert!(EventKind::ChargeFailed.needs_verification());

        let refund = EventKind::RefundProcessed.effect().unwrap();
        assert_eq!(refund.order, OrderStatus::Refunded);
        assert_eq!(refund.transaction, Some(TransactionStatus::Refunded));

        let resolved = EventKind::DisputeResolve.effect().unwrap();
        assert_eq!(resolved.order, OrderStatus::Paid);
        assert!(!resolved.from.contains(&OrderStatus::Pending));

        assert_eq!(EventKind::from_name("customer.created"), EventKind::Unknown);
    }
}
