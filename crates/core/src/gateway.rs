//! Payment gateway contract.
//!
//! The engines only talk to the gateway through [`PaymentGateway`]; the
//! Paystack client is one implementation, the integration tests provide a
//! scripted one.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Email, GatewayStatus};

#[derive(Debug, Error)]
pub enum GatewayError {
    /// The call did not complete in time. The outcome is unknown, not failed.
    #[error("payment gateway timed out")]
    Timeout,

    #[error("payment gateway transport error: {0}")]
    Transport(String),

    /// The gateway answered but refused the request.
    #[error("payment gateway rejected request: {0}")]
    Rejected(String),

    #[error("payment gateway returned an invalid response: {0}")]
    InvalidResponse(String),
}

/// Request to start a payment. `amount_minor` is in kobo.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentInit {
    pub email: Email,
    pub amount_minor: i64,
    pub reference: String,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitializedPayment {
    pub reference: String,
    pub authorization_url: Option<String>,
    pub access_code: Option<String>,
}

/// Server-to-gateway confirmation of a payment attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayVerification {
    pub status: GatewayStatus,
    pub amount_minor: i64,
    pub gateway_response: Option<String>,
    pub raw: serde_json::Value,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn initialize(&self, request: &PaymentInit) -> Result<InitializedPayment, GatewayError>;

    /// The gateway is the only trusted source of payment truth.
    async fn verify(&self, reference: &str) -> Result<GatewayVerification, GatewayError>;
}

/// Generate a fresh payment reference.
#[must_use]
pub fn new_reference() -> String {
    format!("TX{}", uuid::Uuid::new_v4().simple())
}

/// References arrive from clients on the verify path; only accept the
/// gateway's character set.
#[must_use]
pub fn is_valid_reference(reference: &str) -> bool {
    !reference.is_empty()
        && reference.len() <= 100
        && reference
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b'.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_references_are_valid_and_unique() {
        let a = new_reference();
        let b = new_reference();
        assert!(a.starts_with("TX"));
        assert!(is_valid_reference(&a));
        assert_ne!(a, b);
    }

    #[test]
    fn test_reference_validation() {
        assert!(is_valid_reference("T685312322670591"));
        assert!(!is_valid_reference(""));
        assert!(!is_valid_reference("../../transaction"));
        assert!(!is_valid_reference(&"x".repeat(101)));
    }
}
