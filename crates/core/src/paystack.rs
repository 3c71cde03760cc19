//! Paystack API client.
//!
//! # API Reference
//!
//! - Base URL: `https://api.paystack.co`
//! - Authentication: `Authorization: Bearer <secret key>`
//! - Amounts are integers in kobo; the currency is always `NGN`

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::env::{self, ConfigError};
use crate::gateway::{
    GatewayError, GatewayVerification, InitializedPayment, PaymentGateway, PaymentInit,
};
use crate::types::GatewayStatus;

pub const DEFAULT_BASE_URL: &str = "https://api.paystack.co";

const CURRENCY: &str = "NGN";

#[derive(Clone)]
pub struct PaystackConfig {
    pub base_url: String,
    pub secret_key: SecretString,
    pub callback_url: Option<String>,
    pub timeout: Duration,
}

impl std::fmt::Debug for PaystackConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaystackConfig")
            .field("base_url", &self.base_url)
            .field("secret_key", &"[REDACTED]")
            .field("callback_url", &self.callback_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl PaystackConfig {
    /// Read the `PAYSTACK_*` variables. Both binaries share them; only the
    /// storefront initializes payments and so reads the callback URL.
    ///
    /// # Errors
    ///
    /// Missing or weak secret key, bad URL or timeout.
    pub fn from_env(with_callback: bool) -> Result<Self, ConfigError> {
        let callback_url = if with_callback {
            env::optional("PAYSTACK_CALLBACK_URL")
                .map(|_| env::url("PAYSTACK_CALLBACK_URL"))
                .transpose()?
        } else {
            None
        };

        Ok(Self {
            base_url: env::url_or("PAYSTACK_BASE_URL", Some(DEFAULT_BASE_URL))?,
            secret_key: env::secret("PAYSTACK_SECRET_KEY")?,
            callback_url,
            timeout: Duration::from_secs(env::parse_or("PAYSTACK_TIMEOUT_SECS", 10)?),
        })
    }
}

/// Every Paystack response wraps its payload the same way.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: bool,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

#[derive(Debug, Serialize)]
struct InitializeBody<'a> {
    email: &'a str,
    amount: i64,
    reference: &'a str,
    currency: &'static str,
    channels: [&'static str; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    callback_url: Option<&'a str>,
    metadata: &'a serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct InitializeData {
    reference: String,
    authorization_url: Option<String>,
    access_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VerifyData {
    status: String,
    amount: i64,
    gateway_response: Option<String>,
}

#[derive(Clone)]
pub struct PaystackClient {
    inner: Arc<PaystackClientInner>,
}

struct PaystackClientInner {
    client: reqwest::Client,
    base_url: String,
    callback_url: Option<String>,
}

impl PaystackClient {
    /// # Errors
    ///
    /// Returns `GatewayError::Transport` if the HTTP client fails to build
    /// or the secret key is not a valid header value.
    pub fn new(config: &PaystackConfig) -> Result<Self, GatewayError> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!(
            "Bearer {}",
            config.secret_key.expose_secret()
        ))
        .map_err(|e| GatewayError::Transport(format!("invalid secret key format: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Ok(Self {
            inner: Arc::new(PaystackClientInner {
                client,
                base_url: config.base_url.trim_end_matches('/').to_owned(),
                callback_url: config.callback_url.clone(),
            }),
        })
    }

    async fn handle_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<(T, serde_json::Value), GatewayError> {
        let status = response.status();
        let raw: serde_json::Value = response.json().await.map_err(request_error)?;

        let envelope: Envelope<serde_json::Value> = serde_json::from_value(raw.clone())
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        if !status.is_success() || !envelope.status {
            return Err(GatewayError::Rejected(if envelope.message.is_empty() {
                format!("HTTP {}", status.as_u16())
            } else {
                envelope.message
            }));
        }

        let data = envelope
            .data
            .ok_or_else(|| GatewayError::InvalidResponse("missing data".to_owned()))?;
        let data = serde_json::from_value(data)
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        Ok((data, raw))
    }
}

fn request_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout
    } else if e.is_decode() {
        GatewayError::InvalidResponse(e.to_string())
    } else {
        GatewayError::Transport(e.to_string())
    }
}

#[async_trait]
impl PaymentGateway for PaystackClient {
    #[tracing::instrument(skip(self, request), fields(reference = %request.reference))]
    async fn initialize(&self, request: &PaymentInit) -> Result<InitializedPayment, GatewayError> {
        let body = InitializeBody {
            email: request.email.as_str(),
            amount: request.amount_minor,
            reference: &request.reference,
            currency: CURRENCY,
            channels: ["card"],
            callback_url: self.inner.callback_url.as_deref(),
            metadata: &request.metadata,
        };

        let response = self
            .inner
            .client
            .post(format!("{}/transaction/initialize", self.inner.base_url))
            .json(&body)
            .send()
            .await
            .map_err(request_error)?;

        let (data, _) = Self::handle_response::<InitializeData>(response).await?;
        Ok(InitializedPayment {
            reference: data.reference,
            authorization_url: data.authorization_url,
            access_code: data.access_code,
        })
    }

    #[tracing::instrument(skip(self))]
    async fn verify(&self, reference: &str) -> Result<GatewayVerification, GatewayError> {
        let response = self
            .inner
            .client
            .get(format!(
                "{}/transaction/verify/{reference}",
                self.inner.base_url
            ))
            .send()
            .await
            .map_err(request_error)?;

        let (data, raw) = Self::handle_response::<VerifyData>(response).await?;
        Ok(GatewayVerification {
            status: GatewayStatus::from_gateway(&data.status),
            amount_minor: data.amount,
            gateway_response: data.gateway_response,
            raw,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_parses_verify_payload() {
        let raw = serde_json::json!({
            "status": true,
            "message": "Verification successful",
            "data": {
                "status": "success",
                "amount": 420_000,
                "reference": "TXabc",
                "gateway_response": "Approved"
            }
        });
        let envelope: Envelope<VerifyData> = serde_json::from_value(raw).unwrap();
        let data = envelope.data.unwrap();
        assert_eq!(data.amount, 420_000);
        assert_eq!(GatewayStatus::from_gateway(&data.status), GatewayStatus::Success);
    }

    #[test]
    fn test_initialize_body_is_naira_card_only() {
        let metadata = serde_json::json!({ "order_id": 9 });
        let body = InitializeBody {
            email: "ada@example.com",
            amount: 150_000,
            reference: "TXabc",
            currency: CURRENCY,
            channels: ["card"],
            callback_url: None,
            metadata: &metadata,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["currency"], "NGN");
        assert_eq!(json["channels"][0], "card");
        assert!(json.get("callback_url").is_none());
    }

    #[test]
    fn test_config_debug_redacts_key() {
        let config = PaystackConfig {
            base_url: DEFAULT_BASE_URL.to_owned(),
            secret_key: SecretString::from("sk_live_secret"),
            callback_url: None,
            timeout: Duration::from_secs(10),
        };
        assert!(!format!("{config:?}").contains("sk_live_secret"));
    }
}
