//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use texos_core::db::PgStore;
use texos_core::gateway::GatewayError;
use texos_core::paystack::PaystackClient;

use crate::config::StorefrontConfig;
use crate::services::email::EmailService;

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("payment gateway client: {0}")]
    Gateway(#[from] GatewayError),
    #[error("SMTP transport: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`; payment handlers clone it into the task
/// that runs reconciliation.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    store: PgStore,
    gateway: PaystackClient,
    mailer: Option<EmailService>,
}

impl AppState {
    /// # Errors
    ///
    /// Returns an error if the gateway client or the SMTP transport cannot
    /// be built.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, StateError> {
        let gateway = PaystackClient::new(&config.paystack)?;
        let mailer = config.smtp.as_ref().map(EmailService::new).transpose()?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                store: PgStore::new(pool),
                gateway,
                mailer,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        self.inner.store.pool()
    }

    /// Commerce store over the shared pool.
    #[must_use]
    pub fn store(&self) -> &PgStore {
        &self.inner.store
    }

    #[must_use]
    pub fn gateway(&self) -> &PaystackClient {
        &self.inner.gateway
    }

    #[must_use]
    pub fn mailer(&self) -> Option<&EmailService> {
        self.inner.mailer.as_ref()
    }

    /// Webhook HMAC key; Paystack signs with the account secret key.
    #[must_use]
    pub fn webhook_secret(&self) -> &secrecy::SecretString {
        &self.inner.config.paystack.secret_key
    }
}
