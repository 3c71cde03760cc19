//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use texos_core::db::PgStore;
use texos_core::gateway::GatewayError;
use texos_core::paystack::PaystackClient;

use crate::config::AdminConfig;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AdminConfig,
    store: PgStore,
    gateway: PaystackClient,
}

impl AppState {
    /// # Errors
    ///
    /// Returns an error if the gateway client cannot be built.
    pub fn new(config: AdminConfig, pool: PgPool) -> Result<Self, GatewayError> {
        let gateway = PaystackClient::new(&config.paystack)?;
        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                store: PgStore::new(pool),
                gateway,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &AdminConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        self.inner.store.pool()
    }

    #[must_use]
    pub fn store(&self) -> &PgStore {
        &self.inner.store
    }

    /// Used only for staff-triggered reconciliation.
    #[must_use]
    pub fn gateway(&self) -> &PaystackClient {
        &self.inner.gateway
    }
}
