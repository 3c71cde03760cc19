use rust_decimal::Decimal;
use tracing::instrument;

use crate::error::{ShopError, ShopResult};
use crate::models::Setting;
use crate::pricing::{DELIVERY_FEE_KEY, FREE_DELIVERY_THRESHOLD_KEY, PricingSettings};
use crate::store::ShopStore;

/// Key/value settings and the pricing snapshot derived from them.
pub struct SettingsService<'a, S> {
    store: &'a S,
}

impl<'a, S: ShopStore> SettingsService<'a, S> {
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// # Errors
    ///
    /// Store failures only.
    pub async fn all(&self) -> ShopResult<Vec<Setting>> {
        Ok(self.store.settings().await?)
    }

    /// # Errors
    ///
    /// `NotFound` for keys that do not exist.
    pub async fn get(&self, key: &str) -> ShopResult<Setting> {
        self.store
            .setting(key)
            .await?
            .ok_or_else(|| ShopError::not_found("Setting"))
    }

    /// Fresh pricing snapshot. Called at the top of every pricing request.
    ///
    /// # Errors
    ///
    /// Store failures only.
    pub async fn pricing(&self) -> ShopResult<PricingSettings> {
        let rows = self.store.settings().await?;
        Ok(PricingSettings::from_settings(&rows))
    }

    /// # Errors
    ///
    /// `NotFound` for keys that do not exist.
    #[instrument(skip(self))]
    pub async fn update(&self, key: &str, value: &str) -> ShopResult<Setting> {
        self.store
            .update_setting(key, value)
            .await?
            .ok_or_else(|| ShopError::not_found("Setting"))
    }

    /// Write both pricing settings.
    ///
    /// # Errors
    ///
    /// `Validation` for negative amounts.
    #[instrument(skip(self))]
    pub async fn update_pricing(&self, pricing: PricingSettings) -> ShopResult<PricingSettings> {
        if pricing.free_delivery_threshold < Decimal::ZERO || pricing.delivery_fee < Decimal::ZERO {
            return Err(ShopError::Validation(
                "Delivery settings must be non-negative numbers".to_owned(),
            ));
        }

        self.update(
            FREE_DELIVERY_THRESHOLD_KEY,
            &pricing.free_delivery_threshold.normalize().to_string(),
        )
        .await?;
        self.update(DELIVERY_FEE_KEY, &pricing.delivery_fee.normalize().to_string())
            .await?;
        tracing::info!(
            threshold = %pricing.free_delivery_threshold,
            fee = %pricing.delivery_fee,
            "Pricing settings updated"
        );
        self.pricing().await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_update_pricing_roundtrips_through_store() {
        let store = MemoryStore::new();
        let settings = SettingsService::new(&store);

        let updated = settings
            .update_pricing(PricingSettings {
                free_delivery_threshold: Decimal::from(50_000),
                delivery_fee: Decimal::new(150_050, 2),
            })
            .await
            .unwrap();
        assert_eq!(updated.free_delivery_threshold, Decimal::from(50_000));
        assert_eq!(updated.delivery_fee, Decimal::new(150_050, 2));
    }

    #[tokio::test]
    async fn test_negative_fee_rejected() {
        let store = MemoryStore::new();
        let err = SettingsService::new(&store)
            .update_pricing(PricingSettings {
                free_delivery_threshold: Decimal::ONE,
                delivery_fee: Decimal::NEGATIVE_ONE,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ShopError::Validation(_)));
    }

    #[tokio::test]
    async fn test_unknown_key_not_found() {
        let store = MemoryStore::new();
        let err = SettingsService::new(&store)
            .update("TAX_RATE", "7.5")
            .await
            .unwrap_err();
        assert!(matches!(err, ShopError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_get_reads_seeded_defaults() {
        let store = MemoryStore::new();
        let settings = SettingsService::new(&store);
        assert!(settings.get(DELIVERY_FEE_KEY).await.is_ok());
        assert!(matches!(
            settings.get("TAX_RATE").await,
            Err(ShopError::NotFound(_))
        ));
    }
}
