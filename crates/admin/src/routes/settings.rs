//! Shop settings routes.

use axum::{Json, extract::State};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use texos_core::models::Setting;
use texos_core::pricing::PricingSettings;
use texos_core::services::SettingsService;

use crate::error::{AppError, Result};
use crate::middleware::{RequireAdminAuth, RequireWriteAccess};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    pub settings: Vec<Setting>,
    pub pricing: PricingSettings,
}

/// Pricing update. Numbers may be sent as JSON numbers or strings;
/// omitted fields keep their current value.
#[derive(Debug, Deserialize)]
pub struct PricingUpdate {
    #[serde(default, alias = "FREE_DELIVERY_THRESHOLD", alias = "freeDeliveryThreshold")]
    pub free_delivery_threshold: Option<Decimal>,
    #[serde(default, alias = "DELIVERY_FEE", alias = "deliveryFee")]
    pub delivery_fee: Option<Decimal>,
}

impl PricingUpdate {
    fn apply_to(self, current: PricingSettings) -> Result<PricingSettings> {
        if self.free_delivery_threshold.is_none() && self.delivery_fee.is_none() {
            return Err(AppError::BadRequest(
                "Provide free_delivery_threshold and/or delivery_fee".to_owned(),
            ));
        }
        Ok(PricingSettings {
            free_delivery_threshold: self
                .free_delivery_threshold
                .unwrap_or(current.free_delivery_threshold),
            delivery_fee: self.delivery_fee.unwrap_or(current.delivery_fee),
        })
    }
}

pub async fn show(
    RequireAdminAuth(_admin): RequireAdminAuth,
    State(state): State<AppState>,
) -> Result<Json<SettingsResponse>> {
    let settings = SettingsService::new(state.store());
    Ok(Json(SettingsResponse {
        settings: settings.all().await?,
        pricing: settings.pricing().await?,
    }))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn update(
    RequireWriteAccess(admin): RequireWriteAccess,
    State(state): State<AppState>,
    Json(body): Json<PricingUpdate>,
) -> Result<Json<SettingsResponse>> {
    let settings = SettingsService::new(state.store());
    let pricing = body.apply_to(settings.pricing().await?)?;
    let pricing = settings.update_pricing(pricing).await?;
    Ok(Json(SettingsResponse {
        settings: settings.all().await?,
        pricing,
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_update_accepts_strings_and_numbers() {
        let body: PricingUpdate =
            serde_json::from_str(r#"{"FREE_DELIVERY_THRESHOLD": "50000", "delivery_fee": 1500}"#)
                .unwrap();
        let pricing = body.apply_to(PricingSettings::default()).unwrap();
        assert_eq!(pricing.free_delivery_threshold, Decimal::from(50_000));
        assert_eq!(pricing.delivery_fee, Decimal::from(1_500));
    }

    #[test]
    fn test_partial_update_keeps_current_values() {
        let body: PricingUpdate = serde_json::from_str(r#"{"delivery_fee": "2500.50"}"#).unwrap();
        let current = PricingSettings {
            free_delivery_threshold: Decimal::from(80_000),
            delivery_fee: Decimal::ZERO,
        };
        let pricing = body.apply_to(current).unwrap();
        assert_eq!(pricing.free_delivery_threshold, Decimal::from(80_000));
        assert_eq!(pricing.delivery_fee, Decimal::new(250_050, 2));
    }

    #[test]
    fn test_non_numeric_value_is_rejected() {
        assert!(serde_json::from_str::<PricingUpdate>(r#"{"delivery_fee": "free"}"#).is_err());
    }

    #[test]
    fn test_empty_update_is_rejected() {
        let body: PricingUpdate = serde_json::from_str("{}").unwrap();
        assert!(body.apply_to(PricingSettings::default()).is_err());
    }
}
