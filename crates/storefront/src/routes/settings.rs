//! Public shop settings.

use axum::{Json, extract::State};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::instrument;

use texos_core::pricing::PricingSettings;
use texos_core::services::SettingsService;

use crate::error::Result;
use crate::state::AppState;

/// Delivery pricing under the settings-table key names, so a browser-held
/// guest cart can compute the same totals the server would.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeliverySettings {
    #[serde(rename = "FREE_DELIVERY_THRESHOLD")]
    pub free_delivery_threshold: Decimal,
    #[serde(rename = "DELIVERY_FEE")]
    pub delivery_fee: Decimal,
}

impl From<PricingSettings> for DeliverySettings {
    fn from(pricing: PricingSettings) -> Self {
        Self {
            free_delivery_threshold: pricing.free_delivery_threshold,
            delivery_fee: pricing.delivery_fee,
        }
    }
}

#[instrument(skip(state))]
pub async fn delivery(State(state): State<AppState>) -> Result<Json<DeliverySettings>> {
    let pricing = SettingsService::new(state.store()).pricing().await?;
    Ok(Json(pricing.into()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_settings_use_setting_keys() {
        let body = serde_json::to_value(DeliverySettings::from(PricingSettings::default())).unwrap();
        let object = body.as_object().unwrap();
        assert_eq!(object.len(), 2);
        assert_eq!(body["FREE_DELIVERY_THRESHOLD"], "100000");
        assert_eq!(body["DELIVERY_FEE"], "0");
    }
}
