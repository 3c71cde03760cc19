//! Cart pricing.
//!
//! [`compute_totals`] is pure: the caller fetches a [`PricingSettings`]
//! snapshot at the top of each request and passes it in.

use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::models::Setting;
use crate::types::round_money;

pub const FREE_DELIVERY_THRESHOLD_KEY: &str = "FREE_DELIVERY_THRESHOLD";
pub const DELIVERY_FEE_KEY: &str = "DELIVERY_FEE";

/// Settings snapshot consumed by the pricing function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingSettings {
    pub free_delivery_threshold: Decimal,
    pub delivery_fee: Decimal,
}

impl Default for PricingSettings {
    fn default() -> Self {
        Self {
            free_delivery_threshold: Decimal::from(100_000),
            delivery_fee: Decimal::ZERO,
        }
    }
}

impl PricingSettings {
    /// Parse the pricing keys out of the settings table contents.
    ///
    /// Missing or unparsable values fall back to the defaults with a warning;
    /// a bad settings row must not take the cart down.
    #[must_use]
    pub fn from_settings(settings: &[Setting]) -> Self {
        let defaults = Self::default();
        let lookup = |key: &str, fallback: Decimal| {
            settings
                .iter()
                .find(|s| s.key == key)
                .map_or(fallback, |s| match Decimal::from_str(s.value.trim()) {
                    Ok(value) if value >= Decimal::ZERO => value,
                    _ => {
                        tracing::warn!(key, value = %s.value, "Invalid pricing setting, using default");
                        fallback
                    }
                })
        };

        Self {
            free_delivery_threshold: lookup(
                FREE_DELIVERY_THRESHOLD_KEY,
                defaults.free_delivery_threshold,
            ),
            delivery_fee: lookup(DELIVERY_FEE_KEY, defaults.delivery_fee),
        }
    }
}

/// Derived cart totals. All money values are rounded to 2 dp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartTotals {
    pub item_count: i64,
    pub subtotal: Decimal,
    pub delivery_fee: Decimal,
    pub total: Decimal,
    pub free_delivery_threshold: Decimal,
    /// `min(subtotal / threshold, 1)`, truncated to 4 dp so it only reads 1
    /// once delivery is actually free.
    pub free_delivery_progress: Decimal,
    pub amount_to_free_delivery: Decimal,
}

/// Compute cart totals from `(unit_price, quantity)` pairs.
pub fn compute_totals<I>(items: I, settings: &PricingSettings) -> CartTotals
where
    I: IntoIterator<Item = (Decimal, i32)>,
{
    let (subtotal, item_count) = items
        .into_iter()
        .fold((Decimal::ZERO, 0_i64), |(sum, count), (price, qty)| {
            (sum + price * Decimal::from(qty), count + i64::from(qty))
        });
    let subtotal = round_money(subtotal);

    let threshold = settings.free_delivery_threshold;
    let delivery_fee = if subtotal >= threshold {
        Decimal::ZERO
    } else {
        round_money(settings.delivery_fee)
    };

    let free_delivery_progress = if threshold <= Decimal::ZERO {
        Decimal::ONE
    } else {
        (subtotal / threshold)
            .min(Decimal::ONE)
            .round_dp_with_strategy(4, RoundingStrategy::ToZero)
    };

    CartTotals {
        item_count,
        subtotal,
        delivery_fee,
        total: round_money(subtotal + delivery_fee),
        free_delivery_threshold: threshold,
        free_delivery_progress,
        amount_to_free_delivery: round_money((threshold - subtotal).max(Decimal::ZERO)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn settings(threshold: &str, fee: &str) -> PricingSettings {
        PricingSettings {
            free_delivery_threshold: dec(threshold),
            delivery_fee: dec(fee),
        }
    }

    #[test]
    fn test_exactly_at_threshold_is_free() {
        let totals = compute_totals([(dec("25000"), 4)], &settings("100000", "2500"));
        assert_eq!(totals.subtotal, dec("100000"));
        assert_eq!(totals.delivery_fee, Decimal::ZERO);
        assert_eq!(totals.total, dec("100000"));
        assert_eq!(totals.free_delivery_progress, Decimal::ONE);
        assert_eq!(totals.amount_to_free_delivery, Decimal::ZERO);
    }

    #[test]
    fn test_one_unit_below_threshold_pays_fee() {
        let totals = compute_totals([(dec("99999"), 1)], &settings("100000", "2500"));
        assert_eq!(totals.delivery_fee, dec("2500"));
        assert_eq!(totals.total, dec("102499"));
        assert_eq!(totals.amount_to_free_delivery, dec("1"));
        assert!(totals.free_delivery_progress < Decimal::ONE);
    }

    #[test]
    fn test_rounds_rather_than_truncates() {
        let totals = compute_totals(
            [(dec("10.005"), 1), (dec("0.001"), 1)],
            &settings("1000", "0"),
        );
        assert_eq!(totals.subtotal, dec("10.01"));
    }

    #[test]
    fn test_progress_is_capped_and_counts_items() {
        let totals = compute_totals(
            [(dec("300"), 2), (dec("50"), 3)],
            &settings("500", "100"),
        );
        assert_eq!(totals.item_count, 5);
        assert_eq!(totals.subtotal, dec("750"));
        assert_eq!(totals.free_delivery_progress, Decimal::ONE);
    }

    #[test]
    fn test_zero_threshold_never_divides() {
        let totals = compute_totals(Vec::new(), &settings("0", "500"));
        assert_eq!(totals.subtotal, Decimal::ZERO);
        assert_eq!(totals.delivery_fee, Decimal::ZERO);
        assert_eq!(totals.free_delivery_progress, Decimal::ONE);
    }

    #[test]
    fn test_settings_parse_with_fallback() {
        let now = Utc::now();
        let rows = vec![
            Setting {
                key: FREE_DELIVERY_THRESHOLD_KEY.into(),
                value: " 50000 ".into(),
                updated_at: now,
            },
            Setting {
                key: DELIVERY_FEE_KEY.into(),
                value: "free".into(),
                updated_at: now,
            },
        ];
        let parsed = PricingSettings::from_settings(&rows);
        assert_eq!(parsed.free_delivery_threshold, dec("50000"));
        assert_eq!(parsed.delivery_fee, Decimal::ZERO);
    }
}
