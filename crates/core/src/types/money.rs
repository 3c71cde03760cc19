//! Monetary helpers.
//!
//! Amounts are `Decimal` in major units (naira) everywhere inside the
//! workspace. The payment gateway speaks minor units (kobo); conversion
//! happens only at that boundary.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Minor units per major unit.
const MINOR_PER_MAJOR: i64 = 100;

/// Round to two decimal places, half away from zero.
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Convert a major-unit amount to minor units, rounding to the nearest kobo.
///
/// Returns `None` if the amount does not fit in an `i64`.
#[must_use]
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    (round_money(amount) * Decimal::from(MINOR_PER_MAJOR)).to_i64()
}

/// Convert a minor-unit amount reported by the gateway back to major units.
#[must_use]
pub fn from_minor_units(minor: i64) -> Decimal {
    Decimal::new(minor, 2)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_round_money_uses_half_away_from_zero() {
        assert_eq!(round_money(dec("10.005")), dec("10.01"));
        assert_eq!(round_money(dec("10.004")), dec("10.00"));
        assert_eq!(round_money(dec("-2.345")), dec("-2.35"));
    }

    #[test]
    fn test_minor_unit_conversion() {
        assert_eq!(to_minor_units(dec("1500.50")), Some(150_050));
        assert_eq!(to_minor_units(dec("0.015")), Some(2));
        assert_eq!(from_minor_units(150_050), dec("1500.50"));
    }
}
