//! Monetary rounding.
//!
//! All math uses `rust_decimal::Decimal`. Rounding happens only where a value
//! is fixed into a record (fees, averages), never on intermediate products.

use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// Round to `decimals` places, halves away from zero.
pub fn round_currency(value: Decimal, decimals: u32) -> Decimal {
    value.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero)
}

/// Round to the nearest whole currency unit.
pub fn round_whole(value: Decimal) -> Decimal {
    round_currency(value, 0)
}

/// Read a JSON number into an exact decimal.
///
/// Goes through the number's textual form, so `2300.5` stays `2300.5`
/// instead of picking up binary float noise.
pub(crate) fn decimal_from_json(n: &serde_json::Number) -> Option<Decimal> {
    let text = n.to_string();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}
