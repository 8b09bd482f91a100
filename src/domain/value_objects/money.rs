//! Monetary rounding conventions shared by the line builder and engine.
//!
//! Internal arithmetic runs at 4 fractional digits; anything persisted,
//! hashed, or returned to a caller is rounded half-up to 2 (§4.2).

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Internal working precision (4 decimal places).
pub const INTERNAL_SCALE: u32 = 4;

/// Persistence/output precision (2 decimal places, i.e. cents).
pub const OUTPUT_SCALE: u32 = 2;

/// Round to cents, half-up, matching `ROUND_HALF_UP` in the original
/// Python implementation (Rust's default `round_dp` is banker's rounding,
/// so this must go through `round_dp_with_strategy`).
pub fn round_to_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(
        OUTPUT_SCALE,
        rust_decimal::RoundingStrategy::MidpointAwayFromZero,
    )
}

/// Round to the internal 4-decimal working precision.
pub fn round_internal(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(
        INTERNAL_SCALE,
        rust_decimal::RoundingStrategy::MidpointAwayFromZero,
    )
}

/// Canonical 2-decimal string form used inside hash preimages, so that
/// `1` and `1.00` and `1.000` all hash identically.
pub fn cents_string(amount: Decimal) -> String {
    format!("{:.2}", round_to_cents(amount))
}

pub const ZERO: Decimal = dec!(0);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_up_rounds_away_from_zero_not_to_even() {
        // Banker's rounding would send 0.125 to 0.12; half-up sends it to 0.13.
        assert_eq!(round_to_cents(dec!(0.125)), dec!(0.13));
        assert_eq!(round_to_cents(dec!(-0.125)), dec!(-0.13));
    }

    #[test]
    fn cents_string_is_canonical() {
        assert_eq!(cents_string(dec!(1)), "1.00");
        assert_eq!(cents_string(dec!(1.005)), "1.01");
    }
}
