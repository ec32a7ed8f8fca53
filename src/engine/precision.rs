//! Precision rules for order size and limit price.
//!
//! The venue rejects orders whose size carries more fractional digits than
//! the asset's `sizeDecimals`, and prices outside its tick regime: at most
//! five significant figures and `8 - sizeDecimals` fractional digits, with
//! whole units above 100 000. Always look `sizeDecimals` up per asset.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

/// Fractional-digit budget shared between size and price.
pub const MAX_DECIMALS: u32 = 8;

/// Prices above this trade in whole units.
pub const WHOLE_UNIT_PRICE: Decimal = dec!(100000);

pub const PRICE_SIGNIFICANT_FIGURES: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PrecisionError {
    #[error("sizeDecimals {0} exceeds the {MAX_DECIMALS}-digit precision budget")]
    SizeDecimalsOutOfRange(u32),

    #[error("cannot round {0} to {PRICE_SIGNIFICANT_FIGURES} significant figures")]
    SignificantFigures(Decimal),
}

/// Reject `sizeDecimals` values that would leave a negative price budget.
pub fn validate_size_decimals(size_decimals: u32) -> Result<(), PrecisionError> {
    if size_decimals > MAX_DECIMALS {
        return Err(PrecisionError::SizeDecimalsOutOfRange(size_decimals));
    }
    Ok(())
}

/// Round an order size to the asset's size granularity.
///
/// Zero decimals truncates toward zero; otherwise rounds half-to-even.
pub fn round_size(value: Decimal, size_decimals: u32) -> Decimal {
    if size_decimals == 0 {
        value.trunc()
    } else {
        value.round_dp_with_strategy(size_decimals, RoundingStrategy::MidpointNearestEven)
    }
}

/// Round a price to the venue tick regime for an asset.
pub fn round_price(value: Decimal, size_decimals: u32) -> Result<Decimal, PrecisionError> {
    validate_size_decimals(size_decimals)?;

    if value > WHOLE_UNIT_PRICE {
        return Ok(value.trunc());
    }

    let significant = value
        .round_sf_with_strategy(PRICE_SIGNIFICANT_FIGURES, RoundingStrategy::MidpointNearestEven)
        .ok_or(PrecisionError::SignificantFigures(value))?;

    Ok(significant.round_dp_with_strategy(
        MAX_DECIMALS - size_decimals,
        RoundingStrategy::MidpointNearestEven,
    ))
}

/// Whether `size` already satisfies the asset's size granularity.
pub fn is_valid_size(size: Decimal, size_decimals: u32) -> bool {
    round_size(size, size_decimals) == size
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
