//! Money helpers.
//!
//! Amounts are `rust_decimal::Decimal` in the store currency's major unit
//! (rupees for INR). Payment providers want integer minor units.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use thiserror::Error;

/// Errors converting an amount for a payment provider.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("amount must be greater than zero")]
    NotPositive,
    #[error("amount is too large")]
    Overflow,
}

/// Convert a major-unit amount to minor units (x100), rounding half away
/// from zero to the nearest minor unit.
///
/// # Errors
///
/// Returns `MoneyError::NotPositive` for amounts that round to zero or below and
/// `MoneyError::Overflow` if the result does not fit in an `i64`.
///
/// ```
/// use rust_decimal::Decimal;
/// use ecom24_core::to_minor_units;
///
/// assert_eq!(to_minor_units(Decimal::new(1999, 2)), Ok(1999));
/// assert_eq!(to_minor_units(Decimal::from(250)), Ok(25_000));
/// ```
pub fn to_minor_units(amount: Decimal) -> Result<i64, MoneyError> {
    if amount <= Decimal::ZERO {
        return Err(MoneyError::NotPositive);
    }
    let minor = amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .ok_or(MoneyError::Overflow)?
        .round_dp_with_strategy(0, rust_decimal::RoundingStrategy::MidpointAwayFromZero);
    match minor.to_i64() {
        Some(0) => Err(MoneyError::NotPositive),
        Some(minor) => Ok(minor),
        None => Err(MoneyError::Overflow),
    }
}
