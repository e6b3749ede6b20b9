//! Money arithmetic using decimal amounts.
//!
//! Prices are `Decimal` amounts in the currency's standard unit (kroner, not
//! øre). Two conversions leave this representation:
//!
//! - [`to_minor_units`] produces the integer amount handed to the payment
//!   gateway (`price × 100`).
//! - [`round_for_display`] produces the 2 dp value shown in API responses.
//!
//! Ledger totals are accumulated unrounded with [`cart_total`] and rounded only
//! when displayed.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Decimal places used for display and for minor-unit conversion.
const MINOR_UNIT_SCALE: u32 = 2;

/// Errors from money conversions.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    /// Negative amounts cannot be charged.
    #[error("amount cannot be negative: {0}")]
    Negative(Decimal),
    /// The amount does not fit the gateway's integer representation.
    #[error("amount out of range: {0}")]
    OutOfRange(Decimal),
}

/// Round an amount to 2 decimal places, half away from zero.
///
/// ```
/// use bazaar_core::round_for_display;
/// use rust_decimal::Decimal;
///
/// assert_eq!(round_for_display(Decimal::new(24_985, 3)), Decimal::new(2499, 2));
/// ```
#[must_use]
pub fn round_for_display(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MINOR_UNIT_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Convert a unit price to integer minor units (cents, øre).
///
/// # Errors
///
/// Returns `MoneyError::Negative` for negative prices and
/// `MoneyError::OutOfRange` if the result does not fit in an `i64`.
pub fn to_minor_units(price: Decimal) -> Result<i64, MoneyError> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(MoneyError::Negative(price));
    }

    let scaled = round_for_display(price)
        .checked_mul(Decimal::ONE_HUNDRED)
        .ok_or(MoneyError::OutOfRange(price))?;

    scaled.to_i64().ok_or(MoneyError::OutOfRange(price))
}

/// Subtotal of a single cart line.
#[must_use]
pub fn line_subtotal(quantity: i32, unit_price: Decimal) -> Decimal {
    Decimal::from(quantity) * unit_price
}

/// Sum of `quantity × unit_price` over the given lines, unrounded.
///
/// ```
/// use bazaar_core::{cart_total, round_for_display};
/// use rust_decimal::Decimal;
///
/// let lines = [(2, Decimal::new(1000, 2)), (1, Decimal::new(499, 2))];
/// assert_eq!(round_for_display(cart_total(lines)), Decimal::new(2499, 2));
/// ```
#[must_use]
pub fn cart_total<I>(lines: I) -> Decimal
where
    I: IntoIterator<Item = (i32, Decimal)>,
{
    lines
        .into_iter()
        .map(|(quantity, unit_price)| line_subtotal(quantity, unit_price))
        .sum()
}
