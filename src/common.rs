//! Money helpers shared across handlers and services
use rust_decimal::Decimal;

use crate::errors::ServiceError;

/// Decimal exponent of the currencies the storefront prices in (NGN kobo, USD cents)
pub const MINOR_UNIT_SCALE: u32 = 2;

/// Converts an amount in minor units (kobo) to major units (naira).
pub fn minor_to_major(minor: i64) -> Decimal {
    Decimal::new(minor, MINOR_UNIT_SCALE)
}

/// `unit_price * quantity` with overflow reported as a validation failure.
pub fn line_total_minor(unit_price_minor: i64, quantity: i32) -> Result<i64, ServiceError> {
    unit_price_minor
        .checked_mul(i64::from(quantity))
        .ok_or_else(|| ServiceError::ValidationError("Order amount is too large".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn minor_units_render_with_two_decimals() {
        assert_eq!(minor_to_major(850_000), dec!(8500.00));
        assert_eq!(minor_to_major(5), dec!(0.05));
        assert_eq!(minor_to_major(850_000).to_string(), "8500.00");
    }

    #[test]
    fn line_total_overflow_is_rejected() {
        assert_eq!(line_total_minor(350_000, 2).unwrap(), 700_000);
        assert!(line_total_minor(i64::MAX, 2).is_err());
    }
}
