//! Fixed-point conversion for hours and time credits.
//!
//! One credit equals one verified hour. Values travel through the API as
//! [`Decimal`] and are stored as `i64` hundredths, so sums in the database are
//! exact integer arithmetic.

use crate::errors::{Error, Result};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// Decimal places kept for hours and credits
pub const CREDIT_SCALE: u32 = 2;

/// Converts a decimal amount to stored hundredths.
///
/// Rejects values with more than two decimal places and values outside the
/// `i64` range; never rounds silently.
pub fn to_hundredths(value: Decimal) -> Result<i64> {
    let normalized = value.normalize();
    if normalized.scale() > CREDIT_SCALE {
        return Err(Error::Validation {
            message: format!("{value} has more than {CREDIT_SCALE} decimal places"),
        });
    }

    normalized
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|hundredths| hundredths.to_i64())
        .ok_or_else(|| Error::Validation {
            message: format!("{value} is out of range"),
        })
}

/// Converts stored hundredths back to a decimal amount.
#[must_use]
pub fn from_hundredths(hundredths: i64) -> Decimal {
    Decimal::new(hundredths, CREDIT_SCALE)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_to_hundredths() {
        assert_eq!(to_hundredths(Decimal::from(3)).unwrap(), 300);
        assert_eq!(to_hundredths(Decimal::new(125, 2)).unwrap(), 125);
        assert_eq!(to_hundredths(Decimal::new(1500, 3)).unwrap(), 150);
        assert_eq!(to_hundredths(Decimal::new(-25, 1)).unwrap(), -250);
    }

    #[test]
    fn test_to_hundredths_rejects_extra_precision() {
        let result = to_hundredths(Decimal::new(1234, 3));
        assert!(matches!(result, Err(Error::Validation { .. })));
    }

    #[test]
    fn test_from_hundredths() {
        assert_eq!(from_hundredths(300), Decimal::from(3));
        assert_eq!(from_hundredths(75), Decimal::new(75, 2));
        assert_eq!(from_hundredths(0), Decimal::ZERO);
    }
}
