//! Type-safe price representation using decimal arithmetic.
//!
//! The storefront sells in a single currency, so a price is just a decimal
//! amount in the currency's standard unit. Totals are computed with
//! `rust_decimal` so that optimistic arithmetic never drifts from the
//! server's figures through float rounding.

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, AddAssign, Sub, SubAssign};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A monetary amount.
///
/// Deserializes from either a JSON number or a numeric string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// The zero amount.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Create a price from an integer amount of whole units.
    #[must_use]
    pub fn from_units(units: i64) -> Self {
        Self(Decimal::from(units))
    }

    /// Get the underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Price of `quantity` units at this unit price.
    #[must_use]
    pub fn times(self, quantity: u32) -> Self {
        Self(self.0 * Decimal::from(quantity))
    }

    /// Subtract without going below zero.
    #[must_use]
    pub fn saturating_sub(self, other: Self) -> Self {
        if other.0 >= self.0 {
            Self::ZERO
        } else {
            Self(self.0 - other.0)
        }
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl From<Decimal> for Price {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Price {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Price {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl SubAssign for Price {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_price_times_quantity() {
        assert_eq!(Price::from_units(150).times(3), Price::from_units(450));
        assert_eq!(Price::from_units(150).times(0), Price::ZERO);
    }

    #[test]
    fn test_price_deserializes_numbers_and_strings() {
        let from_number: Price = serde_json::from_str("450").unwrap();
        let from_string: Price = serde_json::from_str("\"450\"").unwrap();
        let fractional: Price = serde_json::from_str("19.99").unwrap();

        assert_eq!(from_number, Price::from_units(450));
        assert_eq!(from_string, from_number);
        assert_eq!(fractional.to_string(), "19.99");
    }

    #[test]
    fn test_price_saturating_sub() {
        let small = Price::from_units(5);
        let large = Price::from_units(20);
        assert_eq!(large.saturating_sub(small), Price::from_units(15));
        assert_eq!(small.saturating_sub(large), Price::ZERO);
    }

    #[test]
    fn test_price_sum() {
        let total: Price = [1, 2, 3].into_iter().map(Price::from_units).sum();
        assert_eq!(total, Price::from_units(6));
    }
}
