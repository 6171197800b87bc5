//! Value objects: equality by value, not identity.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Marker trait for value objects (immutable, compared by value).
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}

/// Amount of money in the smallest currency unit (e.g. cents).
///
/// The marketplace prices a single currency per deployment, so no currency code
/// is carried.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl ValueObject for Money {}

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn from_minor(minor_units: u64) -> Self {
        Self(minor_units)
    }

    pub fn minor_units(self) -> u64 {
        self.0
    }

    pub fn checked_add(self, other: Money) -> DomainResult<Money> {
        self.0
            .checked_add(other.0)
            .map(Money)
            .ok_or_else(|| DomainError::invariant("money overflow"))
    }

    /// Price of `quantity` units at this unit price.
    pub fn times(self, quantity: u32) -> DomainResult<Money> {
        self.0
            .checked_mul(u64::from(quantity))
            .map(Money)
            .ok_or_else(|| DomainError::invariant("money overflow"))
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_major_and_minor_units() {
        assert_eq!(Money::from_minor(4000).to_string(), "40.00");
        assert_eq!(Money::from_minor(1005).to_string(), "10.05");
    }

    #[test]
    fn line_total_multiplies_unit_price() {
        let unit = Money::from_minor(1000);
        assert_eq!(unit.times(3).unwrap(), Money::from_minor(3000));
        assert_eq!(unit.times(0).unwrap(), Money::ZERO);
    }

    #[test]
    fn overflow_is_an_invariant_error() {
        let err = Money::from_minor(u64::MAX).checked_add(Money::from_minor(1)).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }
}
