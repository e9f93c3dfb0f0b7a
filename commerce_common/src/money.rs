use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

//--------------------------------------      Money       ------------------------------------------------------------
/// An amount of money in the store currency, held as an integer number of cents.
///
/// All financial arithmetic in the engine happens on this type. Fractional-unit comparisons use [`Money::EPSILON`]
/// (one cent): two amounts are considered equal when they differ by no more than one cent.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Money(i64);

op!(binary Money, Add, add);
op!(binary Money, Sub, sub);
op!(inplace Money, SubAssign, sub_assign);
op!(unary Money, Neg, neg);

impl Mul<i64> for Money {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as a money amount: {0}")]
pub struct MoneyConversionError(String);

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for Money {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Money {}

impl TryFrom<u64> for Money {
    type Error = MoneyConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(MoneyConversionError(format!("{value} is too large to convert to Money")))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl FromStr for Money {
    type Err = MoneyConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(Self).map_err(|e| MoneyConversionError(format!("{s}: {e}")))
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let units = self.0 as f64 / 100.0;
        write!(f, "{units:0.2}")
    }
}

impl Money {
    /// One cent. The tolerance for every "amounts match" comparison in the engine.
    pub const EPSILON: Money = Money(1);
    pub const ZERO: Money = Money(0);

    pub fn value(&self) -> i64 {
        self.0
    }

    /// Construct from whole currency units.
    pub fn from_units(units: i64) -> Self {
        Self(units * 100)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn abs(&self) -> Self {
        Self(self.0.abs())
    }

    /// True when `self` and `other` differ by no more than [`Money::EPSILON`].
    pub fn matches(&self, other: Money) -> bool {
        (*self - other).abs() <= Self::EPSILON
    }

    /// The fraction `numerator / denominator` of this amount, rounded to the nearest cent.
    /// Returns zero when the denominator is zero.
    pub fn proportion(&self, numerator: Money, denominator: Money) -> Self {
        if denominator.0 == 0 {
            return Self::ZERO;
        }
        let scaled = (self.0 as i128) * (numerator.0 as i128);
        let half = (denominator.0 as i128) / 2;
        Self(((scaled + half) / denominator.0 as i128) as i64)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn arithmetic() {
        let a = Money::from(1_500);
        let b = Money::from(500);
        assert_eq!(a + b, Money::from(2_000));
        assert_eq!(a - b, Money::from(1_000));
        assert_eq!(-b, Money::from(-500));
        assert_eq!(b * 3, Money::from(1_500));
        let total: Money = [a, b, b].into_iter().sum();
        assert_eq!(total, Money::from(2_500));
    }

    #[test]
    fn epsilon_matching() {
        let a = Money::from(10_000);
        assert!(a.matches(Money::from(10_001)));
        assert!(a.matches(Money::from(9_999)));
        assert!(!a.matches(Money::from(10_002)));
    }

    #[test]
    fn proportions_round_to_nearest_cent() {
        let total = Money::from(9_999);
        let half = total.proportion(Money::from(5_000), Money::from(10_000));
        assert_eq!(half, Money::from(5_000));
        assert_eq!(total.proportion(Money::ZERO, Money::ZERO), Money::ZERO);
    }

    #[test]
    fn display_in_units() {
        assert_eq!(Money::from(123_456).to_string(), "1234.56");
        assert_eq!(Money::from_units(20).to_string(), "20.00");
    }
}
