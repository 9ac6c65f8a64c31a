//! Fixed-point money and percentage value objects.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Money amount represented in cents to avoid floating point issues.
///
/// Persisted as `NUMERIC(10,2)`; [`Money::to_decimal`] and
/// [`Money::from_decimal`] convert at that boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money {
    /// Amount in cents (e.g., 1000 = 10.00)
    cents: i64,
}

impl Money {
    /// Creates a new Money amount from cents.
    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self { cents: 0 }
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns true if the amount is positive.
    pub fn is_positive(&self) -> bool {
        self.cents > 0
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.cents == 0
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        self.cents < 0
    }

    /// Multiplies by a quantity, saturating at the `i64` bounds.
    pub fn multiply(&self, quantity: u32) -> Money {
        Money {
            cents: self.cents.saturating_mul(i64::from(quantity)),
        }
    }

    /// Returns the amount as a decimal with two fractional digits.
    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.cents, 2)
    }

    /// Converts a decimal into money, rounding half away from zero to cents.
    ///
    /// Returns `None` when the value does not fit in an `i64` count of cents.
    pub fn from_decimal(value: Decimal) -> Option<Money> {
        let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        rounded.rescale(2);
        i64::try_from(rounded.mantissa()).ok().map(Money::from_cents)
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_decimal())
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money {
            cents: self.cents + rhs.cents,
        }
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money {
            cents: self.cents - rhs.cents,
        }
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.cents += rhs.cents;
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

/// A percentage value outside `[0, 100]` or with more than two decimals of
/// meaningful precision after rounding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid percentage: {0} (must be between 0 and 100)")]
pub struct InvalidPercentage(pub Decimal);

/// Marketplace fee percentage, e.g. `10.00` meaning 10%.
///
/// Held internally as basis points (hundredths of a percent) so fee math stays
/// in integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FeePercentage {
    basis_points: u32,
}

impl FeePercentage {
    /// The percentage applied when no configuration exists yet.
    pub const DEFAULT: FeePercentage = FeePercentage {
        basis_points: 1_000,
    };

    const MAX_BASIS_POINTS: u32 = 10_000;

    /// Creates a percentage from a decimal, rounded half-up to two decimals.
    pub fn new(value: Decimal) -> Result<Self, InvalidPercentage> {
        let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        rounded.rescale(2);
        u32::try_from(rounded.mantissa())
            .ok()
            .filter(|bp| *bp <= Self::MAX_BASIS_POINTS)
            .map(|basis_points| Self { basis_points })
            .ok_or(InvalidPercentage(value))
    }

    /// Creates a percentage from basis points (`1000` = 10.00%).
    pub fn from_basis_points(basis_points: u32) -> Result<Self, InvalidPercentage> {
        if basis_points > Self::MAX_BASIS_POINTS {
            return Err(InvalidPercentage(Decimal::new(i64::from(basis_points), 2)));
        }
        Ok(Self { basis_points })
    }

    /// Returns the value in basis points.
    pub fn basis_points(&self) -> u32 {
        self.basis_points
    }

    /// Returns the percentage as a decimal with two fractional digits.
    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(i64::from(self.basis_points), 2)
    }
}

impl Default for FeePercentage {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl std::fmt::Display for FeePercentage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_decimal())
    }
}
