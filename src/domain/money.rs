use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Sub};
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};

use serde::{Deserialize, Serialize};

const CENTS: u32 = 2;

/// A USD amount, always held at cent precision.
///
/// Arithmetic on `Money` is exact; rounding (half-up) happens only when a derived
/// fee is turned back into `Money` via [`Money::from_decimal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Round an arbitrary decimal to cents, midpoints away from zero
    pub fn from_decimal(value: Decimal) -> Self {
        Self(value.round_dp_with_strategy(CENTS, RoundingStrategy::MidpointAwayFromZero))
    }

    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, CENTS))
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// Clamp negative amounts to zero
    pub fn non_negative(self) -> Self {
        self.max(Self::ZERO)
    }

    /// `percent` of this amount, rounded to cents
    pub fn percent(&self, percent: Decimal) -> Self {
        Self::from_decimal(self.0 * percent / Decimal::ONE_HUNDRED)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Self::from_decimal(value)
    }
}

impl FromStr for Money {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim().trim_start_matches('$');
        Decimal::from_str(value)
            .map(Self::from_decimal)
            .map_err(|_| format!("\"{}\" is not a valid amount", value))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut value = self.0;
        value.rescale(CENTS);
        if value.is_sign_negative() {
            write!(f, "-${}", value.abs())
        } else {
            write!(f, "${}", value)
        }
    }
}
