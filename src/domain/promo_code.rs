use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use regex::Regex;

use rust_decimal::Decimal;

use serde::{Deserialize, Serialize};

use super::Money;

/// A promo code as typed by a customer, normalized to upper case
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DiscountCode(String);

impl FromStr for DiscountCode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        lazy_static::lazy_static! {
            static ref CODE_REGEX: Regex =
                Regex::new(r"^[A-Z0-9_-]{3,32}$").expect("promo code pattern is valid");
        }

        let value = value.trim().to_uppercase();
        if !CODE_REGEX.is_match(&value) {
            return Err(format!("\"{}\" is not a valid promo code", value));
        }
        Ok(Self(value))
    }
}

impl TryFrom<String> for DiscountCode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DiscountCode> for String {
    fn from(value: DiscountCode) -> Self {
        value.0
    }
}

impl AsRef<str> for DiscountCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DiscountCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    /// `value` is a percentage of the subtotal
    Percentage,
    /// `value` is a dollar amount
    FixedAmount,
}

impl DiscountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Percentage => "percentage",
            Self::FixedAmount => "fixed_amount",
        }
    }
}

impl FromStr for DiscountKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "percentage" => Ok(Self::Percentage),
            "fixed_amount" => Ok(Self::FixedAmount),
            other => Err(format!("{} is not a discount type", other)),
        }
    }
}

/// Outcome of applying a promo code to a quote.
/// Anything other than `Applied` means the discount was zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromoStatus {
    #[default]
    NotProvided,
    Applied,
    Unknown,
    Inactive,
    NotYetValid,
    Expired,
    Exhausted,
    BelowMinimum,
}

/// A stored discount rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromoCode {
    pub code: DiscountCode,
    pub kind: DiscountKind,
    pub value: Decimal,
    pub valid_from: DateTime<Utc>,
    pub valid_until: Option<DateTime<Utc>>,
    pub minimum_amount: Option<Money>,
    pub max_discount_amount: Option<Money>,
    pub max_uses: Option<i32>,
    pub used_count: i32,
    pub active: bool,
}

impl PromoCode {
    /// Check the validity window, usage cap and active flag at `now`
    pub fn availability(&self, now: DateTime<Utc>) -> Result<(), PromoStatus> {
        if !self.active {
            return Err(PromoStatus::Inactive);
        }
        if now < self.valid_from {
            return Err(PromoStatus::NotYetValid);
        }
        if self.valid_until.map_or(false, |until| now > until) {
            return Err(PromoStatus::Expired);
        }
        if self.max_uses.map_or(false, |max| self.used_count >= max) {
            return Err(PromoStatus::Exhausted);
        }
        Ok(())
    }

    /// Whether `subtotal` meets the minimum qualifying amount
    pub fn qualifies(&self, subtotal: Money) -> bool {
        self.minimum_amount.map_or(true, |minimum| subtotal >= minimum)
    }

    /// Discount for `subtotal`, capped by the max discount and by the subtotal itself
    pub fn discount_for(&self, subtotal: Money) -> Money {
        let raw = match self.kind {
            DiscountKind::Percentage => subtotal.percent(self.value),
            DiscountKind::FixedAmount => Money::from_decimal(self.value),
        };
        let capped = match self.max_discount_amount {
            Some(cap) => raw.min(cap),
            None => raw,
        };
        capped.min(subtotal.non_negative()).non_negative()
    }
}
