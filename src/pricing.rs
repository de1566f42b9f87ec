use chrono::{DateTime, Utc};

use rust_decimal::Decimal;

use serde::{Deserialize, Serialize};

use crate::domain::{DiscountCode, Money, PromoCode, PromoStatus, ServiceOffering};
use crate::error::{Error, InvalidServiceReason, Result};

/// Longest one-way trip a quote accepts
pub const MAX_DISTANCE_MILES: u32 = 10_000;

/// Per-mile rate that applies from `from_miles` onwards
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TravelRate {
    pub from_miles: Decimal,
    pub per_mile: Money,
}

/// Business constants for fees on top of a service's base price
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PricingPolicy {
    /// Miles from base included in the base price
    pub included_radius_miles: Decimal,
    pub travel_rates: Vec<TravelRate>,
    pub per_extra_document: Money,
    pub per_extra_signer: Money,
    pub urgency_fee: Money,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            included_radius_miles: Decimal::from(20),
            travel_rates: vec![
                TravelRate {
                    from_miles: Decimal::ZERO,
                    per_mile: Money::from_cents(50),
                },
                TravelRate {
                    from_miles: Decimal::from(40),
                    per_mile: Money::from_cents(75),
                },
            ],
            per_extra_document: Money::from_cents(500),
            per_extra_signer: Money::from_cents(1000),
            urgency_fee: Money::from_cents(2500),
        }
    }
}

impl PricingPolicy {
    /// The rate whose lower bound is the greatest value not above `miles`
    pub fn rate_for(&self, miles: Decimal) -> Money {
        self.travel_rates
            .iter()
            .filter(|rate| rate.from_miles <= miles)
            .max_by_key(|rate| rate.from_miles)
            .map(|rate| rate.per_mile)
            .unwrap_or(Money::ZERO)
    }

    /// Travel fee for a one-way distance from base
    pub fn travel_fee(&self, miles: Decimal) -> Money {
        if miles <= self.included_radius_miles {
            return Money::ZERO;
        }
        let billable = miles - self.included_radius_miles;
        Money::from_decimal(billable * self.rate_for(miles).amount())
    }
}

/// Customer-supplied inputs to a quote
#[derive(Debug, Clone, PartialEq)]
pub struct PriceInput {
    /// `None` when travel does not apply or is unknown
    pub distance_miles: Option<Decimal>,
    pub document_count: i32,
    pub signer_count: i32,
    pub is_urgent: bool,
    pub promo_code: Option<String>,
}

impl Default for PriceInput {
    fn default() -> Self {
        Self {
            distance_miles: None,
            document_count: 1,
            signer_count: 1,
            is_urgent: false,
            promo_code: None,
        }
    }
}

/// Price breakdown for one appointment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingCalculation {
    pub service_price: Money,
    pub travel_fee: Money,
    pub extra_document_fee: Money,
    pub extra_signer_fee: Money,
    pub urgency_fee: Money,
    pub promo_discount: Money,
    pub final_price: Money,
    pub deposit_amount: Money,
    pub total_due: Money,
    pub promo_code: Option<DiscountCode>,
    pub promo_status: PromoStatus,
}

impl PricingCalculation {
    pub fn subtotal(&self) -> Money {
        self.service_price
            + self.travel_fee
            + self.extra_document_fee
            + self.extra_signer_fee
            + self.urgency_fee
    }
}

/// Price `service` for `input`.
///
/// `promo` is the stored rule for `input.promo_code`, if one was found. Promo problems never
/// fail the quote; they zero the discount and are reported through `promo_status`.
pub fn calculate_price(
    service: &ServiceOffering,
    policy: &PricingPolicy,
    input: &PriceInput,
    promo: Option<&PromoCode>,
    now: DateTime<Utc>,
) -> Result<PricingCalculation> {
    if !service.active {
        return Err(Error::InvalidService {
            service_id: service.id.clone(),
            reason: InvalidServiceReason::Inactive,
        });
    }
    if input.document_count < 1 {
        return Err(Error::InvalidQuantity("At least one document is required".into()));
    }
    if input.signer_count < 1 {
        return Err(Error::InvalidQuantity("At least one signer is required".into()));
    }
    if input.distance_miles.map_or(false, |miles| miles.is_sign_negative() && !miles.is_zero()) {
        return Err(Error::Validation("Distance cannot be negative".into()));
    }
    if input.distance_miles.map_or(false, |miles| miles > Decimal::from(MAX_DISTANCE_MILES)) {
        return Err(Error::Validation(format!(
            "Distance cannot exceed {} miles",
            MAX_DISTANCE_MILES
        )));
    }

    let service_price = service.base_price;

    let travel_fee = match input.distance_miles {
        Some(miles) if !service.is_remote() => policy.travel_fee(miles),
        _ => Money::ZERO,
    };

    let extra_documents = (input.document_count - service.max_documents).max(0);
    let extra_document_fee =
        Money::from_decimal(policy.per_extra_document.amount() * Decimal::from(extra_documents));

    let extra_signers = (input.signer_count - service.max_signers).max(0);
    let extra_signer_fee =
        Money::from_decimal(policy.per_extra_signer.amount() * Decimal::from(extra_signers));

    let urgency_fee = if input.is_urgent {
        policy.urgency_fee
    } else {
        Money::ZERO
    };

    let subtotal = service_price + travel_fee + extra_document_fee + extra_signer_fee + urgency_fee;

    let (promo_discount, promo_status) = apply_promo(input.promo_code.as_deref(), promo, subtotal, now);
    let promo_code = match promo_status {
        PromoStatus::Applied => promo.map(|rule| rule.code.clone()),
        _ => None,
    };

    let final_price = (subtotal - promo_discount).non_negative();

    let deposit_amount = if service.requires_deposit {
        service.deposit_amount.min(final_price)
    } else {
        Money::ZERO
    };
    let total_due = if deposit_amount > Money::ZERO {
        deposit_amount
    } else {
        final_price
    };

    Ok(PricingCalculation {
        service_price,
        travel_fee,
        extra_document_fee,
        extra_signer_fee,
        urgency_fee,
        promo_discount,
        final_price,
        deposit_amount,
        total_due,
        promo_code,
        promo_status,
    })
}

fn apply_promo(
    code: Option<&str>,
    promo: Option<&PromoCode>,
    subtotal: Money,
    now: DateTime<Utc>,
) -> (Money, PromoStatus) {
    if code.map_or(true, |code| code.trim().is_empty()) {
        return (Money::ZERO, PromoStatus::NotProvided);
    }
    let Some(rule) = promo else {
        return (Money::ZERO, PromoStatus::Unknown);
    };
    if let Err(status) = rule.availability(now) {
        return (Money::ZERO, status);
    }
    if !rule.qualifies(subtotal) {
        return (Money::ZERO, PromoStatus::BelowMinimum);
    }
    (rule.discount_for(subtotal), PromoStatus::Applied)
}
