use chrono::{DateTime, Utc};

use rust_decimal::Decimal;

use serde::{Deserialize, Serialize};

use crate::domain::Money;

/// Refund granted when at least `min_notice_hours` of notice is given
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RefundTier {
    pub min_notice_hours: f64,
    pub refund_percent: Decimal,
}

/// Tiered cancellation policy and the flat fee for late reschedules.
///
/// Notice below every tier (or a negative notice, for appointments already past) refunds nothing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CancellationPolicy {
    pub tiers: Vec<RefundTier>,
    pub reschedule_fee: Money,
}

impl Default for CancellationPolicy {
    fn default() -> Self {
        Self {
            tiers: vec![
                RefundTier {
                    min_notice_hours: 24.0,
                    refund_percent: Decimal::ONE_HUNDRED,
                },
                RefundTier {
                    min_notice_hours: 4.0,
                    refund_percent: Decimal::from(50),
                },
            ],
            reschedule_fee: Money::from_cents(2500),
        }
    }
}

impl CancellationPolicy {
    /// The tier with the largest notice requirement that `hours` still meets
    pub fn tier_for(&self, hours: f64) -> Option<&RefundTier> {
        if hours.is_nan() || hours < 0.0 {
            return None;
        }
        self.tiers
            .iter()
            .filter(|tier| hours >= tier.min_notice_hours)
            .max_by(|a, b| a.min_notice_hours.total_cmp(&b.min_notice_hours))
    }

    /// Notice needed to reschedule for free: the threshold of the most generous tier
    pub fn free_reschedule_notice_hours(&self) -> f64 {
        self.tiers
            .iter()
            .max_by(|a, b| {
                a.refund_percent
                    .cmp(&b.refund_percent)
                    .then(b.min_notice_hours.total_cmp(&a.min_notice_hours))
            })
            .map_or(0.0, |tier| tier.min_notice_hours)
    }

    fn smallest_notice(&self) -> Option<f64> {
        self.tiers
            .iter()
            .map(|tier| tier.min_notice_hours)
            .min_by(f64::total_cmp)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundCalculation {
    pub refund_amount: Money,
    pub refund_percentage: Decimal,
    pub cancellation_fee: Money,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleFee {
    pub fee: Money,
    pub explanation: String,
}

/// Fractional hours from `now` until `appointment`; negative once it has passed
pub fn hours_until(now: DateTime<Utc>, appointment: DateTime<Utc>) -> f64 {
    (appointment - now).num_milliseconds() as f64 / 3_600_000.0
}

/// Refund owed on `original` when cancelling with `hours` of notice
pub fn calculate_refund(original: Money, hours: f64, policy: &CancellationPolicy) -> RefundCalculation {
    let tier = policy.tier_for(hours);
    let refund_percentage = tier.map_or(Decimal::ZERO, |tier| tier.refund_percent);

    let explanation = match tier {
        _ if hours < 0.0 => "Appointment time has passed; no refund".to_string(),
        Some(tier) => format!(
            "Cancelled with {:.1} hours notice; {}% refund for at least {} hours notice",
            hours,
            refund_percentage.normalize(),
            tier.min_notice_hours
        ),
        None => match policy.smallest_notice() {
            Some(minimum) => format!(
                "Cancelled with {:.1} hours notice; no refund with less than {} hours notice",
                hours, minimum
            ),
            None => format!("Cancelled with {:.1} hours notice; no refund", hours),
        },
    };

    refund_of(original, refund_percentage, explanation)
}

/// Refund everything, for cancellations made by the business
pub fn full_refund(original: Money, explanation: impl Into<String>) -> RefundCalculation {
    refund_of(original, Decimal::ONE_HUNDRED, explanation.into())
}

fn refund_of(original: Money, percentage: Decimal, explanation: String) -> RefundCalculation {
    let refund_amount = original.percent(percentage).min(original).non_negative();
    RefundCalculation {
        refund_amount,
        refund_percentage: percentage,
        cancellation_fee: original - refund_amount,
        explanation,
    }
}

/// Flat fee owed when moving an appointment with `hours` of notice
pub fn calculate_reschedule_fee(hours: f64, policy: &CancellationPolicy) -> RescheduleFee {
    let threshold = policy.free_reschedule_notice_hours();
    if hours >= threshold {
        RescheduleFee {
            fee: Money::ZERO,
            explanation: format!(
                "Rescheduled with {:.1} hours notice; free with at least {} hours notice",
                hours, threshold
            ),
        }
    } else {
        RescheduleFee {
            fee: policy.reschedule_fee,
            explanation: format!(
                "Rescheduled with {:.1} hours notice; {} fee applies under {} hours notice",
                hours.max(0.0),
                policy.reschedule_fee,
                threshold
            ),
        }
    }
}
