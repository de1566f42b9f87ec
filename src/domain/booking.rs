use std::str::FromStr;

use chrono::{DateTime, Utc};

use rust_decimal::Decimal;

use serde::{Deserialize, Serialize};

use uuid::Uuid;

use super::{CustomerContact, Money, SlotReservation};
use crate::pricing::PricingCalculation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Confirmed,
    Rescheduled,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Rescheduled => "rescheduled",
            Self::Cancelled => "cancelled",
        }
    }

    /// Bookings that still occupy their slot
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Rescheduled)
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "confirmed" => Ok(Self::Confirmed),
            "rescheduled" => Ok(Self::Rescheduled),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("{} is not a booking status", other)),
        }
    }
}

/// Who asked for a cancellation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancellationInitiator {
    Customer,
    Operator,
}

impl CancellationInitiator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Operator => "operator",
        }
    }
}

impl FromStr for CancellationInitiator {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "customer" => Ok(Self::Customer),
            "operator" | "admin" => Ok(Self::Operator),
            other => Err(format!("{} is not a cancellation initiator", other)),
        }
    }
}

/// Audit record kept on a cancelled booking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cancellation {
    pub reason: Option<String>,
    pub initiated_by: CancellationInitiator,
    pub refund_amount: Money,
    pub refund_percentage: Decimal,
    pub cancellation_fee: Money,
    pub explanation: String,
    pub cancelled_at: DateTime<Utc>,
}

/// A confirmed notarization appointment
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Uuid,
    pub reservation_id: Uuid,
    pub service_id: String,
    pub scheduled_at: DateTime<Utc>,
    pub status: BookingStatus,
    /// Price captured at booking time; refunds are computed from this
    pub pricing: PricingCalculation,
    pub customer: Option<CustomerContact>,
    pub location: Option<String>,
    pub reschedule_count: i32,
    pub reschedule_fees: Money,
    /// Why the customer last moved the appointment, if they said
    pub last_reschedule_reason: Option<String>,
    pub cancellation: Option<Cancellation>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// A fresh booking for a hold that was just confirmed
    pub fn from_hold(reservation: &SlotReservation, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            reservation_id: reservation.id,
            service_id: reservation.service_id.clone(),
            scheduled_at: reservation.start_at,
            status: BookingStatus::Confirmed,
            pricing: reservation.pricing.clone(),
            customer: reservation.customer.clone(),
            location: reservation.location.clone(),
            reschedule_count: 0,
            reschedule_fees: Money::ZERO,
            last_reschedule_reason: None,
            cancellation: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Instructions for moving a booking onto a freshly held slot
#[derive(Debug, Clone)]
pub struct RescheduleRequest {
    pub booking_id: Uuid,
    /// The appointment time the fee was computed against
    pub expected_scheduled_at: DateTime<Utc>,
    pub new_reservation_id: Uuid,
    pub fee: Money,
    pub reason: Option<String>,
}
