use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use serde::{Deserialize, Serialize};

use unicode_segmentation::UnicodeSegmentation;

use uuid::Uuid;

use super::CustomerContact;
use crate::pricing::PricingCalculation;

const MAX_HOLDER_LEN: usize = 256;

/// Who is holding a slot during checkout: an email or a session id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HolderId(String);

impl FromStr for HolderId {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if value.is_empty() {
            return Err("Holder id cannot be empty".into());
        }
        if value.graphemes(true).count() > MAX_HOLDER_LEN {
            return Err("Holder id too long".into());
        }
        Ok(Self(value.to_string()))
    }
}

impl TryFrom<String> for HolderId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HolderId> for String {
    fn from(value: HolderId) -> Self {
        value.0
    }
}

impl AsRef<str> for HolderId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Held,
    Confirmed,
    Expired,
    Released,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Held => "held",
            Self::Confirmed => "confirmed",
            Self::Expired => "expired",
            Self::Released => "released",
        }
    }
}

impl FromStr for ReservationStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "held" => Ok(Self::Held),
            "confirmed" => Ok(Self::Confirmed),
            "expired" => Ok(Self::Expired),
            "released" => Ok(Self::Released),
            other => Err(format!("{} is not a reservation status", other)),
        }
    }
}

/// A hold placed on a calendar slot while the customer checks out
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotReservation {
    pub id: Uuid,
    pub service_id: String,
    pub start_at: DateTime<Utc>,
    pub holder_id: HolderId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: ReservationStatus,
    /// Price quoted when the hold was placed
    pub pricing: PricingCalculation,
    pub customer: Option<CustomerContact>,
    pub location: Option<String>,
}

impl SlotReservation {
    /// Whether this reservation blocks its slot at `now`.
    /// Held reservations stop blocking once `expires_at` passes, swept or not.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            ReservationStatus::Confirmed => true,
            ReservationStatus::Held => now < self.expires_at,
            ReservationStatus::Expired | ReservationStatus::Released => false,
        }
    }

    pub fn is_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.status == ReservationStatus::Held && now >= self.expires_at
    }
}

/// Everything needed to place a new hold
#[derive(Debug, Clone)]
pub struct NewHold {
    pub service_id: String,
    pub start_at: DateTime<Utc>,
    pub holder_id: HolderId,
    pub expires_at: DateTime<Utc>,
    pub pricing: PricingCalculation,
    pub customer: Option<CustomerContact>,
    pub location: Option<String>,
}
