use std::fmt;

use sqlx::error::{DatabaseError, ErrorKind};

use uuid::Uuid;

use crate::crypto::TokenError;
use crate::domain::Money;

pub type Result<T> = std::result::Result<T, Error>;

/// Why a service offering cannot be priced or booked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidServiceReason {
    Unknown,
    Inactive,
}

impl fmt::Display for InvalidServiceReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => f.write_str("unknown"),
            Self::Inactive => f.write_str("not currently offered"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // Input errors
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    InvalidQuantity(String),
    #[error("Service \"{service_id}\" is {reason}")]
    InvalidService {
        service_id: String,
        reason: InvalidServiceReason,
    },
    #[error("Hold token is not valid for this reservation")]
    InvalidHoldToken(#[source] TokenError),
    // Lookup errors
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    // State errors
    #[error("{0}")]
    SlotConflict(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Reservation {0} has expired")]
    ReservationExpired(Uuid),
    // Payment reconciliation
    #[error("Charged {charged} but {expected} was due")]
    Consistency { expected: Money, charged: Money },
    // Storage errors
    #[error("Stored record is invalid: {0}")]
    CorruptRecord(String),
    #[error(transparent)]
    Database(sqlx::Error),
}

impl Error {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<sqlx::Error> for Error {
    fn from(error: sqlx::Error) -> Self {
        match error.as_database_error().map(DatabaseError::kind) {
            Some(ErrorKind::UniqueViolation) => {
                Self::SlotConflict("The requested time slot is no longer available".into())
            }
            Some(ErrorKind::CheckViolation) => {
                Self::Validation("The record violates a storage constraint".into())
            }
            _ => Self::Database(error),
        }
    }
}
