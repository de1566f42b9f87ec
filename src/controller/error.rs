use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};

use serde::Serialize;

use thiserror::Error;

use crate::error::{Error, InvalidServiceReason};

pub type RestResult<T> = Result<T, RestError>;

#[derive(Debug, Error)]
pub enum RestError {
    #[error("{0}")]
    ParseError(String),

    #[error("Internal Server Error: {0}")]
    InternalError(String),

    #[error(transparent)]
    Booking(#[from] Error),
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

impl RestError {
    /// Machine-readable error code for the response body
    fn code(&self) -> &'static str {
        match self {
            Self::ParseError(_) => "invalid_request",
            Self::InternalError(_) => "internal_error",
            Self::Booking(e) => match e {
                Error::Validation(_) => "validation_error",
                Error::InvalidQuantity(_) => "invalid_quantity",
                Error::InvalidService { .. } => "invalid_service",
                Error::InvalidHoldToken(_) => "invalid_hold_token",
                Error::NotFound { .. } => "not_found",
                Error::SlotConflict(_) => "slot_unavailable",
                Error::Conflict(_) => "conflict",
                Error::ReservationExpired(_) => "reservation_expired",
                Error::Consistency { .. } => "payment_mismatch",
                Error::CorruptRecord(_) | Error::Database(_) => "internal_error",
            },
        }
    }
}

impl ResponseError for RestError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::ParseError(_) => StatusCode::BAD_REQUEST,
            Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Booking(e) => match e {
                Error::Validation(_) | Error::InvalidQuantity(_) => StatusCode::BAD_REQUEST,
                Error::InvalidService { reason, .. } => match reason {
                    InvalidServiceReason::Unknown => StatusCode::NOT_FOUND,
                    InvalidServiceReason::Inactive => StatusCode::BAD_REQUEST,
                },
                Error::InvalidHoldToken(_) => StatusCode::UNAUTHORIZED,
                Error::NotFound { .. } => StatusCode::NOT_FOUND,
                Error::SlotConflict(_) | Error::Conflict(_) => StatusCode::CONFLICT,
                Error::ReservationExpired(_) => StatusCode::GONE,
                Error::Consistency { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                Error::CorruptRecord(_) | Error::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let message = if status.is_server_error() {
            tracing::error!(error.cause_chain = ?self, "Request failed");
            "Internal Server Error".to_string()
        } else {
            self.to_string()
        };

        HttpResponse::build(status).json(ErrorBody {
            error: self.code(),
            message,
        })
    }
}
