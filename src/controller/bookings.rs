use actix_web::dev::HttpServiceFactory;
use actix_web::{get, post, web, HttpResponse, Responder};

use chrono::{DateTime, Utc};

use rust_decimal::Decimal;

use serde::{Deserialize, Serialize};

use uuid::Uuid;

use crate::domain::{CancellationInitiator, Money};
use crate::reservations::ReservationManager;

use super::error::{RestError, RestResult};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelBody {
    reason: Option<String>,
    initiated_by: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CancelledResponse {
    refund_amount: Money,
    refund_percentage: Decimal,
    cancellation_fee: Money,
    explanation: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleBody {
    new_date_time: DateTime<Utc>,
    reason: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RescheduledResponse {
    reschedule_fee: Money,
    new_date_time: DateTime<Utc>,
    explanation: String,
}

#[tracing::instrument(name = "Fetch a booking", skip(manager))]
#[get("/{id}")]
async fn fetch(
    manager: web::Data<ReservationManager>,
    path: web::Path<(Uuid,)>,
) -> RestResult<impl Responder> {
    let (id,) = path.into_inner();
    let booking = manager.fetch_booking(id).await?;

    Ok(HttpResponse::Ok().json(booking))
}

/// Cancel a booking and report the refund owed
#[tracing::instrument(name = "Cancel a booking", skip(manager))]
#[post("/{id}/cancel")]
async fn cancel(
    manager: web::Data<ReservationManager>,
    path: web::Path<(Uuid,)>,
    body: web::Json<CancelBody>,
) -> RestResult<impl Responder> {
    let (id,) = path.into_inner();
    let CancelBody {
        reason,
        initiated_by,
    } = body.into_inner();
    let initiated_by: CancellationInitiator =
        initiated_by.parse().map_err(RestError::ParseError)?;

    let booking = manager.cancel(id, reason, initiated_by).await?;
    let cancellation = booking.cancellation.ok_or_else(|| {
        RestError::InternalError(format!("Booking {} has no cancellation record", id))
    })?;

    Ok(HttpResponse::Ok().json(CancelledResponse {
        refund_amount: cancellation.refund_amount,
        refund_percentage: cancellation.refund_percentage,
        cancellation_fee: cancellation.cancellation_fee,
        explanation: cancellation.explanation,
    }))
}

/// Move a booking to another slot
#[tracing::instrument(name = "Reschedule a booking", skip(manager))]
#[post("/{id}/reschedule")]
async fn reschedule(
    manager: web::Data<ReservationManager>,
    path: web::Path<(Uuid,)>,
    body: web::Json<RescheduleBody>,
) -> RestResult<impl Responder> {
    let (id,) = path.into_inner();
    let RescheduleBody {
        new_date_time,
        reason,
    } = body.into_inner();

    let rescheduled = manager.reschedule(id, new_date_time, reason).await?;

    Ok(HttpResponse::Ok().json(RescheduledResponse {
        reschedule_fee: rescheduled.fee.fee,
        new_date_time: rescheduled.booking.scheduled_at,
        explanation: rescheduled.fee.explanation,
    }))
}

/// Booking API endpoints
pub fn scope() -> impl HttpServiceFactory {
    web::scope("/bookings")
        .service(fetch)
        .service(cancel)
        .service(reschedule)
}
