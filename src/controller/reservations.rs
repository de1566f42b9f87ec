use actix_web::dev::HttpServiceFactory;
use actix_web::{post, web, HttpResponse, Responder};

use chrono::{DateTime, Utc};

use serde::{Deserialize, Serialize};

use uuid::Uuid;

use crate::crypto::{HoldClaims, HoldToken, SigningKey};
use crate::domain::{parse_location, CustomerContact, HolderId, Money, ReservationStatus};
use crate::error::Error;
use crate::pricing::PricingCalculation;
use crate::reservations::{ReservationManager, ReserveRequest};

use super::error::{RestError, RestResult};
use super::pricing::QuoteBody;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerBody {
    name: String,
    email: String,
    phone: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveBody {
    #[serde(flatten)]
    quote: QuoteBody,
    start_date_time: DateTime<Utc>,
    holder_id: String,
    customer: Option<CustomerBody>,
    location: Option<String>,
}

impl TryFrom<ReserveBody> for ReserveRequest {
    type Error = RestError;

    fn try_from(body: ReserveBody) -> RestResult<Self> {
        let holder_id: HolderId = body.holder_id.parse().map_err(RestError::ParseError)?;
        let customer = body
            .customer
            .map(|c| CustomerContact::new(&c.name, &c.email, c.phone.as_deref()))
            .transpose()
            .map_err(RestError::ParseError)?;
        let location = parse_location(body.location.as_deref()).map_err(RestError::ParseError)?;

        Ok(ReserveRequest {
            quote: body.quote.try_into()?,
            start_at: body.start_date_time,
            holder_id,
            customer,
            location,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReservedResponse {
    reservation_id: Uuid,
    expires_at: DateTime<Utc>,
    hold_token: String,
    pricing: PricingCalculation,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmBody {
    hold_token: String,
    amount_charged: Option<Money>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfirmedResponse {
    booking_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseBody {
    hold_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReleasedResponse {
    reservation_id: Uuid,
    status: ReservationStatus,
}

/// Check that `token` was issued by us for reservation `id`
fn verify_hold(token: &str, signing_key: &SigningKey, id: Uuid) -> RestResult<HoldClaims> {
    let claims = token
        .parse::<HoldToken>()
        .and_then(|token| token.verify_for(signing_key, id))
        .map_err(Error::InvalidHoldToken)?;
    Ok(claims)
}

/// Hold a slot for checkout
#[tracing::instrument(name = "Reserve a slot", skip(manager, signing_key))]
#[post("")]
async fn create(
    manager: web::Data<ReservationManager>,
    signing_key: web::Data<SigningKey>,
    body: web::Json<ReserveBody>,
) -> RestResult<impl Responder> {
    let request: ReserveRequest = body.into_inner().try_into()?;

    let reservation = manager.reserve(request).await?;

    let claims = HoldClaims {
        reservation_id: reservation.id,
        holder_id: reservation.holder_id.to_string(),
    };
    let hold_token = HoldToken::sign(&claims, signing_key.get_ref())
        .map_err(|_| RestError::InternalError("Failed to sign hold token".into()))?;

    Ok(HttpResponse::Created().json(ReservedResponse {
        reservation_id: reservation.id,
        expires_at: reservation.expires_at,
        hold_token: hold_token.to_string(),
        pricing: reservation.pricing,
    }))
}

/// Turn a hold into a booking
#[tracing::instrument(name = "Confirm a reservation", skip(manager, signing_key, body))]
#[post("/{id}/confirm")]
async fn confirm(
    manager: web::Data<ReservationManager>,
    signing_key: web::Data<SigningKey>,
    path: web::Path<(Uuid,)>,
    body: web::Json<ConfirmBody>,
) -> RestResult<impl Responder> {
    let (id,) = path.into_inner();
    verify_hold(&body.hold_token, signing_key.get_ref(), id)?;

    let booking = manager.confirm(id, body.amount_charged).await?;

    Ok(HttpResponse::Ok().json(ConfirmedResponse {
        booking_id: booking.id,
    }))
}

/// Give up a hold before it expires
#[tracing::instrument(name = "Release a reservation", skip(manager, signing_key, body))]
#[post("/{id}/release")]
async fn release(
    manager: web::Data<ReservationManager>,
    signing_key: web::Data<SigningKey>,
    path: web::Path<(Uuid,)>,
    body: web::Json<ReleaseBody>,
) -> RestResult<impl Responder> {
    let (id,) = path.into_inner();
    verify_hold(&body.hold_token, signing_key.get_ref(), id)?;

    let reservation = manager.release(id).await?;

    Ok(HttpResponse::Ok().json(ReleasedResponse {
        reservation_id: reservation.id,
        status: reservation.status,
    }))
}

/// Reservation API endpoints
pub fn scope() -> impl HttpServiceFactory {
    web::scope("/reservations")
        .service(create)
        .service(confirm)
        .service(release)
}
