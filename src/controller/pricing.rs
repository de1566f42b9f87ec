use actix_web::dev::HttpServiceFactory;
use actix_web::{post, web, HttpResponse, Responder};

use rust_decimal::Decimal;

use serde::{Deserialize, Serialize};

use crate::pricing::{PriceInput, PricingCalculation};
use crate::reservations::{Quote, QuoteRequest, ReservationManager};
use crate::service_area::DistanceResolution;

use super::error::{RestError, RestResult};

/// Pricing inputs shared by quotes and reservations
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteBody {
    service_id: String,
    distance_miles: Option<Decimal>,
    address: Option<String>,
    document_count: Option<i32>,
    signer_count: Option<i32>,
    is_urgent: Option<bool>,
    promo_code: Option<String>,
}

impl TryFrom<QuoteBody> for QuoteRequest {
    type Error = RestError;

    fn try_from(body: QuoteBody) -> RestResult<Self> {
        let address = match body.address.as_deref().map(str::trim) {
            Some(address) if !address.is_empty() => {
                Some(address.parse().map_err(RestError::ParseError)?)
            }
            _ => None,
        };
        let defaults = PriceInput::default();

        Ok(QuoteRequest {
            service_id: body.service_id,
            distance_miles: body.distance_miles,
            address,
            input: PriceInput {
                distance_miles: body.distance_miles,
                document_count: body.document_count.unwrap_or(defaults.document_count),
                signer_count: body.signer_count.unwrap_or(defaults.signer_count),
                is_urgent: body.is_urgent.unwrap_or(false),
                promo_code: body.promo_code,
            },
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponse {
    #[serde(flatten)]
    pricing: PricingCalculation,
    #[serde(skip_serializing_if = "Option::is_none")]
    service_area: Option<DistanceResolution>,
}

impl From<Quote> for QuoteResponse {
    fn from(value: Quote) -> Self {
        Self {
            pricing: value.pricing,
            service_area: value.service_area,
        }
    }
}

/// Price a service without holding anything
#[tracing::instrument(name = "Quote a price", skip(manager))]
#[post("")]
async fn create_quote(
    manager: web::Data<ReservationManager>,
    body: web::Json<QuoteBody>,
) -> RestResult<impl Responder> {
    let request: QuoteRequest = body.into_inner().try_into()?;

    let quoted = manager.quote(&request).await?;

    Ok(HttpResponse::Ok().json(QuoteResponse::from(quoted)))
}

/// Pricing API endpoints
pub fn scope() -> impl HttpServiceFactory {
    web::scope("/pricing").service(create_quote)
}
