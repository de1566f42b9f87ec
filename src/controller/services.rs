use actix_web::{get, web, HttpResponse, Responder};

use serde::Deserialize;

use crate::domain::Address;
use crate::reservations::ReservationManager;

use super::error::{RestError, RestResult};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAreaQuery {
    address: String,
    service_id: Option<String>,
}

/// Active service offerings
#[tracing::instrument(name = "List services", skip(manager))]
#[get("/services")]
pub async fn list(manager: web::Data<ReservationManager>) -> RestResult<impl Responder> {
    let services = manager.list_services().await?;

    Ok(HttpResponse::Ok().json(services))
}

/// Distance to an address and whether it lies inside the service area
#[tracing::instrument(name = "Check service area", skip(manager))]
#[get("/service-area")]
pub async fn service_area(
    manager: web::Data<ReservationManager>,
    query: web::Query<ServiceAreaQuery>,
) -> RestResult<impl Responder> {
    let address: Address = query.address.parse().map_err(RestError::ParseError)?;

    let resolution = manager
        .service_area(&address, query.service_id.as_deref())
        .await?;

    Ok(HttpResponse::Ok().json(resolution))
}
