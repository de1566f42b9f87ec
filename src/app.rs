use std::net::TcpListener;
use std::sync::Arc;

use actix_web::dev::Server;
use actix_web::{get, HttpResponse, Responder};
use actix_web::{web, App, HttpServer};

use tracing_actix_web::TracingLogger;

use crate::controller::error::RestError;
use crate::controller::{bookings, pricing, reservations, services};
use crate::crypto::SigningKey;
use crate::reservations::ReservationManager;

/// Simple health-check endpoint
#[tracing::instrument(name = "Health check")]
#[get("/health_check")]
async fn health_check() -> impl Responder {
    HttpResponse::Ok().body("I am alive")
}

/// Run the application on a specified TCP listener
pub fn run(
    listener: TcpListener,
    manager: Arc<ReservationManager>,
    signing_key: SigningKey,
) -> anyhow::Result<Server> {
    // Wrap application data
    let manager = web::Data::from(manager);
    let signing_key = web::Data::new(signing_key);

    // Malformed bodies and queries get the same JSON error shape as everything else
    let json_config = web::JsonConfig::default()
        .error_handler(|e, _req| RestError::ParseError(e.to_string()).into());
    let query_config = web::QueryConfig::default()
        .error_handler(|e, _req| RestError::ParseError(e.to_string()).into());
    let path_config = web::PathConfig::default()
        .error_handler(|e, _req| RestError::ParseError(e.to_string()).into());

    // Start the server
    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .app_data(manager.clone())
            .app_data(signing_key.clone())
            .app_data(json_config.clone())
            .app_data(query_config.clone())
            .app_data(path_config.clone())
            .service(health_check)
            .service(services::list)
            .service(services::service_area)
            .service(pricing::scope())
            .service(reservations::scope())
            .service(bookings::scope())
    })
    .listen(listener)?
    .run();

    Ok(server)
}
