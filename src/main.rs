use std::net::TcpListener;
use std::sync::Arc;

use anyhow::Context;

use sqlx::PgPool;

use tokio_util::sync::CancellationToken;

use notary_booking::app;
use notary_booking::client::{CrmClient, EmailClient, MapsClient};
use notary_booking::clock::SystemClock;
use notary_booking::crypto::SigningKey;
use notary_booking::notifications::{NotificationQueue, NotificationWorker};
use notary_booking::repo::PgStore;
use notary_booking::reservations::{run_sweeper, ReservationManager};
use notary_booking::service_area::ServiceAreaResolver;
use notary_booking::settings::Settings;
use notary_booking::telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    let subscriber = telemetry::create_subscriber(env_filter, std::io::stdout);
    telemetry::set_subscriber(subscriber)?;

    let settings = Settings::load()?;

    let pool = PgPool::connect_with(settings.database.with_db())
        .await
        .context("Failed to connect to database")?;
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    let signing_key = SigningKey::new(settings.app.secret_key())?;

    let email_client = EmailClient::new(
        settings.email.sender()?,
        settings.email.api_timeout(),
        settings.email.api_base_url()?,
        settings.email.api_auth_token(),
    )?;
    let crm_client = CrmClient::new(
        settings.crm.location_id().to_string(),
        settings.crm.api_timeout(),
        settings.crm.api_base_url()?,
        settings.crm.api_auth_token(),
    )?;
    let maps_client = MapsClient::new(
        settings.maps.base_address().to_string(),
        settings.maps.api_timeout(),
        settings.maps.api_base_url()?,
        settings.maps.api_key(),
    )?;

    let policies = settings.policies()?;
    let resolver = ServiceAreaResolver::new(
        Arc::new(maps_client),
        settings.maps.zip_miles().clone(),
        settings.maps.max_radius_miles(),
        policies.pricing.clone(),
    );

    let (queue, receiver) = NotificationQueue::new();
    let manager = Arc::new(ReservationManager::new(
        Arc::new(PgStore::new(pool.clone())),
        Arc::new(SystemClock),
        resolver,
        queue,
        policies,
    ));

    // Background tasks run until the server stops
    let shutdown = CancellationToken::new();
    let worker = NotificationWorker::new(
        email_client,
        crm_client,
        settings.notifications.operator_email()?,
        settings.notifications.retry_policy(),
    );
    let worker = tokio::spawn(worker.run(receiver, shutdown.clone()));
    let sweeper = tokio::spawn(run_sweeper(
        manager.clone(),
        settings.booking.sweep_interval(),
        shutdown.clone(),
    ));

    let listener = TcpListener::bind(settings.app.addr())?;
    tracing::info!(addr = ?listener.local_addr()?, "Listening");

    let served = app::run(listener, manager, signing_key)?
        .await
        .context("Failed to run app");

    shutdown.cancel();
    if let Err(e) = tokio::try_join!(worker, sweeper) {
        tracing::error!(error = %e, "Background task failed");
    }
    pool.close().await;

    served
}
