use std::collections::HashMap;
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use reqwest::{Client, Method, Response};

use rust_decimal::Decimal;

use secrecy::Secret;

use serde::Serialize;

use tokio::sync::mpsc::UnboundedReceiver;

use url::Url;

use uuid::Uuid;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use notary_booking::app;
use notary_booking::client::MapsClient;
use notary_booking::clock::ManualClock;
use notary_booking::crypto::SigningKey;
use notary_booking::domain::{DiscountKind, Money, PromoCode, ServiceOffering};
use notary_booking::notifications::{Notification, NotificationQueue};
use notary_booking::pricing::PricingPolicy;
use notary_booking::repo::MemoryStore;
use notary_booking::reservations::{BookingPolicies, ReservationManager};
use notary_booking::service_area::ServiceAreaResolver;
use notary_booking::telemetry;

lazy_static::lazy_static! {
    static ref TRACING: () = {
        let filter = std::env::var("TEST_LOG").unwrap_or_else(|_| "error".into());
        let subscriber = telemetry::create_subscriber(filter, std::io::sink);
        let _ = telemetry::set_subscriber(subscriber);
    };
}

pub fn service(id: &str, base_cents: i64, radius_miles: Option<i64>) -> ServiceOffering {
    ServiceOffering {
        id: id.into(),
        name: id.replace('-', " "),
        base_price: Money::from_cents(base_cents),
        requires_deposit: false,
        deposit_amount: Money::ZERO,
        duration_minutes: 60,
        max_signers: 2,
        max_documents: 5,
        service_radius_miles: radius_miles.map(Decimal::from),
        active: true,
    }
}

pub fn loan_signing() -> ServiceOffering {
    ServiceOffering {
        requires_deposit: true,
        deposit_amount: Money::from_cents(5000),
        max_signers: 4,
        max_documents: 150,
        ..service("loan-signing", 15000, Some(50))
    }
}

pub fn promo(code: &str, kind: DiscountKind, value: i64) -> PromoCode {
    PromoCode {
        code: code.parse().expect("Failed to parse promo code"),
        kind,
        value: Decimal::from(value),
        valid_from: DateTime::<Utc>::MIN_UTC,
        valid_until: None,
        minimum_amount: None,
        max_discount_amount: None,
        max_uses: None,
        used_count: 0,
        active: true,
    }
}

/// Body of `POST /pricing`
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteBody {
    pub service_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_miles: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_count: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signer_count: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_urgent: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promo_code: Option<String>,
}

/// Body of `POST /reservations`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveBody {
    #[serde(flatten)]
    pub quote: QuoteBody,
    pub start_date_time: DateTime<Utc>,
    pub holder_id: String,
}

pub struct TestApp {
    addr: String,

    pub client: Client,
    pub clock: Arc<ManualClock>,
    pub store: Arc<MemoryStore>,
    pub maps_server: MockServer,
    pub notifications: UnboundedReceiver<Notification>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        use rand::{distributions::Alphanumeric, Rng};

        lazy_static::initialize(&TRACING);

        let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to listen on random port");
        let port = listener.local_addr().unwrap().port();

        let addr = format!("http://127.0.0.1:{}", port);

        let signing_key = {
            let rand_key: String = rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(16)
                .map(char::from)
                .collect();
            let rand_key = Secret::new(rand_key);

            SigningKey::new(&rand_key).expect("Failed to create crypto signing key")
        };

        let store = Arc::new(MemoryStore::new());
        for service in [
            service("standard-notary", 7500, Some(50)),
            service("hundred", 10000, Some(50)),
            service("remote-online", 3500, None),
            loan_signing(),
        ] {
            store
                .insert_service(service)
                .await
                .expect("Failed to seed service");
        }

        let clock = Arc::new(ManualClock::new(Utc::now()));

        let maps_server = MockServer::start().await;
        let maps_client = {
            let api_base_url =
                Url::parse(&maps_server.uri()).expect("Failed to parse mock server uri");

            MapsClient::new(
                "100 Base Ave, Austin, TX".into(),
                Duration::from_secs(2),
                api_base_url,
                Secret::new("TestMapsKey".into()),
            )
            .expect("Failed to create maps client")
        };
        let zip_miles = HashMap::from([("78701".to_string(), Decimal::ZERO)]);
        let resolver = ServiceAreaResolver::new(
            Arc::new(maps_client),
            zip_miles,
            Decimal::from(60),
            PricingPolicy::default(),
        );

        let (queue, notifications) = NotificationQueue::new();
        let manager = Arc::new(ReservationManager::new(
            store.clone(),
            clock.clone(),
            resolver,
            queue,
            BookingPolicies::default(),
        ));

        let server = app::run(listener, manager, signing_key).expect("Failed to spawn app instance");
        let _ = tokio::spawn(server);

        let client = Client::new();

        Self {
            addr,
            client,
            clock,
            store,
            maps_server,
            notifications,
        }
    }

    pub fn request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", &self.addr, url);
        self.client.request(method, url)
    }

    /// Answer every distance lookup with `meters`
    pub async fn mock_distance(&self, meters: u64) {
        Mock::given(path("/maps/api/distancematrix/json"))
            .and(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "OK",
                "rows": [{ "elements": [{ "status": "OK", "distance": { "value": meters } }] }]
            })))
            .mount(&self.maps_server)
            .await;
    }

    /// Everything queued for delivery so far
    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        let mut drained = Vec::new();
        while let Ok(notification) = self.notifications.try_recv() {
            drained.push(notification);
        }
        drained
    }

    pub async fn health_check(&self) -> reqwest::Result<Response> {
        self.request(Method::GET, "health_check").send().await
    }

    pub async fn services(&self) -> reqwest::Result<Response> {
        self.request(Method::GET, "services").send().await
    }

    pub async fn service_area(
        &self,
        address: &str,
        service_id: Option<&str>,
    ) -> reqwest::Result<Response> {
        let mut query = vec![("address", address)];
        if let Some(service_id) = service_id {
            query.push(("serviceId", service_id));
        }
        self.request(Method::GET, "service-area")
            .query(&query)
            .send()
            .await
    }

    pub async fn quote(&self, body: &QuoteBody) -> reqwest::Result<Response> {
        self.request(Method::POST, "pricing").json(body).send().await
    }

    pub async fn reserve(&self, body: &ReserveBody) -> reqwest::Result<Response> {
        self.request(Method::POST, "reservations")
            .json(body)
            .send()
            .await
    }

    pub async fn confirm(&self, id: Uuid, body: &serde_json::Value) -> reqwest::Result<Response> {
        self.request(Method::POST, &format!("reservations/{}/confirm", id))
            .json(body)
            .send()
            .await
    }

    pub async fn release(&self, id: Uuid, hold_token: &str) -> reqwest::Result<Response> {
        self.request(Method::POST, &format!("reservations/{}/release", id))
            .json(&serde_json::json!({ "holdToken": hold_token }))
            .send()
            .await
    }

    pub async fn booking(&self, id: Uuid) -> reqwest::Result<Response> {
        self.request(Method::GET, &format!("bookings/{}", id))
            .send()
            .await
    }

    pub async fn cancel(&self, id: Uuid, body: &serde_json::Value) -> reqwest::Result<Response> {
        self.request(Method::POST, &format!("bookings/{}/cancel", id))
            .json(body)
            .send()
            .await
    }

    pub async fn reschedule(
        &self,
        id: Uuid,
        new_date_time: DateTime<Utc>,
    ) -> reqwest::Result<Response> {
        self.request(Method::POST, &format!("bookings/{}/reschedule", id))
            .json(&serde_json::json!({ "newDateTime": new_date_time }))
            .send()
            .await
    }

    /// A hold on `service_id` at `start`, returning `(reservation id, hold token)`
    pub async fn hold(&self, service_id: &str, start: DateTime<Utc>) -> (Uuid, String) {
        let res = self
            .reserve(&ReserveBody {
                quote: QuoteBody {
                    service_id: service_id.into(),
                    ..Default::default()
                },
                start_date_time: start,
                holder_id: "session-1".into(),
            })
            .await
            .expect("Failed to execute request");
        assert_eq!(201, res.status().as_u16());

        let body: serde_json::Value = res.json().await.expect("Failed to parse response");
        let id = body["reservationId"]
            .as_str()
            .and_then(|id| id.parse().ok())
            .expect("Missing reservation id");
        let token = body["holdToken"]
            .as_str()
            .expect("Missing hold token")
            .to_string();
        (id, token)
    }

    /// A confirmed booking on `service_id` at `start`
    pub async fn book(&self, service_id: &str, start: DateTime<Utc>) -> Uuid {
        let (id, token) = self.hold(service_id, start).await;
        let res = self
            .confirm(id, &serde_json::json!({ "holdToken": token }))
            .await
            .expect("Failed to execute request");
        assert_eq!(200, res.status().as_u16());

        let body: serde_json::Value = res.json().await.expect("Failed to parse response");
        body["bookingId"]
            .as_str()
            .and_then(|id| id.parse().ok())
            .expect("Missing booking id")
    }

    pub fn now(&self) -> DateTime<Utc> {
        use notary_booking::clock::Clock;

        self.clock.now()
    }
}

/// Seed a promo code directly into the store
pub async fn seed_promo(app: &TestApp, promo: PromoCode) {
    app.store.insert_promo_code(promo).await;
}
