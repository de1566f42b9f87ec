use std::time::Duration;

use anyhow::Context;

use reqwest::Client;

use rust_decimal::Decimal;

use serde::Deserialize;

use secrecy::Secret;

use url::Url;

const METERS_PER_MILE: Decimal = Decimal::from_parts(1_609_344, 0, 0, false, 3);

#[derive(Debug, thiserror::Error)]
pub enum MapsError {
    #[error("Maps request failed")]
    Request(#[from] reqwest::Error),
    #[error("Maps provider answered with status {0}")]
    Status(String),
    #[error("No route between base and destination")]
    NoRoute,
}

/// Driving distances from Distance Matrix shaped APIs
#[derive(Debug)]
pub struct MapsClient {
    client: Client,
    origin: String,

    api_matrix_url: Url,
    api_key: Secret<String>,
}

impl MapsClient {
    pub fn new(
        origin: String,
        api_timeout: Duration,
        api_base_url: Url,
        api_key: Secret<String>,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(api_timeout)
            .build()
            .context("Failed to build http client")?;

        let api_matrix_url = api_base_url
            .join("maps/api/distancematrix/json")
            .context("Failed to create distance matrix endpoint URL")?;

        Ok(Self {
            client,
            origin,
            api_matrix_url,
            api_key,
        })
    }

    /// Driving distance in miles (2 dp) from the configured base to `destination`
    #[tracing::instrument(name = "Fetch driving distance", skip(self))]
    pub async fn driving_miles(&self, destination: &str) -> Result<Decimal, MapsError> {
        use secrecy::ExposeSecret;

        let response: MatrixResponse = self
            .client
            .get(self.api_matrix_url.clone())
            .query(&[
                ("origins", self.origin.as_str()),
                ("destinations", destination),
                ("units", "imperial"),
                ("key", self.api_key.expose_secret().as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if response.status != "OK" {
            return Err(MapsError::Status(response.status));
        }

        let element = response
            .rows
            .into_iter()
            .next()
            .and_then(|row| row.elements.into_iter().next())
            .ok_or(MapsError::NoRoute)?;
        if element.status != "OK" {
            return Err(MapsError::NoRoute);
        }
        let meters = element.distance.ok_or(MapsError::NoRoute)?.value;

        Ok((Decimal::from(meters) / METERS_PER_MILE).round_dp(2))
    }
}

#[derive(Debug, Deserialize)]
struct MatrixResponse {
    status: String,
    #[serde(default)]
    rows: Vec<MatrixRow>,
}

#[derive(Debug, Deserialize)]
struct MatrixRow {
    elements: Vec<MatrixElement>,
}

#[derive(Debug, Deserialize)]
struct MatrixElement {
    status: String,
    distance: Option<MatrixDistance>,
}

#[derive(Debug, Deserialize)]
struct MatrixDistance {
    /// meters
    value: u64,
}
