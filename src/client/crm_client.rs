use std::time::Duration;

use anyhow::Context;

use reqwest::Client;

use serde::Serialize;

use secrecy::Secret;

use url::Url;

const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";
const API_VERSION_HEADER: &str = "Version";
const API_VERSION: &str = "2021-07-28";

/// Contact upserts against the CRM's REST API
#[derive(Debug)]
pub struct CrmClient {
    client: Client,
    location_id: String,

    api_upsert_url: Url,
    api_auth_token: Secret<String>,
}

impl CrmClient {
    pub fn new(
        location_id: String,
        api_timeout: Duration,
        api_base_url: Url,
        api_auth_token: Secret<String>,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(api_timeout)
            .build()
            .context("Failed to build http client")?;

        let api_upsert_url = api_base_url
            .join("contacts/upsert")
            .context("Failed to create contact upsert endpoint URL")?;

        Ok(Self {
            client,
            location_id,
            api_upsert_url,
            api_auth_token,
        })
    }

    /// Create or update a contact and add tags.
    /// Replays with the same `idempotency_key` are safe.
    #[tracing::instrument(name = "Upsert a CRM contact", skip(self, update), fields(email = %update.email))]
    pub async fn upsert_contact(
        &self,
        update: &ContactUpdate,
        idempotency_key: &str,
    ) -> reqwest::Result<()> {
        use secrecy::ExposeSecret;

        let body = UpsertContactRequest {
            location_id: &self.location_id,
            email: &update.email,
            name: update.name.as_deref(),
            phone: update.phone.as_deref(),
            tags: &update.tags,
        };

        self.client
            .post(self.api_upsert_url.clone())
            .bearer_auth(self.api_auth_token.expose_secret())
            .header(API_VERSION_HEADER, API_VERSION)
            .header(IDEMPOTENCY_HEADER, idempotency_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContactUpdate {
    pub email: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpsertContactRequest<'a> {
    location_id: &'a str,
    email: &'a str,
    name: Option<&'a str>,
    phone: Option<&'a str>,
    tags: &'a [String],
}
