use std::collections::HashMap;
use std::env;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;

use config::{Config, Environment, File};

use rust_decimal::Decimal;

use secrecy::Secret;

use serde::Deserialize;
use serde_aux::prelude::*;

use sqlx::postgres::{PgConnectOptions, PgSslMode};

use url::Url;

use crate::cancellation::CancellationPolicy;
use crate::domain::EmailAddress;
use crate::notifications::RetryPolicy;
use crate::pricing::PricingPolicy;
use crate::reservations::BookingPolicies;

/// Runtime environment, either `Dev` for local development, or `Prod` for release
#[derive(Debug)]
pub enum Runtime {
    Dev,
    Prod,
}

impl Runtime {
    pub fn as_str(&self) -> &str {
        match self {
            Runtime::Dev => "dev",
            Runtime::Prod => "prod",
        }
    }
}

impl TryFrom<String> for Runtime {
    type Error = anyhow::Error;

    fn try_from(s: String) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Self::Dev),
            "prod" => Ok(Self::Prod),
            other => anyhow::bail!("{} is not a valid runtime environment", other),
        }
    }
}

/// Application settings wrapper
#[derive(Debug, Deserialize)]
pub struct Settings {
    pub app: ApplicationSettings,
    pub database: DatabaseSettings,
    pub email: EmailSettings,
    pub crm: CrmSettings,
    pub maps: MapsSettings,
    pub booking: BookingSettings,
    pub pricing: PricingPolicy,
    pub cancellation: CancellationPolicy,
    pub notifications: NotificationSettings,
}

impl Settings {
    /// Load application settings from the settings directory
    pub fn load() -> anyhow::Result<Self> {
        // Get the path to the settings directory
        let path = env::current_dir()?.join("settings");
        // Get the current environment based on the `APP_ENV` environment variable, default to `Dev`
        let runtime: Runtime = env::var("APP_ENV")
            .unwrap_or_else(|_| "dev".into())
            .try_into()?;

        Self::load_from(runtime, &path)
    }
    /// Load application settings from a specified path and runtime
    pub fn load_from(runtime: Runtime, base_path: &Path) -> anyhow::Result<Self> {
        Config::builder()
            // Include the base settings
            .add_source(File::from(base_path.join("base")).required(true))
            // Include the runtime settings
            .add_source(File::from(base_path.join(runtime.as_str())).required(true))
            // Override/include any settings from environment variables
            // NOTE: Should be used for any prod secrets. Takes the form `APP_<settings category>__<setting name>`.
            .add_source(
                Environment::with_prefix("app")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
            .context("Failed to load/deserialize settings")
    }

    /// Pricing, cancellation and hold policies for the reservation manager
    pub fn policies(&self) -> anyhow::Result<BookingPolicies> {
        let hold_ttl = chrono::Duration::from_std(self.booking.hold_ttl())
            .context("Hold TTL is out of range")?;
        if hold_ttl <= chrono::Duration::zero() {
            anyhow::bail!("Hold TTL must be positive");
        }

        Ok(BookingPolicies {
            pricing: self.pricing.clone(),
            cancellation: self.cancellation.clone(),
            hold_ttl,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ApplicationSettings {
    host: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    port: u16,

    secret_key: Secret<String>,
}

impl ApplicationSettings {
    /// The application address to bind to
    pub fn addr(&self) -> (&str, u16) {
        (&self.host, self.port)
    }
    /// The key hold tokens are signed with
    pub fn secret_key(&self) -> &Secret<String> {
        &self.secret_key
    }
}

#[derive(Debug, Deserialize)]
pub struct DatabaseSettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    port: u16,
    host: String,
    name: String,
    username: String,
    password: Secret<String>,
    require_ssl: bool,
}

impl DatabaseSettings {
    /// The database connection options, without specifying the database name
    pub fn without_db(&self) -> PgConnectOptions {
        use secrecy::ExposeSecret;

        let ssl_mode = if self.require_ssl {
            PgSslMode::Require
        } else {
            PgSslMode::Prefer
        };

        PgConnectOptions::new()
            .port(self.port)
            .host(&self.host)
            .ssl_mode(ssl_mode)
            .username(&self.username)
            .password(self.password.expose_secret())
    }
    /// The database connection options, with the database name
    pub fn with_db(&self) -> PgConnectOptions {
        self.without_db().database(&self.name)
    }
}

#[derive(Debug, Deserialize)]
pub struct EmailSettings {
    sender: String,
    api_base_url: String,
    api_auth_token: Secret<String>,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    api_timeout_milliseconds: u64,
}

impl EmailSettings {
    /// The email address to send application emails from
    pub fn sender(&self) -> anyhow::Result<EmailAddress> {
        self.sender
            .parse()
            .map_err(anyhow::Error::msg)
            .context("Failed to parse email sender address")
    }
    /// The email REST API timeout duration
    pub fn api_timeout(&self) -> Duration {
        Duration::from_millis(self.api_timeout_milliseconds)
    }
    /// The base URL for the email REST service
    pub fn api_base_url(&self) -> anyhow::Result<Url> {
        Url::parse(&self.api_base_url).context("Failed to parse email base URL")
    }
    /// The authentication token to include when making email requests
    pub fn api_auth_token(&self) -> Secret<String> {
        self.api_auth_token.clone()
    }
}

#[derive(Debug, Deserialize)]
pub struct CrmSettings {
    location_id: String,
    api_base_url: String,
    api_auth_token: Secret<String>,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    api_timeout_milliseconds: u64,
}

impl CrmSettings {
    /// The CRM sub-account contacts are filed under
    pub fn location_id(&self) -> &str {
        &self.location_id
    }
    pub fn api_timeout(&self) -> Duration {
        Duration::from_millis(self.api_timeout_milliseconds)
    }
    pub fn api_base_url(&self) -> anyhow::Result<Url> {
        Url::parse(&self.api_base_url).context("Failed to parse CRM base URL")
    }
    pub fn api_auth_token(&self) -> Secret<String> {
        self.api_auth_token.clone()
    }
}

#[derive(Debug, Deserialize)]
pub struct MapsSettings {
    /// Where travel is measured from
    base_address: String,
    api_base_url: String,
    api_key: Secret<String>,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    api_timeout_milliseconds: u64,
    /// Farthest distance served at all; also the fallback when the provider is down
    max_radius_miles: Decimal,
    /// Known distances by 5-digit ZIP, consulted before the provider
    #[serde(default)]
    zip_miles: HashMap<String, Decimal>,
}

impl MapsSettings {
    pub fn base_address(&self) -> &str {
        &self.base_address
    }
    pub fn api_timeout(&self) -> Duration {
        Duration::from_millis(self.api_timeout_milliseconds)
    }
    pub fn api_base_url(&self) -> anyhow::Result<Url> {
        Url::parse(&self.api_base_url).context("Failed to parse maps base URL")
    }
    pub fn api_key(&self) -> Secret<String> {
        self.api_key.clone()
    }
    pub fn max_radius_miles(&self) -> Decimal {
        self.max_radius_miles
    }
    pub fn zip_miles(&self) -> &HashMap<String, Decimal> {
        &self.zip_miles
    }
}

#[derive(Debug, Deserialize)]
pub struct BookingSettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    hold_ttl_seconds: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    sweep_interval_seconds: u64,
}

impl BookingSettings {
    /// How long a slot stays held before checkout must complete
    pub fn hold_ttl(&self) -> Duration {
        Duration::from_secs(self.hold_ttl_seconds)
    }
    /// How often lapsed holds are flipped to expired
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds.max(1))
    }
}

#[derive(Debug, Deserialize)]
pub struct NotificationSettings {
    operator_email: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    max_attempts: u32,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    base_delay_milliseconds: u64,
}

impl NotificationSettings {
    /// Where booking alerts and reconciliation warnings go
    pub fn operator_email(&self) -> anyhow::Result<EmailAddress> {
        self.operator_email
            .parse()
            .map_err(anyhow::Error::msg)
            .context("Failed to parse operator email address")
    }
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_millis(self.base_delay_milliseconds),
        }
    }
}
