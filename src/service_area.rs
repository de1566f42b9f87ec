use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;

use serde::Serialize;

use crate::client::{MapsClient, MapsError};
use crate::domain::{Address, Money};
use crate::pricing::PricingPolicy;

/// Something that can measure driving miles from the business base
#[async_trait::async_trait]
pub trait DistanceProvider: Send + Sync {
    async fn driving_miles(&self, destination: &str) -> Result<Decimal, MapsError>;
}

#[async_trait::async_trait]
impl DistanceProvider for MapsClient {
    async fn driving_miles(&self, destination: &str) -> Result<Decimal, MapsError> {
        MapsClient::driving_miles(self, destination).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceAreaAdvisory {
    OutOfServiceArea,
    /// The maps provider was unavailable; `miles` is a conservative estimate
    UpstreamDegraded,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistanceResolution {
    pub miles: Decimal,
    pub within_service_area: bool,
    pub rate_applied: Money,
    pub advisory: Option<ServiceAreaAdvisory>,
}

/// Resolves addresses to distance from base and service-area membership
pub struct ServiceAreaResolver {
    provider: Arc<dyn DistanceProvider>,
    zip_miles: HashMap<String, Decimal>,
    max_radius_miles: Decimal,
    policy: PricingPolicy,
}

impl ServiceAreaResolver {
    pub fn new(
        provider: Arc<dyn DistanceProvider>,
        zip_miles: HashMap<String, Decimal>,
        max_radius_miles: Decimal,
        policy: PricingPolicy,
    ) -> Self {
        Self {
            provider,
            zip_miles,
            max_radius_miles,
            policy,
        }
    }

    /// Never fails: provider outages degrade to the max radius with an advisory.
    ///
    /// `service_radius` overrides the configured max radius for the area check.
    #[tracing::instrument(name = "Resolve service area", skip(self))]
    pub async fn resolve(&self, address: &Address, service_radius: Option<Decimal>) -> DistanceResolution {
        let radius = service_radius.unwrap_or(self.max_radius_miles);

        let (miles, degraded) = match self.from_zip_table(address) {
            Some(miles) => (miles, false),
            None => match self.provider.driving_miles(address.as_ref()).await {
                Ok(miles) => (miles, false),
                Err(e) => {
                    tracing::warn!(error = %e, "Distance lookup failed, assuming max radius");
                    (self.max_radius_miles, true)
                }
            },
        };

        let within_service_area = miles <= radius;
        let advisory = if degraded {
            Some(ServiceAreaAdvisory::UpstreamDegraded)
        } else if !within_service_area {
            Some(ServiceAreaAdvisory::OutOfServiceArea)
        } else {
            None
        };

        DistanceResolution {
            miles,
            within_service_area,
            rate_applied: self.rate_applied(miles),
            advisory,
        }
    }

    fn from_zip_table(&self, address: &Address) -> Option<Decimal> {
        address
            .zip_code()
            .and_then(|zip| self.zip_miles.get(zip))
            .copied()
    }

    fn rate_applied(&self, miles: Decimal) -> Money {
        if miles <= self.policy.included_radius_miles {
            Money::ZERO
        } else {
            self.policy.rate_for(miles)
        }
    }
}
