use rust_decimal::Decimal;

use serde::{Deserialize, Serialize};

use super::Money;

/// A purchasable service type ("Standard Notary", "Loan Signing", "RON", ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceOffering {
    pub id: String,
    pub name: String,
    pub base_price: Money,
    pub requires_deposit: bool,
    pub deposit_amount: Money,
    pub duration_minutes: i32,
    pub max_signers: i32,
    pub max_documents: i32,
    /// `None` for remote services, where no travel applies
    pub service_radius_miles: Option<Decimal>,
    pub active: bool,
}

impl ServiceOffering {
    pub fn is_remote(&self) -> bool {
        self.service_radius_miles.is_none()
    }

    /// Check the deposit invariant of a configured offering
    pub fn validate(&self) -> Result<(), String> {
        if self.base_price.is_negative() {
            return Err(format!("{} has a negative base price", self.id));
        }
        if self.requires_deposit && self.deposit_amount > self.base_price {
            return Err(format!("{} requires a deposit above its base price", self.id));
        }
        if self.max_signers < 1 || self.max_documents < 1 {
            return Err(format!("{} must include at least one signer and document", self.id));
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn standard_notary() -> ServiceOffering {
        ServiceOffering {
            id: "standard-notary".into(),
            name: "Standard Notary".into(),
            base_price: Money::from_cents(7500),
            requires_deposit: false,
            deposit_amount: Money::ZERO,
            duration_minutes: 60,
            max_signers: 2,
            max_documents: 5,
            service_radius_miles: Some(Decimal::from(50)),
            active: true,
        }
    }

    pub fn loan_signing() -> ServiceOffering {
        ServiceOffering {
            id: "loan-signing".into(),
            name: "Loan Signing".into(),
            base_price: Money::from_cents(15000),
            requires_deposit: true,
            deposit_amount: Money::from_cents(5000),
            duration_minutes: 90,
            max_signers: 4,
            max_documents: 150,
            service_radius_miles: Some(Decimal::from(50)),
            active: true,
        }
    }

    pub fn remote_online() -> ServiceOffering {
        ServiceOffering {
            id: "remote-online".into(),
            name: "Remote Online Notarization".into(),
            base_price: Money::from_cents(3500),
            requires_deposit: false,
            deposit_amount: Money::ZERO,
            duration_minutes: 30,
            max_signers: 1,
            max_documents: 2,
            service_radius_miles: None,
            active: true,
        }
    }
}
