use serde::{Deserialize, Serialize};

use unicode_segmentation::UnicodeSegmentation;

use super::{EmailAddress, PersonName};

const MAX_PHONE_LEN: usize = 32;
const MAX_LOCATION_LEN: usize = 512;

/// Contact details captured on the booking form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerContact {
    pub name: PersonName,
    pub email: EmailAddress,
    pub phone: Option<String>,
}

impl CustomerContact {
    pub fn new(name: &str, email: &str, phone: Option<&str>) -> Result<Self, String> {
        let name = name.parse()?;
        let email = email.parse()?;
        let phone = match phone.map(str::trim) {
            Some(phone) if phone.is_empty() => None,
            Some(phone) if phone.graphemes(true).count() > MAX_PHONE_LEN => {
                return Err("Phone number too long".into())
            }
            Some(phone) => Some(phone.to_string()),
            None => None,
        };
        Ok(Self { name, email, phone })
    }
}

/// Normalize an optional free-text appointment location
pub fn parse_location(location: Option<&str>) -> Result<Option<String>, String> {
    match location.map(str::trim) {
        None => Ok(None),
        Some(value) if value.is_empty() => Ok(None),
        Some(value) if value.graphemes(true).count() > MAX_LOCATION_LEN => {
            Err("Location too long".into())
        }
        Some(value) => Ok(Some(value.to_string())),
    }
}
