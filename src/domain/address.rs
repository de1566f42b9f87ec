use std::fmt;
use std::str::FromStr;

use regex::Regex;

use unicode_segmentation::UnicodeSegmentation;

const MAX_LEN: usize = 512;

lazy_static::lazy_static! {
    static ref ZIP_REGEX: Regex = Regex::new(r"^(\d{5})(-\d{4})?$").expect("zip pattern is valid");
}

/// A street address or bare ZIP code for an on-site appointment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address(String);

impl Address {
    /// The 5-digit ZIP when the address is nothing but a ZIP (or ZIP+4)
    pub fn zip_code(&self) -> Option<&str> {
        ZIP_REGEX
            .captures(&self.0)
            .and_then(|captures| captures.get(1))
            .map(|zip| zip.as_str())
    }
}

impl FromStr for Address {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if value.is_empty() {
            return Err("Address cannot be empty".into());
        }
        if value.graphemes(true).count() > MAX_LEN {
            return Err("Address too long".into());
        }
        Ok(Self(value.to_string()))
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
