use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;

use hmac::Mac;

use serde::{Deserialize, Serialize};

use uuid::Uuid;

use super::SigningKey;

/// Various errors that can occur when handling hold tokens
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Token signature does not match")]
    SignatureMismatch,
    #[error("Token was issued for a different reservation")]
    ReservationMismatch,
    #[error("Failed to decode or encode token")]
    DecodeEncodeError,
}

impl From<serde_json::Error> for TokenError {
    fn from(_e: serde_json::Error) -> Self {
        Self::DecodeEncodeError
    }
}

impl From<base64::DecodeError> for TokenError {
    fn from(_e: base64::DecodeError) -> Self {
        Self::DecodeEncodeError
    }
}

pub type TokenResult<T> = Result<T, TokenError>;

/// What a hold token vouches for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldClaims {
    pub reservation_id: Uuid,
    pub holder_id: String,
}

/// Signed proof that the bearer placed a hold: `<base64 claims>.<base64 signature>`.
///
/// Tokens carry no expiry of their own; the reservation's `expires_at` governs.
#[derive(Debug, Clone, PartialEq)]
pub struct HoldToken(String);

impl HoldToken {
    pub fn sign(claims: &HoldClaims, key: &SigningKey) -> TokenResult<Self> {
        let msg = serde_json::to_vec(claims)?;
        let sig = key.as_ref().clone().chain_update(&msg).finalize().into_bytes();

        Ok(Self(format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(msg),
            URL_SAFE_NO_PAD.encode(sig)
        )))
    }

    /// Verify the signature and decode the claims
    pub fn verify(&self, key: &SigningKey) -> TokenResult<HoldClaims> {
        let (msg, sig) = self
            .0
            .split_once('.')
            .ok_or(TokenError::DecodeEncodeError)?;
        let msg = URL_SAFE_NO_PAD.decode(msg)?;
        let sig = URL_SAFE_NO_PAD.decode(sig)?;

        key.as_ref()
            .clone()
            .chain_update(&msg)
            .verify_slice(&sig)
            .map_err(|_| TokenError::SignatureMismatch)?;

        Ok(serde_json::from_slice(&msg)?)
    }

    /// Verify the token and check it was issued for `reservation_id`
    pub fn verify_for(&self, key: &SigningKey, reservation_id: Uuid) -> TokenResult<HoldClaims> {
        let claims = self.verify(key)?;
        if claims.reservation_id != reservation_id {
            return Err(TokenError::ReservationMismatch);
        }
        Ok(claims)
    }
}

impl AsRef<str> for HoldToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for HoldToken {
    type Err = TokenError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let token = token.trim();
        if token.is_empty() {
            return Err(TokenError::DecodeEncodeError);
        }
        Ok(Self(token.to_string()))
    }
}

impl fmt::Display for HoldToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
