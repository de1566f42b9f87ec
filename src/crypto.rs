mod hold_token;
mod signing_key;

pub use hold_token::{HoldClaims, HoldToken, TokenError, TokenResult};
pub use signing_key::SigningKey;
