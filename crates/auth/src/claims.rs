use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Role;

/// Clock skew tolerated between client and issuer for `iat`.
const IAT_LEEWAY_SECS: i64 = 60;

/// Bearer token claims as read by the client.
///
/// Only the claims the client acts on are modelled; anything else in the
/// payload is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (the username the token was issued to).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Authorities granted to the subject. Missing means none.
    #[serde(default)]
    pub authorities: Vec<Role>,

    /// Issued-at (unix seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Expiration (unix seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (iat is in the future)")]
    NotYetValid,

    #[error("invalid token time window (exp <= iat)")]
    InvalidTimeWindow,
}

/// Check the time window of decoded claims.
///
/// A token without `exp` is accepted; the API stays the authority on validity.
pub fn validate_claims(claims: &TokenClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    let now = now.timestamp();

    if let (Some(iat), Some(exp)) = (claims.iat, claims.exp) {
        if exp <= iat {
            return Err(TokenValidationError::InvalidTimeWindow);
        }
    }
    if let Some(iat) = claims.iat {
        if now + IAT_LEEWAY_SECS < iat {
            return Err(TokenValidationError::NotYetValid);
        }
    }
    if let Some(exp) = claims.exp {
        if now >= exp {
            return Err(TokenValidationError::Expired);
        }
    }
    Ok(())
}
