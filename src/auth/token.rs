//! Bearer token inspection.
//!
//! Access tokens are JWTs. The client never verifies signatures (that is the
//! backend's job); it only decodes the payload segment to read the expiry
//! claim and, as a fallback for the refresh call, the email claim.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::Utc;
use serde::Deserialize;
use tracing::debug;

/// Claims the client cares about. Everything else in the payload is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct Claims {
    /// Expiry as seconds since the Unix epoch.
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Decode the payload segment of a JWT-shaped token.
pub fn decode_claims(token: &str) -> Option<Claims> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.as_bytes()).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Whether the token's expiry claim is in the past.
///
/// A token without an `exp` claim is treated as valid; a token whose payload
/// cannot be decoded is treated as expired (fail-safe: an unreadable token
/// forces the refresh path rather than being sent forever).
pub fn is_expired(token: &str) -> bool {
    match decode_claims(token) {
        Some(claims) => match claims.exp {
            Some(exp) => exp < Utc::now().timestamp(),
            None => false,
        },
        None => {
            debug!("Token payload could not be decoded, treating as expired");
            true
        }
    }
}
