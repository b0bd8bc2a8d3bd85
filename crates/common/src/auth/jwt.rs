//! Minimal JWT claim decoding
//!
//! Only the `exp` claim is read. Signatures are not verified; the server is
//! the authority on validity and the client only uses `exp` to schedule
//! refreshes.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Deserialize)]
struct ExpiryClaim {
    exp: Option<f64>,
}

/// Decode the `exp` claim (seconds since epoch) of a JWT.
///
/// Returns `None` for anything that is not a three-segment token with a
/// base64url JSON payload carrying a finite numeric `exp`.
#[must_use]
pub fn decode_expiry(token: &str) -> Option<DateTime<Utc>> {
    let mut segments = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (segments.next(), segments.next(), segments.next(), segments.next())
    else {
        return None;
    };

    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claim: ExpiryClaim = serde_json::from_slice(&bytes).ok()?;
    let exp = claim.exp.filter(|exp| exp.is_finite())?;

    #[allow(clippy::cast_possible_truncation)]
    let millis = (exp * 1000.0).round() as i64;
    DateTime::from_timestamp_millis(millis)
}
