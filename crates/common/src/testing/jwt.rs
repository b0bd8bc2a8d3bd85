//! Unsigned JWT builders

use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

/// Build a JWT whose payload is `payload_json`, verbatim
#[must_use]
pub fn make_jwt_with_payload(payload_json: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(payload_json.as_bytes());
    format!("{header}.{payload}.signature")
}

/// Build a JWT with `exp` set to `exp_secs` seconds since the epoch
#[must_use]
pub fn make_jwt(exp_secs: i64) -> String {
    make_jwt_with_payload(&format!(r#"{{"token_type":"access","exp":{exp_secs},"user_id":1}}"#))
}

/// Build a JWT expiring `secs` seconds from the real current time
#[must_use]
pub fn make_jwt_expiring_in(secs: i64) -> String {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
    make_jwt(i64::try_from(now).unwrap_or(i64::MAX) + secs)
}
