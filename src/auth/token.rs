//! Expiry of the bearer token (a JWT).

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

#[derive(Deserialize)]
struct Claims {
  exp: Option<i64>,
}

/// The `exp` claim of a JWT, or `None` if the token cannot be decoded.
pub fn expiry(token: &str) -> Option<DateTime<Utc>> {
  let payload = token.split('.').nth(1)?;
  let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
  let claims: Claims = serde_json::from_slice(&bytes).ok()?;
  DateTime::from_timestamp(claims.exp?, 0)
}

/// Whether the token must be renewed before use. Undecodable tokens count
/// as expired, as do tokens expiring within `leeway` of `now`.
pub fn is_expired(token: &str, now: DateTime<Utc>, leeway: Duration) -> bool {
  match expiry(token) {
    Some(exp) => exp - leeway <= now,
    None => true,
  }
}

/// An unsigned JWT carrying only an `exp` claim.
#[cfg(test)]
pub(crate) fn test_token(exp: DateTime<Utc>) -> String {
  let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
  let claims = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"1","exp":{}}}"#, exp.timestamp()));
  format!("{}.{}.signature", header, claims)
}
