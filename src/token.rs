//! Expiry checks for bearer tokens.
//!
//! Tokens are JWTs, but the signature is never verified: the only question
//! asked here is whether the `exp` claim has passed. The server remains the
//! authority, and a wrong answer is corrected by the 401 handling in the
//! worker.

use base64::Engine as _;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::TokenError;

// base64url, accepting segments with or without padding.
const SEGMENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// True while `token` has not yet expired.
pub fn is_valid(token: &str) -> Result<bool, TokenError> {
    is_valid_at(token, Utc::now())
}

/// Clock-injected form of [`is_valid`].
pub fn is_valid_at(token: &str, now: DateTime<Utc>) -> Result<bool, TokenError> {
    let expiry = expires_at(token)?;
    Ok(now <= expiry)
}

/// Decode the `exp` claim. Fractional seconds are truncated.
pub fn expires_at(token: &str) -> Result<DateTime<Utc>, TokenError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(TokenError::Malformed(format!(
            "expected 3 segments, found {}",
            segments.len()
        )));
    }

    decode_segment(segments[0], "header")?;
    let claims = decode_segment(segments[1], "claims")?;

    let exp = claims
        .get("exp")
        .and_then(Value::as_f64)
        .ok_or_else(|| TokenError::Malformed("missing or non-numeric exp claim".into()))?;

    DateTime::from_timestamp(exp as i64, 0)
        .ok_or_else(|| TokenError::Malformed(format!("exp claim out of range: {exp}")))
}

fn decode_segment(segment: &str, what: &str) -> Result<serde_json::Map<String, Value>, TokenError> {
    let bytes = SEGMENT
        .decode(segment)
        .map_err(|e| TokenError::Malformed(format!("{what} is not base64url: {e}")))?;
    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(TokenError::Malformed(format!("{what} is not a JSON object"))),
        Err(e) => Err(TokenError::Malformed(format!("{what} is not JSON: {e}"))),
    }
}

#[cfg(test)]
pub(crate) fn make_token(claims: serde_json::Value) -> String {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.signature")
}
