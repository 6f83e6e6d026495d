//! Bearer token inspection.
//!
//! Tokens are three dot-separated segments whose middle segment is a base64
//! JSON object carrying an `exp` claim in seconds. Signatures are never
//! checked here; that is the auth server's job. Anything that does not decode
//! is reported as invalid rather than as an error.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};

const LENIENT: GeneralPurposeConfig =
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent);
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);

/// Whether `token` is structurally sound and unexpired right now.
#[must_use]
pub fn is_token_valid(token: &str) -> bool {
    is_token_valid_at(token, now_millis())
}

/// Whether `token` is structurally sound and its `exp` lies after `now_ms`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn is_token_valid_at(token: &str, now_ms: i64) -> bool {
    token_expiry(token).is_some_and(|exp| exp * 1000.0 > now_ms as f64)
}

/// Extract the `exp` claim (seconds since epoch) from a token payload.
#[must_use]
pub fn token_expiry(token: &str) -> Option<f64> {
    let mut parts = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return None;
    };
    if token.split('.').any(str::is_empty) {
        return None;
    }

    let bytes = decode_segment(payload)?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    claims.get("exp")?.as_f64()
}

fn decode_segment(segment: &str) -> Option<Vec<u8>> {
    URL_SAFE_LENIENT
        .decode(segment)
        .or_else(|_| STANDARD_LENIENT.decode(segment))
        .ok()
}

/// Milliseconds since the Unix epoch, saturating on clock anomalies.
#[must_use]
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
}

#[cfg(test)]
#[path = "token_test.rs"]
mod tests;
