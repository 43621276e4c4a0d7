//! Token shape detection.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use serde_json::Value;

/// base64url, padded or not.
const SEGMENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Whether a token looks like a signed JWT rather than an API key.
///
/// Only the structure is checked: three dot-separated segments, a header that
/// decodes to a JSON object and a non-empty payload. The algorithm, the
/// signature and the claims are not looked at.
pub fn is_jwt(token: &str) -> bool {
    let is_jwt = decodes(token);
    tracing::debug!("token type: {}", if is_jwt { "'jwt'" } else { "'apiKey'" });
    is_jwt
}

fn decodes(token: &str) -> bool {
    let mut segments = token.split('.');
    let (Some(header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return false;
    };
    let Ok(header) = SEGMENT.decode(header) else {
        return false;
    };
    if !matches!(serde_json::from_slice::<Value>(&header), Ok(Value::Object(_))) {
        return false;
    }
    matches!(SEGMENT.decode(payload), Ok(payload) if !payload.is_empty())
}
