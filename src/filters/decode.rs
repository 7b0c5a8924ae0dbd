//! Transport encoding for filter lists.
//!
//! Query-string filters arrive as `base64(encodeURIComponent(json))`.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

use crate::core::errors::{FxaError, Result};
use crate::filters::condition::FilterCondition;

/// Characters `encodeURIComponent` leaves untouched.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Decode a transport-encoded filter list, reporting why it failed.
pub fn try_decode_filters(encoded: &str) -> Result<Vec<FilterCondition>> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|error| FxaError::InvalidRequest {
            details: format!("filters are not valid base64: {error}"),
        })?;
    let text = String::from_utf8(bytes).map_err(|error| FxaError::InvalidRequest {
        details: format!("filters are not valid UTF-8: {error}"),
    })?;
    let json = percent_decode_str(&text)
        .decode_utf8()
        .map_err(|error| FxaError::InvalidRequest {
            details: format!("filters are not valid percent-encoding: {error}"),
        })?;
    Ok(serde_json::from_str(&json)?)
}

/// Decode a transport-encoded filter list; malformed input yields no filters.
#[must_use]
pub fn decode_filters(encoded: &str) -> Vec<FilterCondition> {
    try_decode_filters(encoded).unwrap_or_else(|error| {
        tracing::warn!(code = error.code(), %error, "ignoring undecodable filters");
        Vec::new()
    })
}

/// Inverse of [`decode_filters`].
pub fn encode_filters(filters: &[FilterCondition]) -> Result<String> {
    let json = serde_json::to_string(filters)?;
    let escaped = utf8_percent_encode(&json, URI_COMPONENT).to_string();
    Ok(STANDARD.encode(escaped))
}
