//! Recovers a single JSON object from a raw model response.
use serde_json::Value;
use thiserror::Error;

use super::untrusted::UntrustedPayload;
use crate::util::text::sanitize_sample;

/// Upper bound of the diagnostic sample attached to [`ExtractError::MalformedJson`].
pub const SAMPLE_MAX_CHARS: usize = 300;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("no JSON object found in model response")]
    NoObjectFound,
    #[error("model response is not valid JSON: {sample}")]
    MalformedJson { sample: String },
}

/// Parses `raw` as a JSON object, tolerating code fences and surrounding prose.
///
/// # Errors
/// [`ExtractError::NoObjectFound`] when the text holds no `{...}` pair, and
/// [`ExtractError::MalformedJson`] when the braced region does not parse as
/// an object.
pub fn extract_object(raw: &str) -> Result<UntrustedPayload, ExtractError> {
    let body = strip_fences(raw.trim()).trim();

    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(body) {
        return Ok(UntrustedPayload::new(value));
    }

    let (Some(start), Some(end)) = (body.find('{'), body.rfind('}')) else {
        return Err(ExtractError::NoObjectFound);
    };
    if end < start {
        return Err(ExtractError::NoObjectFound);
    }

    let candidate = &body[start..=end];
    match serde_json::from_str::<Value>(candidate) {
        Ok(value @ Value::Object(_)) => Ok(UntrustedPayload::new(value)),
        _ => Err(ExtractError::MalformedJson {
            sample: sanitize_sample(candidate, SAMPLE_MAX_CHARS),
        }),
    }
}

/// Removes a leading ```` ```lang ```` line and a trailing ```` ``` ```` marker.
fn strip_fences(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // drop the info string ("json", "JSON", ...) up to the first newline
    let rest = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest)
}
