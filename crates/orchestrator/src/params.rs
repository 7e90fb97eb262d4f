//! Syntactic validation of user-supplied parameter payloads.
//!
//! Only well-formedness is checked here. Whether the parameters fit a
//! service's schema is decided later, when the service definition merges
//! them with plan defaults.

use serde_json::{Map, Value};

use crate::error::BrokerError;

/// Returns true if `payload` is absent, empty, or well-formed JSON.
///
/// Any JSON value is accepted (object, array or scalar), including the
/// literal `null`.
pub fn is_valid_or_empty_json(payload: Option<&str>) -> bool {
    match payload {
        None => true,
        Some(raw) if raw.trim().is_empty() => true,
        Some(raw) => serde_json::from_str::<serde::de::IgnoredAny>(raw).is_ok(),
    }
}

/// Reject a malformed payload with `InvalidParameters`.
pub fn ensure_valid_or_empty_json(payload: Option<&str>) -> Result<(), BrokerError> {
    match payload {
        None => Ok(()),
        Some(raw) if raw.trim().is_empty() => Ok(()),
        Some(raw) => serde_json::from_str::<serde::de::IgnoredAny>(raw)
            .map(|_| ())
            .map_err(|e| BrokerError::InvalidParameters {
                reason: e.to_string(),
            }),
    }
}

/// Parse a payload into a parameter map for merging.
///
/// Absent, empty and `null` payloads become an empty map. Any other
/// non-object value is rejected: parameters are merged key by key.
pub fn parse_parameters(payload: Option<&str>) -> Result<Map<String, Value>, BrokerError> {
    let raw = match payload {
        None => return Ok(Map::new()),
        Some(raw) if raw.trim().is_empty() => return Ok(Map::new()),
        Some(raw) => raw,
    };

    let value: Value = serde_json::from_str(raw).map_err(|e| BrokerError::InvalidParameters {
        reason: e.to_string(),
    })?;
    match value {
        Value::Null => Ok(Map::new()),
        Value::Object(map) => Ok(map),
        other => Err(BrokerError::InvalidParameters {
            reason: format!(
                "parameters must be a JSON object, got {}",
                json_type_name(&other)
            ),
        }),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
