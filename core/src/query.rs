//! Query-string encoding for request parameters.
//!
//! # Design
//! Parameters are a JSON object so callers can pass anything serde can
//! serialize. `null` stands in for an absent value (`Option::None`) and is
//! dropped. Arrays repeat the key with a `[]` suffix and nested objects
//! expand to `key[sub]`, recursively. Keys keep the object's insertion
//! order; nothing is sorted.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ApiError;

/// Characters left untouched by `encodeURIComponent`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Percent-encode a single key or value component.
pub fn encode_component(input: &str) -> String {
    utf8_percent_encode(input, COMPONENT).to_string()
}

/// Encode `query` as `?a=1&b=2`, or an empty string when nothing is left
/// after dropping absent values.
pub fn to_query_string(query: &Map<String, Value>) -> String {
    let encoded = encode_query(query);
    if encoded.is_empty() {
        encoded
    } else {
        format!("?{encoded}")
    }
}

/// Encode `query` without the leading `?`.
pub fn encode_query(query: &Map<String, Value>) -> String {
    let mut pairs = Vec::new();
    for (key, value) in query {
        encode_pair(&mut pairs, &encode_component(key), value);
    }
    pairs.join("&")
}

/// Serialize any value into a query mapping. Anything that does not
/// serialize to a JSON object is rejected.
pub fn to_query<Q: Serialize>(query: &Q) -> Result<Map<String, Value>, ApiError> {
    match serde_json::to_value(query) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(ApiError::InvalidQuery(format!(
            "expected an object, got {}",
            json_kind(&other)
        ))),
        Err(e) => Err(ApiError::SerializationError(e.to_string())),
    }
}

fn encode_pair(pairs: &mut Vec<String>, key: &str, value: &Value) {
    match value {
        Value::Null => {}
        Value::Array(items) => {
            let key = format!("{key}[]");
            for item in items {
                encode_pair(pairs, &key, item);
            }
        }
        Value::Object(fields) => {
            for (sub, item) in fields {
                encode_pair(pairs, &format!("{key}[{}]", encode_component(sub)), item);
            }
        }
        scalar => pairs.push(format!("{key}={}", encode_component(&scalar_text(scalar)))),
    }
}

/// Text form of a scalar, matching how the value would be stringified in a URL.
pub(crate) fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
