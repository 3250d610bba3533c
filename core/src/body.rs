//! Request body formatting by declared content kind.
//!
//! # Design
//! A payload is either a JSON value or an explicit list of multipart
//! fields (the only way to carry binary data). `format_body` is a pure
//! match from `ContentType` to the wire representation.
//!
//! `null` means absent everywhere in a payload: a null body formats to no
//! body, and null form-data fields are left out instead of being sent as
//! the text `"null"`. URL-encoded bodies follow the query codec, which drops
//! nulls the same way.

use bytes::Bytes;
use serde_json::Value;

use crate::error::ApiError;
use crate::query::{encode_query, json_kind, scalar_text};

/// Declared wire encoding of a request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ContentType {
    #[default]
    Json,
    FormData,
    UrlEncoded,
    Text,
}

impl ContentType {
    /// MIME type sent in the `Content-Type` header.
    pub fn mime(self) -> &'static str {
        match self {
            ContentType::Json => "application/json",
            ContentType::FormData => "multipart/form-data",
            ContentType::UrlEncoded => "application/x-www-form-urlencoded",
            ContentType::Text => "text/plain",
        }
    }
}

/// A single multipart field.
#[derive(Debug, Clone, PartialEq)]
pub enum FormField {
    Text(String),
    File {
        data: Bytes,
        file_name: Option<String>,
        content_type: Option<String>,
    },
}

/// The caller-supplied request payload, before formatting.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Multipart(Vec<(String, FormField)>),
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Json(value)
    }
}

/// A formatted body, ready for a transport.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Body {
    #[default]
    Empty,
    Text(String),
    Multipart(Vec<(String, FormField)>),
}

impl Body {
    pub fn is_empty(&self) -> bool {
        matches!(self, Body::Empty)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Body::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// Convert `payload` into the wire body for `kind`.
pub fn format_body(kind: ContentType, payload: Payload) -> Result<Body, ApiError> {
    match (kind, payload) {
        (_, Payload::Json(Value::Null)) => Ok(Body::Empty),
        // Strings are taken as already encoded.
        (ContentType::Json | ContentType::Text, Payload::Json(Value::String(s))) => Ok(Body::Text(s)),
        (ContentType::Json | ContentType::Text, Payload::Json(value)) => serde_json::to_string(&value)
            .map(Body::Text)
            .map_err(|e| ApiError::SerializationError(e.to_string())),
        (ContentType::FormData, Payload::Multipart(fields)) => Ok(Body::Multipart(fields)),
        (ContentType::FormData, Payload::Json(Value::Object(fields))) => {
            let mut parts = Vec::with_capacity(fields.len());
            for (key, value) in fields {
                let text = match &value {
                    Value::Null => continue,
                    Value::Object(_) | Value::Array(_) => serde_json::to_string(&value)
                        .map_err(|e| ApiError::SerializationError(e.to_string()))?,
                    scalar => scalar_text(scalar),
                };
                parts.push((key, FormField::Text(text)));
            }
            Ok(Body::Multipart(parts))
        }
        (ContentType::UrlEncoded, Payload::Json(Value::Object(fields))) => {
            Ok(Body::Text(encode_query(&fields)))
        }
        (kind, Payload::Json(other)) => Err(ApiError::InvalidBody(format!(
            "{} body needs an object, got {}",
            kind.mime(),
            json_kind(&other)
        ))),
        (kind, Payload::Multipart(_)) => Err(ApiError::InvalidBody(format!(
            "multipart fields cannot be sent as {}",
            kind.mime()
        ))),
    }
}
