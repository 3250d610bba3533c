//! Error types for the API client.
//!
//! # Design
//! Every non-2xx or unparseable response becomes a `ClassifiedError` whose
//! `kind` is derived from the status alone, so callers can branch on
//! `name()` or `status` uniformly. Transport-level "could not reach the
//! server" failures are classified too, with status 0. Everything else
//! (aborts, bad request input, other transport faults) keeps its own
//! `ApiError` variant.

use serde::Deserialize;
use thiserror::Error;

use crate::http::TransportError;

pub const DEFAULT_MESSAGE: &str = "Something went wrong";
pub const DEFAULT_CODE: &str = "unknown";
pub const CONNECTION_CODE: &str = "connection_error";

/// Named category of a classified failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Authentication,
    Forbidden,
    NotFound,
    Unprocessable,
    Internal,
    Connection,
}

impl ErrorKind {
    /// Category for an HTTP status. Only meaningful for failed responses.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => ErrorKind::Authentication,
            403 => ErrorKind::Forbidden,
            404 => ErrorKind::NotFound,
            422 => ErrorKind::Unprocessable,
            _ => ErrorKind::Internal,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Authentication => "AuthenticationError",
            ErrorKind::Forbidden => "ForbiddenError",
            ErrorKind::NotFound => "NotFoundError",
            ErrorKind::Unprocessable => "UnprocessableError",
            ErrorKind::Internal => "InternalError",
            ErrorKind::Connection => "ConnectionError",
        }
    }
}

/// A failed or unparseable response, shaped for callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}: {message} (status {status}, code {code})", .kind.name())]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub status: u16,
    pub message: String,
    pub code: String,
}

/// The `message`/`code` fields servers put in error bodies.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    code: Option<String>,
}

impl ClassifiedError {
    pub fn new(status: u16, message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::from_status(status),
            status,
            message: message.into(),
            code: code.into(),
        }
    }

    /// Classify a failed response from its status and (possibly absent) body.
    pub fn from_response(status: u16, body: Option<&serde_json::Value>) -> Self {
        let fields = body
            .filter(|b| b.is_object())
            .and_then(|b| ErrorBody::deserialize(b).ok())
            .unwrap_or_default();
        Self::new(
            status,
            fields.message.unwrap_or_else(|| DEFAULT_MESSAGE.to_string()),
            fields.code.unwrap_or_else(|| DEFAULT_CODE.to_string()),
        )
    }

    /// The response arrived but its body could not be parsed.
    pub fn unparseable(status: u16) -> Self {
        Self::new(status, DEFAULT_MESSAGE, DEFAULT_CODE)
    }

    /// The server could not be reached at all.
    pub fn connection(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Connection,
            status: 0,
            message: message.into(),
            code: CONNECTION_CODE.to_string(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}

/// Errors returned by `ApiClient`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Classified(#[from] ClassifiedError),

    /// The request's cancellation signal fired before it settled.
    #[error("request aborted")]
    Aborted,

    /// A transport failure other than an unreachable server.
    #[error("transport failed: {0}")]
    Transport(TransportError),

    #[error("invalid request body: {0}")]
    InvalidBody(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("endpoint {endpoint} expects {expected} path arguments, got {actual}")]
    PathArguments {
        endpoint: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("serialization failed: {0}")]
    SerializationError(String),

    /// The response parsed but does not match the expected type.
    #[error("deserialization failed: {0}")]
    DeserializationError(String),
}

impl ApiError {
    /// The classified failure, if this is one.
    pub fn classified(&self) -> Option<&ClassifiedError> {
        match self {
            ApiError::Classified(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn statuses_map_to_categories() {
        assert_eq!(ErrorKind::from_status(401).name(), "AuthenticationError");
        assert_eq!(ErrorKind::from_status(403).name(), "ForbiddenError");
        assert_eq!(ErrorKind::from_status(404).name(), "NotFoundError");
        assert_eq!(ErrorKind::from_status(422).name(), "UnprocessableError");
        assert_eq!(ErrorKind::from_status(500).name(), "InternalError");
        assert_eq!(ErrorKind::from_status(409).name(), "InternalError");
    }

    #[test]
    fn from_response_reads_message_and_code() {
        let body = json!({"message": "x", "code": "not_found"});
        let err = ClassifiedError::from_response(404, Some(&body));
        assert_eq!(err.name(), "NotFoundError");
        assert_eq!(err.status, 404);
        assert_eq!(err.message, "x");
        assert_eq!(err.code, "not_found");
    }

    #[test]
    fn from_response_falls_back_to_defaults() {
        let err = ClassifiedError::from_response(500, Some(&json!(["not", "an", "object"])));
        assert_eq!(err.message, DEFAULT_MESSAGE);
        assert_eq!(err.code, DEFAULT_CODE);

        let err = ClassifiedError::from_response(403, None);
        assert_eq!(err.kind, ErrorKind::Forbidden);
        assert_eq!(err.message, DEFAULT_MESSAGE);
    }

    #[test]
    fn connection_errors_have_status_zero() {
        let err = ClassifiedError::connection("failed to fetch");
        assert_eq!(err.name(), "ConnectionError");
        assert_eq!(err.status, 0);
    }

    #[test]
    fn display_includes_name_and_status() {
        let err = ClassifiedError::new(422, "Content can't be blank", "unprocessable");
        assert_eq!(
            err.to_string(),
            "UnprocessableError: Content can't be blank (status 422, code unprocessable)"
        );
    }
}
