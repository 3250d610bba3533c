//! HTTP transport types and the default reqwest-backed transport.
//!
//! # Design
//! Requests and responses are plain data. `ApiClient::build_request` and
//! `client::parse_response` never touch the network; a `Transport`
//! performs the round-trip in between. Swapping the transport (for tests,
//! or a host with its own HTTP stack) needs no other change.
//!
//! `credentials` and `referrer_policy` only mean something to a browser
//! `fetch`; they travel with the request for transports that understand
//! them and are ignored by `ReqwestTransport`.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::redirect::Policy;
use thiserror::Error;

use crate::body::{Body, FormField};
use crate::params::{Credentials, RedirectPolicy};

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully assembled outbound request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    /// Base URL + path + query string.
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Body,
    pub credentials: Option<Credentials>,
    pub redirect: RedirectPolicy,
    pub referrer_policy: Option<String>,
}

impl HttpRequest {
    /// First header named `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// A response as returned by a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The server could not be reached (DNS, refused connection, reset, timeout).
    #[error("failed to fetch: {0}")]
    Connection(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("redirect refused: {0}")]
    Redirect(String),

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("transport setup failed: {0}")]
    Setup(String),
}

/// Performs one HTTP round-trip.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Default transport over a pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    following: reqwest::Client,
    unfollowed: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        let build = |policy: Policy| {
            reqwest::Client::builder()
                .redirect(policy)
                .build()
                .map_err(|e| TransportError::Setup(e.to_string()))
        };
        Ok(Self {
            following: build(Policy::default())?,
            unfollowed: build(Policy::none())?,
        })
    }

    fn client_for(&self, redirect: RedirectPolicy) -> &reqwest::Client {
        match redirect {
            RedirectPolicy::Follow => &self.following,
            RedirectPolicy::Error | RedirectPolicy::Manual => &self.unfollowed,
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };
        let mut builder = self
            .client_for(request.redirect)
            .request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match request.body {
            Body::Empty => builder,
            Body::Text(text) => builder.body(text),
            Body::Multipart(fields) => builder.multipart(multipart_form(fields)?),
        };

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        if request.redirect == RedirectPolicy::Error && (300..400).contains(&status) {
            return Err(TransportError::Redirect(format!(
                "{} answered {status}",
                request.url
            )));
        }
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Body(e.to_string()))?;
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn multipart_form(fields: Vec<(String, FormField)>) -> Result<Form, TransportError> {
    let mut form = Form::new();
    for (name, field) in fields {
        form = match field {
            FormField::Text(text) => form.text(name, text),
            FormField::File {
                data,
                file_name,
                content_type,
            } => {
                let mut part = Part::bytes(data.to_vec());
                if let Some(file_name) = file_name {
                    part = part.file_name(file_name);
                }
                if let Some(content_type) = content_type {
                    part = part
                        .mime_str(&content_type)
                        .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
                }
                form.part(name, part)
            }
        };
    }
    Ok(form)
}

fn map_reqwest_error(error: reqwest::Error) -> TransportError {
    if error.is_builder() {
        TransportError::InvalidRequest(error.to_string())
    } else if error.is_redirect() {
        TransportError::Redirect(error.to_string())
    } else if error.is_connect() || error.is_timeout() || error.is_request() {
        TransportError::Connection(error.to_string())
    } else {
        TransportError::Body(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_covers_2xx_only() {
        assert!(HttpResponse::new(200, "").ok());
        assert!(HttpResponse::new(204, "").ok());
        assert!(!HttpResponse::new(199, "").ok());
        assert!(!HttpResponse::new(301, "").ok());
        assert!(!HttpResponse::new(404, "").ok());
    }

    #[test]
    fn header_lookup_ignores_case() {
        let request = HttpRequest {
            method: HttpMethod::Get,
            url: "http://localhost/v1/users/me".to_string(),
            headers: vec![("Authorization".to_string(), "Bearer X".to_string())],
            body: Body::Empty,
            credentials: None,
            redirect: RedirectPolicy::Follow,
            referrer_policy: None,
        };
        assert_eq!(request.header("authorization"), Some("Bearer X"));
        assert_eq!(request.header("content-type"), None);
    }

    #[test]
    fn file_parts_reject_bad_mime() {
        let fields = vec![(
            "file".to_string(),
            FormField::File {
                data: Bytes::from_static(b"x"),
                file_name: None,
                content_type: Some("not a mime".to_string()),
            },
        )];
        assert!(matches!(
            multipart_form(fields),
            Err(TransportError::InvalidRequest(_))
        ));
    }
}
