//! Asynchronous API client core for the organizations/users service.
//!
//! # Overview
//! Every call flows through one executor: options are layered (client
//! defaults, security worker, per-call), the query string and body are
//! encoded, a pluggable `Transport` performs the round-trip and the
//! response is parsed or classified into a `ClassifiedError`.
//!
//! # Design
//! - `ApiClient::build_request` and `client::parse_response` are pure; the
//!   transport is the only I/O, so tests swap it for scripted ones.
//! - Endpoints are a static table of `EndpointDescriptor`s executed by
//!   one generic call path; `Endpoint<T>` adds the response type and cache keys.
//! - Requests that carry a `CancelKey` can be aborted through the client's
//!   `CancellationRegistry` until they settle.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod body;
pub mod cancel;
pub mod client;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod http;
pub mod params;
pub mod query;
pub mod types;

pub use body::{Body, ContentType, FormField, Payload};
pub use cancel::{CancelKey, CancellationRegistry, Registration};
pub use client::{parse_response, ApiClient, RequestConfig, ResponseData};
pub use config::{ClientConfig, SecurityWorker};
pub use endpoints::{Call, Endpoint, EndpointDescriptor, QueryKey, ENDPOINTS};
pub use error::{ApiError, ClassifiedError, ErrorKind};
pub use http::{HttpMethod, HttpRequest, HttpResponse, ReqwestTransport, Transport, TransportError};
pub use params::{Credentials, RedirectPolicy, RequestParams, ResponseFormat};
pub use query::to_query_string;
