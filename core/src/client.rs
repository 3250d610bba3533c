//! Request executor for the organizations/users API.
//!
//! # Design
//! `ApiClient` splits every call into three steps:
//! - `build_request` turns a `RequestConfig` plus merged `RequestParams`
//!   into a plain-data `HttpRequest` (no I/O).
//! - a `Transport` performs the round-trip, raced against the request's
//!   cancellation signal.
//! - `parse_response` turns the `HttpResponse` into data or a
//!   `ClassifiedError` (no I/O).
//!
//! `execute` glues them together with the security worker and the
//! cancellation registry. The only state shared between calls is the
//! security data and the registry; calls are otherwise independent.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::body::{format_body, Body, ContentType, Payload};
use crate::cancel::{CancelKey, CancellationRegistry};
use crate::config::{ClientConfig, SecurityWorker};
use crate::error::{ApiError, ClassifiedError};
use crate::http::{HttpMethod, HttpRequest, HttpResponse, ReqwestTransport, Transport, TransportError};
use crate::params::{RequestParams, ResponseFormat};
use crate::query::{json_kind, to_query_string};

/// Description of one outbound call.
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub method: HttpMethod,
    /// Path with placeholders already substituted.
    pub path: String,
    /// Must be a JSON object when set.
    pub query: Option<Value>,
    pub body: Option<Payload>,
    /// Body encoding; JSON when unset. The `Content-Type` header is only
    /// sent when this is set.
    pub content_type: Option<ContentType>,
    /// Response parsing; no body is read when unset.
    pub format: Option<ResponseFormat>,
    pub params: RequestParams,
}

impl RequestConfig {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            body: None,
            content_type: None,
            format: None,
            params: RequestParams::default(),
        }
    }

    pub fn query(mut self, query: Value) -> Self {
        self.query = Some(query);
        self
    }

    pub fn body(mut self, body: impl Into<Payload>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = Some(content_type);
        self
    }

    pub fn format(mut self, format: ResponseFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn params(mut self, params: RequestParams) -> Self {
        self.params = params;
        self
    }
}

/// A successfully parsed response body.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseData {
    Json(Value),
    Text(String),
    Bytes(Bytes),
}

impl ResponseData {
    /// Deserialize into a typed value. Text bodies deserialize as a JSON string.
    pub fn deserialize<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        let value = match self {
            ResponseData::Json(value) => value,
            ResponseData::Text(text) => Value::String(text),
            ResponseData::Bytes(_) => {
                return Err(ApiError::DeserializationError(
                    "binary response cannot be deserialized".to_string(),
                ))
            }
        };
        serde_json::from_value(value).map_err(|e| ApiError::DeserializationError(e.to_string()))
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResponseData::Json(value) => Some(value),
            _ => None,
        }
    }
}

/// Asynchronous client for the organizations/users API.
pub struct ApiClient<S = ()> {
    base_url: String,
    base_params: RequestParams,
    security_data: RwLock<Option<S>>,
    security_worker: Option<Arc<dyn SecurityWorker<S>>>,
    transport: Arc<dyn Transport>,
    cancellations: CancellationRegistry,
}

impl<S> ApiClient<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn new(config: ClientConfig<S>) -> Result<Self, ApiError> {
        let transport: Arc<dyn Transport> = match config.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new().map_err(ApiError::Transport)?),
        };
        Ok(Self {
            base_url: config.base_url,
            base_params: config.base_params,
            security_data: RwLock::new(config.security_data),
            security_worker: config.security_worker,
            transport,
            cancellations: CancellationRegistry::new(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Replace the security data. Requests already past their security
    /// worker keep the value they captured.
    pub async fn set_security_data(&self, data: Option<S>) {
        *self.security_data.write().await = data;
    }

    /// Abort the in-flight request registered under `key`, if any.
    pub fn abort_request(&self, key: &CancelKey) {
        debug!(%key, "aborting request");
        self.cancellations.abort(key);
    }

    pub fn cancellations(&self) -> &CancellationRegistry {
        &self.cancellations
    }

    /// Execute `config` and return the parsed body, `None` when no format
    /// was declared or the response was 204.
    pub async fn execute(&self, config: RequestConfig) -> Result<Option<ResponseData>, ApiError> {
        let secure = config
            .params
            .secure
            .or(self.base_params.secure)
            .unwrap_or(false);
        let security_params = if secure {
            self.security_params().await
        } else {
            None
        };
        let params = self
            .base_params
            .clone()
            .merge(security_params.unwrap_or_default())
            .merge(config.params.clone());

        let request = self.build_request(&config, &params)?;

        let registration = params
            .cancel_key
            .as_ref()
            .map(|key| (key, self.cancellations.resolve(key)));
        let signal = match &registration {
            Some((_, registration)) => Some(registration.token.clone()),
            None => params.signal.clone(),
        };

        debug!(method = %request.method, url = %request.url, "sending request");
        let sent = match signal {
            Some(signal) => {
                tokio::select! {
                    biased;
                    _ = signal.cancelled() => None,
                    result = self.transport.send(request) => Some(result),
                }
            }
            None => Some(self.transport.send(request).await),
        };

        let outcome = match sent {
            None => {
                debug!(path = %config.path, "request aborted");
                Err(ApiError::Aborted)
            }
            Some(Ok(response)) => {
                debug!(status = response.status, path = %config.path, "received response");
                parse_response(config.format, response)
            }
            Some(Err(TransportError::Connection(message))) => {
                Err(ClassifiedError::connection(message).into())
            }
            Some(Err(other)) => Err(ApiError::Transport(other)),
        };

        if let Some((key, registration)) = registration {
            self.cancellations.release(key, registration.id);
        }
        outcome
    }

    /// Execute and deserialize the body into `T`.
    pub async fn execute_as<T: DeserializeOwned>(
        &self,
        config: RequestConfig,
    ) -> Result<Option<T>, ApiError> {
        self.execute(config)
            .await?
            .map(ResponseData::deserialize)
            .transpose()
    }

    async fn security_params(&self) -> Option<RequestParams> {
        let worker = self.security_worker.as_ref()?;
        let data = self.security_data.read().await.clone();
        worker.params(data).await
    }

    /// Assemble the outbound request from a call and its merged options.
    pub fn build_request(
        &self,
        config: &RequestConfig,
        params: &RequestParams,
    ) -> Result<HttpRequest, ApiError> {
        let query_string = match &config.query {
            None => String::new(),
            Some(Value::Object(query)) => to_query_string(query),
            Some(other) => {
                return Err(ApiError::InvalidQuery(format!(
                    "expected an object, got {}",
                    json_kind(other)
                )))
            }
        };
        let base_url = params.base_url.as_deref().unwrap_or(&self.base_url);
        let url = format!("{base_url}{}{query_string}", config.path);

        let body = match &config.body {
            Some(payload) => format_body(config.content_type.unwrap_or_default(), payload.clone())?,
            None => Body::Empty,
        };

        let mut headers: Vec<(String, String)> = params
            .headers
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        if let Some(kind) = config.content_type.filter(|kind| *kind != ContentType::FormData) {
            headers.retain(|(name, _)| !name.eq_ignore_ascii_case("content-type"));
            headers.push(("Content-Type".to_string(), kind.mime().to_string()));
        }

        Ok(HttpRequest {
            method: config.method,
            url,
            headers,
            body,
            credentials: params.credentials,
            redirect: params.redirect.unwrap_or_default(),
            referrer_policy: params.referrer_policy.clone(),
        })
    }
}

/// Turn a response into data, or a `ClassifiedError` when it failed or
/// could not be parsed.
pub fn parse_response(
    format: Option<ResponseFormat>,
    response: HttpResponse,
) -> Result<Option<ResponseData>, ApiError> {
    let parsed = match format {
        Some(format) if response.status != 204 => match parse_body(format, &response.body) {
            Ok(data) => Some(data),
            Err(reason) => {
                warn!(status = response.status, %reason, "could not parse response body");
                return Err(ClassifiedError::unparseable(response.status).into());
            }
        },
        _ => None,
    };

    if !response.ok() {
        let body = parsed.as_ref().and_then(ResponseData::as_json);
        return Err(ClassifiedError::from_response(response.status, body).into());
    }
    Ok(parsed)
}

fn parse_body(format: ResponseFormat, body: &Bytes) -> Result<ResponseData, String> {
    match format {
        ResponseFormat::Json => serde_json::from_slice(body)
            .map(ResponseData::Json)
            .map_err(|e| e.to_string()),
        ResponseFormat::Text => String::from_utf8(body.to_vec())
            .map(ResponseData::Text)
            .map_err(|e| e.to_string()),
        ResponseFormat::Bytes => Ok(ResponseData::Bytes(body.clone())),
    }
}

impl<S> fmt::Debug for ApiClient<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("base_params", &self.base_params)
            .field("security_worker", &self.security_worker.is_some())
            .field("cancellations", &self.cancellations.len())
            .finish_non_exhaustive()
    }
}
