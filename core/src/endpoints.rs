//! Typed endpoint surface.
//!
//! # Design
//! Endpoints are data: an `EndpointDescriptor` fixes the method, path
//! template, body encoding and response format, and one generic
//! `ApiClient::call_endpoint` executes any of them. `Endpoint<T>` tags a
//! descriptor with its response type so `ApiClient::call` can return `T`
//! and `request_key` can hand out cache keys carrying the same tag.

use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::body::{ContentType, Payload};
use crate::client::{ApiClient, RequestConfig, ResponseData};
use crate::error::ApiError;
use crate::http::HttpMethod;
use crate::params::{RequestParams, ResponseFormat};
use crate::types::{
    Attachment, CurrentUser, Favorite, Message, MessageThread, OrganizationMember, Page,
};

/// Static description of one API operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointDescriptor {
    /// Stable identifier, also the first element of every cache key.
    pub name: &'static str,
    pub method: HttpMethod,
    /// Path with `{placeholder}` segments, substituted in order.
    pub path: &'static str,
    pub content_type: Option<ContentType>,
    pub format: Option<ResponseFormat>,
    /// Whether calls run the security worker unless the caller says otherwise.
    pub secure: bool,
}

impl EndpointDescriptor {
    /// Placeholder names in declaration order.
    pub fn placeholders(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        let mut rest = self.path;
        while let Some((name, tail)) = next_placeholder(rest) {
            names.push(name.1);
            rest = tail;
        }
        names
    }

    /// Substitute `args` into the path template, positionally and verbatim.
    pub fn render_path(&self, args: &[&str]) -> Result<String, ApiError> {
        let expected = self.placeholders().len();
        if expected != args.len() {
            return Err(ApiError::PathArguments {
                endpoint: self.name,
                expected,
                actual: args.len(),
            });
        }
        let mut path = String::with_capacity(self.path.len());
        let mut rest = self.path;
        let mut args = args.iter();
        while let Some(((prefix, _), tail)) = next_placeholder(rest) {
            path.push_str(prefix);
            if let Some(arg) = args.next() {
                path.push_str(arg);
            }
            rest = tail;
        }
        path.push_str(rest);
        Ok(path)
    }

    /// Assemble the `RequestConfig` for one call.
    pub fn request_config(&self, path_args: &[&str], call: Call) -> Result<RequestConfig, ApiError> {
        let mut params = RequestParams::new();
        if self.secure {
            params.secure = Some(true);
        }
        Ok(RequestConfig {
            method: self.method,
            path: self.render_path(path_args)?,
            query: call.query,
            body: call.body,
            content_type: self.content_type,
            format: self.format,
            params: params.merge(call.params),
        })
    }
}

/// Split `path` at its first `{name}`: ((text before, name), text after).
fn next_placeholder(path: &str) -> Option<((&str, &str), &str)> {
    let start = path.find('{')?;
    let len = path[start..].find('}')?;
    let end = start + len;
    Some(((&path[..start], &path[start + 1..end]), &path[end + 1..]))
}

/// Per-call inputs for an endpoint.
#[derive(Debug, Clone, Default)]
pub struct Call {
    pub query: Option<Value>,
    pub body: Option<Payload>,
    pub params: RequestParams,
}

impl Call {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(mut self, query: Value) -> Self {
        self.query = Some(query);
        self
    }

    /// Serialize `query` into the call's query mapping.
    pub fn query_from<Q: Serialize>(self, query: &Q) -> Result<Self, ApiError> {
        let map = crate::query::to_query(query)?;
        Ok(self.query(Value::Object(map)))
    }

    pub fn body(mut self, body: impl Into<Payload>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serialize `body` as a JSON payload.
    pub fn json_body<B: Serialize>(self, body: &B) -> Result<Self, ApiError> {
        let value =
            serde_json::to_value(body).map_err(|e| ApiError::SerializationError(e.to_string()))?;
        Ok(self.body(value))
    }

    pub fn params(mut self, params: RequestParams) -> Self {
        self.params = params;
        self
    }
}

/// An endpoint whose successful responses deserialize into `T`.
pub struct Endpoint<T> {
    descriptor: &'static EndpointDescriptor,
    _response: PhantomData<fn() -> T>,
}

impl<T> Endpoint<T> {
    pub const fn new(descriptor: &'static EndpointDescriptor) -> Self {
        Self {
            descriptor,
            _response: PhantomData,
        }
    }

    pub const fn descriptor(&self) -> &'static EndpointDescriptor {
        self.descriptor
    }

    /// Cache key `[name, ...args]`. Arguments may be positional strings or
    /// named-argument objects.
    pub fn request_key<I, A>(&self, args: I) -> QueryKey<T>
    where
        I: IntoIterator<Item = A>,
        A: Into<Value>,
    {
        let mut parts = vec![Value::from(self.descriptor.name)];
        parts.extend(args.into_iter().map(Into::into));
        QueryKey::from_parts(parts)
    }

    /// Key with no arguments; a prefix of every key for this endpoint.
    pub fn root_key(&self) -> QueryKey<T> {
        QueryKey::from_parts(vec![Value::from(self.descriptor.name)])
    }
}

impl<T> Clone for Endpoint<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Endpoint<T> {}

impl<T> fmt::Debug for Endpoint<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Endpoint").field(&self.descriptor.name).finish()
    }
}

/// An ordered cache key, tagged with the data it identifies.
pub struct QueryKey<T> {
    parts: Vec<Value>,
    _data: PhantomData<fn() -> T>,
}

impl<T> QueryKey<T> {
    fn from_parts(parts: Vec<Value>) -> Self {
        Self {
            parts,
            _data: PhantomData,
        }
    }

    pub fn parts(&self) -> &[Value] {
        &self.parts
    }

    /// True when `prefix`'s parts are a leading run of this key's parts.
    pub fn starts_with<U>(&self, prefix: &QueryKey<U>) -> bool {
        self.parts.starts_with(&prefix.parts)
    }
}

impl<T> Clone for QueryKey<T> {
    fn clone(&self) -> Self {
        Self::from_parts(self.parts.clone())
    }
}

impl<T> PartialEq for QueryKey<T> {
    fn eq(&self, other: &Self) -> bool {
        self.parts == other.parts
    }
}

impl<T> Eq for QueryKey<T> {}

impl<T> fmt::Debug for QueryKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.parts).finish()
    }
}

impl<T> Serialize for QueryKey<T> {
    fn serialize<Z: Serializer>(&self, serializer: Z) -> Result<Z::Ok, Z::Error> {
        self.parts.serialize(serializer)
    }
}

impl<S> ApiClient<S>
where
    S: Clone + Send + Sync + 'static,
{
    /// Execute any endpoint by descriptor, returning the untyped body.
    pub async fn call_endpoint(
        &self,
        descriptor: &EndpointDescriptor,
        path_args: &[&str],
        call: Call,
    ) -> Result<Option<ResponseData>, ApiError> {
        let config = descriptor.request_config(path_args, call)?;
        self.execute(config).await
    }

    /// Execute a typed endpoint.
    pub async fn call<T: DeserializeOwned>(
        &self,
        endpoint: &Endpoint<T>,
        path_args: &[&str],
        call: Call,
    ) -> Result<Option<T>, ApiError> {
        self.call_endpoint(endpoint.descriptor(), path_args, call)
            .await?
            .map(ResponseData::deserialize)
            .transpose()
    }
}

pub mod users {
    use super::*;

    pub const GET_ME: Endpoint<CurrentUser> = Endpoint::new(&EndpointDescriptor {
        name: "users.getMe",
        method: HttpMethod::Get,
        path: "/v1/users/me",
        content_type: None,
        format: Some(ResponseFormat::Json),
        secure: true,
    });
}

pub mod organizations {
    use super::*;

    pub const GET_MEMBERS: Endpoint<Vec<OrganizationMember>> = Endpoint::new(&EndpointDescriptor {
        name: "organizations.getMembers",
        method: HttpMethod::Get,
        path: "/v1/organizations/{org_slug}/members",
        content_type: None,
        format: Some(ResponseFormat::Json),
        secure: true,
    });

    pub const GET_THREADS: Endpoint<Vec<MessageThread>> = Endpoint::new(&EndpointDescriptor {
        name: "organizations.getThreads",
        method: HttpMethod::Get,
        path: "/v1/organizations/{org_slug}/threads",
        content_type: None,
        format: Some(ResponseFormat::Json),
        secure: true,
    });

    pub const GET_THREADS_BY_ID: Endpoint<MessageThread> = Endpoint::new(&EndpointDescriptor {
        name: "organizations.getThreadsById",
        method: HttpMethod::Get,
        path: "/v1/organizations/{org_slug}/threads/{thread_id}",
        content_type: None,
        format: Some(ResponseFormat::Json),
        secure: true,
    });

    pub const GET_THREADS_MESSAGES: Endpoint<Page<Message>> = Endpoint::new(&EndpointDescriptor {
        name: "organizations.getThreadsMessages",
        method: HttpMethod::Get,
        path: "/v1/organizations/{org_slug}/threads/{thread_id}/messages",
        content_type: None,
        format: Some(ResponseFormat::Json),
        secure: true,
    });

    pub const POST_THREADS_MESSAGES: Endpoint<Message> = Endpoint::new(&EndpointDescriptor {
        name: "organizations.postThreadsMessages",
        method: HttpMethod::Post,
        path: "/v1/organizations/{org_slug}/threads/{thread_id}/messages",
        content_type: Some(ContentType::Json),
        format: Some(ResponseFormat::Json),
        secure: true,
    });

    pub const GET_FAVORITES: Endpoint<Vec<Favorite>> = Endpoint::new(&EndpointDescriptor {
        name: "organizations.getFavorites",
        method: HttpMethod::Get,
        path: "/v1/organizations/{org_slug}/favorites",
        content_type: None,
        format: Some(ResponseFormat::Json),
        secure: true,
    });

    pub const DELETE_FAVORITES_BY_ID: Endpoint<()> = Endpoint::new(&EndpointDescriptor {
        name: "organizations.deleteFavoritesById",
        method: HttpMethod::Delete,
        path: "/v1/organizations/{org_slug}/favorites/{favorite_id}",
        content_type: None,
        format: None,
        secure: true,
    });

    pub const POST_ATTACHMENTS: Endpoint<Attachment> = Endpoint::new(&EndpointDescriptor {
        name: "organizations.postAttachments",
        method: HttpMethod::Post,
        path: "/v1/organizations/{org_slug}/attachments",
        content_type: Some(ContentType::FormData),
        format: Some(ResponseFormat::Json),
        secure: true,
    });
}

/// Every endpoint this client knows.
pub static ENDPOINTS: &[&EndpointDescriptor] = &[
    users::GET_ME.descriptor(),
    organizations::GET_MEMBERS.descriptor(),
    organizations::GET_THREADS.descriptor(),
    organizations::GET_THREADS_BY_ID.descriptor(),
    organizations::GET_THREADS_MESSAGES.descriptor(),
    organizations::POST_THREADS_MESSAGES.descriptor(),
    organizations::GET_FAVORITES.descriptor(),
    organizations::DELETE_FAVORITES_BY_ID.descriptor(),
    organizations::POST_ATTACHMENTS.descriptor(),
];

/// Look up an endpoint descriptor by name.
pub fn find(name: &str) -> Option<&'static EndpointDescriptor> {
    ENDPOINTS.iter().copied().find(|descriptor| descriptor.name == name)
}
