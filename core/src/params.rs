//! Per-request options and their layering.
//!
//! # Design
//! A `RequestParams` value is one configuration layer. Layers are merged
//! client defaults -> security worker -> per-call, later layers winning:
//! headers merge key by key, every other field is replaced only when the
//! later layer sets it. Header names compare case-insensitively, so a
//! later `Authorization` replaces an earlier `authorization`.

use indexmap::IndexMap;
use tokio_util::sync::CancellationToken;

use crate::cancel::CancelKey;

/// Cookie/credential policy forwarded to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credentials {
    Omit,
    SameOrigin,
    Include,
}

impl Credentials {
    pub fn as_str(self) -> &'static str {
        match self {
            Credentials::Omit => "omit",
            Credentials::SameOrigin => "same-origin",
            Credentials::Include => "include",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RedirectPolicy {
    #[default]
    Follow,
    /// Treat any redirect as a transport failure.
    Error,
    /// Hand the 3xx response back unfollowed.
    Manual,
}

/// How to parse a response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Json,
    Text,
    Bytes,
}

/// One layer of request options.
#[derive(Debug, Clone, Default)]
pub struct RequestParams {
    pub headers: IndexMap<String, String>,
    pub secure: Option<bool>,
    pub base_url: Option<String>,
    pub cancel_key: Option<CancelKey>,
    /// Signal used when no `cancel_key` is set.
    pub signal: Option<CancellationToken>,
    pub credentials: Option<Credentials>,
    pub redirect: Option<RedirectPolicy>,
    pub referrer_policy: Option<String>,
}

impl RequestParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults installed on every client unless overridden.
    pub fn client_defaults() -> Self {
        Self {
            credentials: Some(Credentials::SameOrigin),
            redirect: Some(RedirectPolicy::Follow),
            referrer_policy: Some("no-referrer".to_string()),
            ..Self::default()
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(name.into(), value.into());
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = Some(secure);
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn cancel_key(mut self, key: impl Into<CancelKey>) -> Self {
        self.cancel_key = Some(key.into());
        self
    }

    pub fn signal(mut self, signal: CancellationToken) -> Self {
        self.signal = Some(signal);
        self
    }

    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn redirect(mut self, redirect: RedirectPolicy) -> Self {
        self.redirect = Some(redirect);
        self
    }

    pub fn referrer_policy(mut self, policy: impl Into<String>) -> Self {
        self.referrer_policy = Some(policy.into());
        self
    }

    /// Layer `other` on top of `self`.
    pub fn merge(mut self, other: RequestParams) -> Self {
        for (name, value) in other.headers {
            self.set_header(name, value);
        }
        Self {
            headers: self.headers,
            secure: other.secure.or(self.secure),
            base_url: other.base_url.or(self.base_url),
            cancel_key: other.cancel_key.or(self.cancel_key),
            signal: other.signal.or(self.signal),
            credentials: other.credentials.or(self.credentials),
            redirect: other.redirect.or(self.redirect),
            referrer_policy: other.referrer_policy.or(self.referrer_policy),
        }
    }

    /// Replace any header with the same name, ignoring ASCII case.
    fn set_header(&mut self, name: String, value: String) {
        self.headers.retain(|existing, _| !existing.eq_ignore_ascii_case(&name));
        self.headers.insert(name, value);
    }
}
