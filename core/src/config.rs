//! Client-wide configuration.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::http::Transport;
use crate::params::RequestParams;

/// Environment variable read by [`ClientConfig::from_env`].
pub const BASE_URL_ENV: &str = "GITMONO_API_URL";

/// Derives extra request options (typically an auth header) from the
/// client's security data. Runs once per secure request.
#[async_trait]
pub trait SecurityWorker<S>: Send + Sync {
    async fn params(&self, data: Option<S>) -> Option<RequestParams>;
}

#[async_trait]
impl<S, F, Fut> SecurityWorker<S> for F
where
    S: Send + 'static,
    F: Fn(Option<S>) -> Fut + Send + Sync,
    Fut: Future<Output = Option<RequestParams>> + Send + 'static,
{
    async fn params(&self, data: Option<S>) -> Option<RequestParams> {
        (self)(data).await
    }
}

/// Settings an `ApiClient` is constructed from.
pub struct ClientConfig<S = ()> {
    /// Prefix for every request path, e.g. `https://api.example.com`.
    pub base_url: String,
    /// Lowest-precedence request options.
    pub base_params: RequestParams,
    pub security_data: Option<S>,
    pub security_worker: Option<Arc<dyn SecurityWorker<S>>>,
    /// Replaces the default reqwest transport when set.
    pub transport: Option<Arc<dyn Transport>>,
}

impl<S> Default for ClientConfig<S> {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            base_params: RequestParams::client_defaults(),
            security_data: None,
            security_worker: None,
            transport: None,
        }
    }
}

impl<S> ClientConfig<S> {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Base URL from `GITMONO_API_URL`, empty when unset.
    pub fn from_env() -> Self {
        Self::new(std::env::var(BASE_URL_ENV).unwrap_or_default())
    }

    pub fn with_base_params(mut self, params: RequestParams) -> Self {
        self.base_params = params;
        self
    }

    pub fn with_security_data(mut self, data: S) -> Self {
        self.security_data = Some(data);
        self
    }

    pub fn with_security_worker(mut self, worker: impl SecurityWorker<S> + 'static) -> Self {
        self.security_worker = Some(Arc::new(worker));
        self
    }

    pub fn with_transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }
}

impl<S: fmt::Debug> fmt::Debug for ClientConfig<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("base_params", &self.base_params)
            .field("security_data", &self.security_data)
            .field("security_worker", &self.security_worker.is_some())
            .field("transport", &self.transport.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Credentials;

    #[test]
    fn default_config_carries_client_defaults() {
        let config: ClientConfig = ClientConfig::new("http://localhost:3000");
        assert_eq!(config.base_url, "http://localhost:3000");
        assert_eq!(config.base_params.credentials, Some(Credentials::SameOrigin));
        assert!(config.security_worker.is_none());
        assert!(config.transport.is_none());
    }

    #[tokio::test]
    async fn closures_act_as_security_workers() {
        let worker = |token: Option<String>| async move {
            token.map(|t| RequestParams::new().header("Authorization", format!("Bearer {t}")))
        };
        let params = SecurityWorker::params(&worker, Some("abc".to_string()))
            .await
            .unwrap();
        assert_eq!(
            params.headers.get("Authorization").map(String::as_str),
            Some("Bearer abc")
        );
        assert!(SecurityWorker::params(&worker, None).await.is_none());
    }
}
