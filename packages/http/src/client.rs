//! Synchronous requests and keyed asynchronous batches.
//!
//! # Batch model
//!
//! ```text
//! 1. Register requests, each under a caller-chosen atomic key:
//!    client.invoke_async(GET, "/a", params, options.atomic("a"))?
//!
//! 2. Optionally attach a fallback to that registration:
//!    .fallback(|| Response::with_status(200, "cached"))
//!
//! 3. Drain the batch, running every request concurrently:
//!    client.send_invoke_async().await -> {a: Response, ...}
//! ```
//!
//! A drain always leaves the client empty, whether or not any key failed.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use futures::future::{join_all, BoxFuture};
use serde::Deserialize;
use tracing::{debug, trace, warn};
use url::Url;

use crate::error::{Error, TransportError};
use crate::options;
use crate::params::Params;
use crate::response::{Response, TransportResponse};
use crate::settle::Settled;
use crate::transport::{ReqwestTransport, Transport};
use crate::types::{InvokeDefaults, Method, RequestOptions};

type Fallback = Box<dyn FnOnce() -> Response + Send>;

type PendingResponse = BoxFuture<'static, Result<TransportResponse, TransportError>>;

/// Client-wide configuration.
///
/// Every field may be omitted when deserializing. A present
/// `blocking`/`non_blocking` block must list all three of its fields.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Relative request URIs are joined onto this.
    pub base_uri: Option<String>,
    /// Sent with every request unless the caller sets the same header.
    pub headers: BTreeMap<String, String>,
    pub blocking: InvokeDefaults,
    pub non_blocking: InvokeDefaults,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_uri: None,
            headers: BTreeMap::new(),
            blocking: InvokeDefaults::blocking(),
            non_blocking: InvokeDefaults::non_blocking(),
        }
    }
}

impl ClientConfig {
    pub fn from_json(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }
}

/// HTTP client with a blocking path and a keyed asynchronous batch.
///
/// # Example
///
/// ```ignore
/// use atomic_http::{HttpClient, Method, Params, RequestOptions, Response};
///
/// let mut client = HttpClient::new().with_base_uri("https://api.example.com/")?;
///
/// // Blocking call
/// let health = client.invoke(Method::GET, "health", Params::new(), RequestOptions::new())?;
///
/// // Batch of concurrent calls
/// client
///     .invoke_async(Method::GET, "users/1", Params::new(), RequestOptions::new().atomic("user"))?
///     .fallback(|| Response::with_status(200, "{}"))
///     .invoke_async(Method::GET, "feed", Params::new(), RequestOptions::new().atomic("feed"))?;
///
/// let results = client.send_invoke_async().await?;
/// let user = &results["user"];
/// ```
pub struct HttpClient {
    transport: Arc<dyn Transport>,
    config: ClientConfig,
    base_url: Option<Url>,
    pending: HashMap<String, PendingResponse>,
    fallbacks: HashMap<String, Fallback>,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Create a client backed by reqwest.
    pub fn new() -> Self {
        Self::with_transport(ReqwestTransport::new())
    }

    /// Create a client with a custom transport
    pub fn with_transport(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Arc::new(transport),
            config: ClientConfig::default(),
            base_url: None,
            pending: HashMap::new(),
            fallbacks: HashMap::new(),
        }
    }

    /// Replace the configuration, validating its base URI.
    pub fn with_config(mut self, config: ClientConfig) -> Result<Self, Error> {
        self.base_url = config.base_uri.as_deref().map(Url::parse).transpose()?;
        self.config = config;
        Ok(self)
    }

    pub fn with_base_uri(mut self, base_uri: &str) -> Result<Self, Error> {
        self.base_url = Some(Url::parse(base_uri)?);
        self.config.base_uri = Some(base_uri.to_string());
        Ok(self)
    }

    /// Add a default header that will be sent with every request
    pub fn with_default_header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.config.headers.insert(name.into(), value.into());
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn resolve_uri(&self, uri: &str) -> Result<String, Error> {
        if uri.starts_with("http://") || uri.starts_with("https://") {
            return Ok(uri.to_string());
        }
        match &self.base_url {
            Some(base) => Ok(base.join(uri)?.to_string()),
            None => Ok(uri.to_string()),
        }
    }

    /// Send one request and wait for it.
    ///
    /// Non-2xx statuses come back as responses unless `http_errors` is
    /// enabled. With [`ReqwestTransport`] this must not be called from
    /// inside an async runtime.
    pub fn invoke(
        &self,
        method: Method,
        uri: &str,
        params: Params,
        options: RequestOptions,
    ) -> Result<Response, Error> {
        let uri = self.resolve_uri(uri)?;
        let send = options::build(
            method,
            &params,
            &options,
            &self.config.blocking,
            &self.config.headers,
        )?;

        trace!(%method, %uri, "sending request");
        let response = self.transport.send(method, &uri, send)?;
        Response::create_from_response(response)
    }

    /// Register an asynchronous request under `options.atomic`.
    ///
    /// Nothing is awaited here; the request runs when the batch is drained.
    /// Registering a key that is already pending replaces that request and
    /// drops its fallback.
    pub fn invoke_async(
        &mut self,
        method: Method,
        uri: &str,
        params: Params,
        options: RequestOptions,
    ) -> Result<Registration<'_>, Error> {
        let key = options
            .atomic_key()
            .ok_or(Error::MissingAtomic)?
            .to_string();

        let uri = self.resolve_uri(uri)?;
        let send = options::build(
            method,
            &params,
            &options,
            &self.config.non_blocking,
            &self.config.headers,
        )?;

        debug!(key = %key, %method, %uri, "registering asynchronous request");

        let transport = Arc::clone(&self.transport);
        let pending: PendingResponse =
            Box::pin(async move { transport.send_async(method, &uri, send).await });

        if self.pending.insert(key.clone(), pending).is_some() {
            warn!(key = %key, "atomic key reused, replacing the pending request");
        }
        self.fallbacks.remove(&key);

        Ok(Registration { client: self, key })
    }

    /// Number of requests waiting for the next drain.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// True when no request or fallback is waiting.
    pub fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.fallbacks.is_empty()
    }

    /// Drain the batch, returning every key's terminal state.
    ///
    /// All requests run concurrently. A transport failure is handed to the
    /// key's fallback when one is registered; a response that cannot be
    /// normalized fails the key regardless.
    pub async fn settle(&mut self) -> BTreeMap<String, Settled> {
        let pending = std::mem::take(&mut self.pending);
        let mut fallbacks = std::mem::take(&mut self.fallbacks);

        debug!(count = pending.len(), "draining asynchronous batch");

        let requests = pending.into_iter().map(|(key, request)| {
            let fallback = fallbacks.remove(&key);
            async move {
                let settled = match request.await {
                    Ok(response) => match Response::create_from_response(response) {
                        Ok(response) => Settled::Resolved(response),
                        Err(error) => Settled::Failed(error),
                    },
                    Err(error) => match fallback {
                        Some(producer) => {
                            warn!(key = %key, %error, "request failed, using fallback");
                            Settled::Recovered(producer())
                        }
                        None => Settled::Failed(error.into()),
                    },
                };
                (key, settled)
            }
        });

        let settled: BTreeMap<String, Settled> = join_all(requests).await.into_iter().collect();

        debug!(
            resolved = settled.values().filter(|s| s.is_resolved()).count(),
            recovered = settled.values().filter(|s| s.is_recovered()).count(),
            failed = settled.values().filter(|s| s.is_failed()).count(),
            "asynchronous batch drained"
        );

        settled
    }

    /// Drain the batch into a key to response map.
    ///
    /// Every request runs to completion first. If any key failed without a
    /// fallback, the drain returns [`Error::Client`] for the first such key
    /// in key order and the other results are discarded.
    pub async fn send_invoke_async(&mut self) -> Result<HashMap<String, Response>, Error> {
        let settled = self.settle().await;

        let mut results = HashMap::with_capacity(settled.len());
        let mut failure = None;
        for (key, outcome) in settled {
            match outcome.into_result() {
                Ok(response) => {
                    results.insert(key, response);
                }
                Err(error) if failure.is_none() => failure = Some(Error::client(key, error)),
                Err(_) => {}
            }
        }

        match failure {
            Some(error) => Err(error),
            None => Ok(results),
        }
    }
}

/// A request just registered with [`HttpClient::invoke_async`].
///
/// Attaching a fallback goes through this handle, so it always lands on the
/// request that produced it.
pub struct Registration<'a> {
    client: &'a mut HttpClient,
    key: String,
}

impl<'a> Registration<'a> {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Use `producer` as this request's result if the transport fails.
    pub fn fallback<F>(self, producer: F) -> &'a mut HttpClient
    where
        F: FnOnce() -> Response + Send + 'static,
    {
        self.client.fallbacks.insert(self.key, Box::new(producer));
        self.client
    }

    /// Continue without a fallback.
    pub fn done(self) -> &'a mut HttpClient {
        self.client
    }
}

impl std::ops::Deref for Registration<'_> {
    type Target = HttpClient;

    fn deref(&self) -> &Self::Target {
        &*self.client
    }
}

impl std::ops::DerefMut for Registration<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.client
    }
}
