//! HTTP transport abstraction.
//!
//! The client never talks to the network itself. It hands fully built
//! [`SendOptions`] to a [`Transport`], which can be mocked in tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::error::TransportError;
use crate::multipart::{Part, PartContents};
use crate::options::SendOptions;
use crate::response::TransportResponse;
use crate::types::Method;

/// Trait for sending HTTP requests, blocking or not.
///
/// Non-2xx statuses are returned as responses unless `options.http_errors`
/// is set, in which case they become [`TransportError::Status`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and block until the response head arrives.
    fn send(
        &self,
        method: Method,
        uri: &str,
        options: SendOptions,
    ) -> Result<TransportResponse, TransportError>;

    /// Send a request without blocking the calling thread.
    async fn send_async(
        &self,
        method: Method,
        uri: &str,
        options: SendOptions,
    ) -> Result<TransportResponse, TransportError>;
}

/// Production transport using reqwest.
///
/// reqwest only configures connect timeouts per client, so one client is
/// built lazily for every distinct connect timeout in use, rounded up to the
/// millisecond. Clients are kept for the life of the transport; callers are
/// expected to use a handful of timeout values, not one per request. The blocking
/// client is never built unless [`Transport::send`] is called, which keeps
/// this type safe to create and drop inside an async runtime that only uses
/// [`Transport::send_async`].
#[derive(Default)]
pub struct ReqwestTransport {
    clients: Mutex<HashMap<Option<Duration>, reqwest::Client>>,
    blocking_clients: Mutex<HashMap<Option<Duration>, reqwest::blocking::Client>>,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn client(&self, connect_timeout: Option<Duration>) -> Result<reqwest::Client, TransportError> {
        let connect_timeout = connect_timeout.map(whole_millis);
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(client) = clients.get(&connect_timeout) {
            return Ok(client.clone());
        }
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        let client = builder.build()?;
        clients.insert(connect_timeout, client.clone());
        Ok(client)
    }

    fn blocking_client(
        &self,
        connect_timeout: Option<Duration>,
    ) -> Result<reqwest::blocking::Client, TransportError> {
        let connect_timeout = connect_timeout.map(whole_millis);
        let mut clients = self
            .blocking_clients
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if let Some(client) = clients.get(&connect_timeout) {
            return Ok(client.clone());
        }
        // The blocking builder's default total timeout is 30s; ours is per request.
        let mut builder = reqwest::blocking::Client::builder().timeout(None::<Duration>);
        if let Some(timeout) = connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        let client = builder.build()?;
        clients.insert(connect_timeout, client.clone());
        Ok(client)
    }
}

/// Round up to whole milliseconds so near-identical timeouts share a client.
fn whole_millis(timeout: Duration) -> Duration {
    let millis = timeout.as_nanos().div_ceil(1_000_000);
    Duration::from_millis(u64::try_from(millis).unwrap_or(u64::MAX))
}

fn header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap, TransportError> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let header_name =
            HeaderName::try_from(name.as_str()).map_err(|e| TransportError::Request {
                message: format!("invalid header name `{}`: {}", name, e),
            })?;
        let header_value =
            HeaderValue::try_from(value.as_str()).map_err(|e| TransportError::Request {
                message: format!("invalid value for header `{}`: {}", name, e),
            })?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}

/// Filename for a file part: the explicit one, else the file's base name.
fn part_filename(part: &Part) -> Option<String> {
    part.filename.clone().or_else(|| match &part.contents {
        PartContents::File { path, .. } => path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned()),
        PartContents::Text(_) => None,
    })
}

fn async_form(parts: Vec<Part>) -> Result<reqwest::multipart::Form, TransportError> {
    let mut form = reqwest::multipart::Form::new();
    for part in parts {
        let filename = part_filename(&part);
        let mut body = match part.contents {
            PartContents::Text(text) => reqwest::multipart::Part::text(text),
            PartContents::File { file, .. } => reqwest::multipart::Part::stream(
                reqwest::Body::from(tokio::fs::File::from_std(file)),
            ),
        };
        if let Some(filename) = filename {
            body = body.file_name(filename);
        }
        if let Some(content_type) = &part.content_type {
            body = body.mime_str(content_type)?;
        }
        form = form.part(part.name, body);
    }
    Ok(form)
}

fn blocking_form(parts: Vec<Part>) -> Result<reqwest::blocking::multipart::Form, TransportError> {
    let mut form = reqwest::blocking::multipart::Form::new();
    for part in parts {
        let filename = part_filename(&part);
        let mut body = match part.contents {
            PartContents::Text(text) => reqwest::blocking::multipart::Part::text(text),
            PartContents::File { file, .. } => reqwest::blocking::multipart::Part::reader(file),
        };
        if let Some(filename) = filename {
            body = body.file_name(filename);
        }
        if let Some(content_type) = &part.content_type {
            body = body.mime_str(content_type)?;
        }
        form = form.part(part.name, body);
    }
    Ok(form)
}

fn check_status(status: reqwest::StatusCode, http_errors: bool) -> Result<(), TransportError> {
    if http_errors && (status.is_client_error() || status.is_server_error()) {
        return Err(TransportError::Status {
            status: status.as_u16(),
        });
    }
    Ok(())
}

#[async_trait]
impl Transport for ReqwestTransport {
    fn send(
        &self,
        method: Method,
        uri: &str,
        options: SendOptions,
    ) -> Result<TransportResponse, TransportError> {
        let client = self.blocking_client(options.connect_timeout)?;
        let query = options.query_pairs();

        let mut req_builder = client
            .request(method.into(), uri)
            .headers(header_map(&options.headers)?);

        if options.query.is_some() {
            req_builder = req_builder.query(&query);
        }

        if let Some(timeout) = options.timeout {
            req_builder = req_builder.timeout(timeout);
        }

        if let Some(parts) = options.multipart {
            req_builder = req_builder.multipart(blocking_form(parts)?);
        }

        let response = req_builder.send()?;
        check_status(response.status(), options.http_errors)?;

        Ok(TransportResponse::Blocking(response))
    }

    async fn send_async(
        &self,
        method: Method,
        uri: &str,
        options: SendOptions,
    ) -> Result<TransportResponse, TransportError> {
        let client = self.client(options.connect_timeout)?;
        let query = options.query_pairs();

        let mut req_builder = client
            .request(method.into(), uri)
            .headers(header_map(&options.headers)?);

        if options.query.is_some() {
            req_builder = req_builder.query(&query);
        }

        if let Some(timeout) = options.timeout {
            req_builder = req_builder.timeout(timeout);
        }

        if let Some(parts) = options.multipart {
            req_builder = req_builder.multipart(async_form(parts)?);
        }

        let response = req_builder.send().await?;
        check_status(response.status(), options.http_errors)?;

        let status = response.status();
        let headers = response.headers().clone();
        let body: Bytes = response.bytes().await?;

        let mut buffered = http::Response::new(body);
        *buffered.status_mut() = status;
        *buffered.headers_mut() = headers;

        Ok(TransportResponse::Http(buffered))
    }
}

/// Mock transport for testing.
///
/// Returns predefined responses or failures keyed by request URI.
#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Arc;

    /// What the mock saw for one request.
    #[derive(Debug, Clone, PartialEq)]
    pub struct RecordedRequest {
        pub method: Method,
        pub uri: String,
        pub query: Option<Vec<(String, String)>>,
        pub part_names: Vec<String>,
        pub timeout: Option<Duration>,
        pub connect_timeout: Option<Duration>,
        pub http_errors: bool,
        pub headers: BTreeMap<String, String>,
    }

    #[derive(Clone)]
    enum Outcome {
        Respond { status: u16, body: String },
        Fail(fn() -> TransportError),
        Unrecognized,
    }

    /// A mock transport that returns predefined results.
    #[derive(Clone, Default)]
    pub struct MockTransport {
        outcomes: Arc<Mutex<HashMap<String, Outcome>>>,
        delays: Arc<Mutex<HashMap<String, Duration>>>,
        recorded_requests: Arc<Mutex<Vec<RecordedRequest>>>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Respond to `uri` with the given status and body.
        pub fn with_response(self, uri: impl Into<String>, status: u16, body: &str) -> Self {
            self.outcomes.lock().unwrap().insert(
                uri.into(),
                Outcome::Respond {
                    status,
                    body: body.to_string(),
                },
            );
            self
        }

        /// Fail requests to `uri` with the error built by `error`.
        pub fn with_failure(self, uri: impl Into<String>, error: fn() -> TransportError) -> Self {
            self.outcomes
                .lock()
                .unwrap()
                .insert(uri.into(), Outcome::Fail(error));
            self
        }

        /// Answer `uri` with a response shape the client does not understand.
        pub fn with_unrecognized(self, uri: impl Into<String>) -> Self {
            self.outcomes
                .lock()
                .unwrap()
                .insert(uri.into(), Outcome::Unrecognized);
            self
        }

        /// Delay asynchronous responses for `uri`.
        pub fn with_delay(self, uri: impl Into<String>, delay: Duration) -> Self {
            self.delays.lock().unwrap().insert(uri.into(), delay);
            self
        }

        /// Get all recorded requests.
        pub fn recorded_requests(&self) -> Vec<RecordedRequest> {
            self.recorded_requests.lock().unwrap().clone()
        }

        pub fn timeout_error() -> TransportError {
            TransportError::Timeout {
                message: "operation timed out".to_string(),
            }
        }

        pub fn connect_error() -> TransportError {
            TransportError::Connect {
                message: "connection refused".to_string(),
            }
        }

        fn respond(
            &self,
            method: Method,
            uri: &str,
            options: SendOptions,
        ) -> Result<TransportResponse, TransportError> {
            self.recorded_requests.lock().unwrap().push(RecordedRequest {
                method,
                uri: uri.to_string(),
                query: options.query.as_ref().map(|_| options.query_pairs()),
                part_names: options
                    .multipart
                    .iter()
                    .flatten()
                    .map(|part| part.name.clone())
                    .collect(),
                timeout: options.timeout,
                connect_timeout: options.connect_timeout,
                http_errors: options.http_errors,
                headers: options.headers.clone(),
            });

            let outcome = self.outcomes.lock().unwrap().get(uri).cloned();
            match outcome {
                Some(Outcome::Respond { status, body }) => {
                    let mut response = http::Response::new(Bytes::from(body));
                    *response.status_mut() =
                        http::StatusCode::from_u16(status).expect("valid status in test");
                    check_status(response.status(), options.http_errors)?;
                    Ok(TransportResponse::Http(response))
                }
                Some(Outcome::Fail(error)) => Err(error()),
                Some(Outcome::Unrecognized) => Ok(TransportResponse::Other(Box::new(()))),
                None => {
                    let mut response = http::Response::new(Bytes::from_static(b"Not Found"));
                    *response.status_mut() = http::StatusCode::NOT_FOUND;
                    check_status(response.status(), options.http_errors)?;
                    Ok(TransportResponse::Http(response))
                }
            }
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        fn send(
            &self,
            method: Method,
            uri: &str,
            options: SendOptions,
        ) -> Result<TransportResponse, TransportError> {
            self.respond(method, uri, options)
        }

        async fn send_async(
            &self,
            method: Method,
            uri: &str,
            options: SendOptions,
        ) -> Result<TransportResponse, TransportError> {
            let delay = self.delays.lock().unwrap().get(uri).copied();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            self.respond(method, uri, options)
        }
    }
}
