use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// HTTP method for requests
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    GET,
    POST,
    PUT,
    PATCH,
    DELETE,
    HEAD,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::PATCH => "PATCH",
            Method::DELETE => "DELETE",
            Method::HEAD => "HEAD",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::GET),
            "POST" => Ok(Method::POST),
            "PUT" => Ok(Method::PUT),
            "PATCH" => Ok(Method::PATCH),
            "DELETE" => Ok(Method::DELETE),
            "HEAD" => Ok(Method::HEAD),
            _ => Err(Error::InvalidMethod {
                method: s.to_string(),
            }),
        }
    }
}

impl From<Method> for http::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::GET => http::Method::GET,
            Method::POST => http::Method::POST,
            Method::PUT => http::Method::PUT,
            Method::PATCH => http::Method::PATCH,
            Method::DELETE => http::Method::DELETE,
            Method::HEAD => http::Method::HEAD,
        }
    }
}

impl TryFrom<http::Method> for Method {
    type Error = Error;

    fn try_from(method: http::Method) -> Result<Self, Self::Error> {
        method.as_str().parse()
    }
}

/// Defaults merged under the caller's [`RequestOptions`].
///
/// Timeouts are in seconds. The blocking path waits longer than the
/// non-blocking one, whose requests are expected to fall back quickly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InvokeDefaults {
    pub connect_timeout: f64,
    pub timeout: f64,
    pub http_errors: bool,
}

impl InvokeDefaults {
    pub const fn blocking() -> Self {
        Self {
            connect_timeout: 5.0,
            timeout: 5.0,
            http_errors: false,
        }
    }

    pub const fn non_blocking() -> Self {
        Self {
            connect_timeout: 5.0,
            timeout: 2.0,
            http_errors: false,
        }
    }
}

/// Per-call options supplied by the caller.
///
/// Unset fields fall back to the [`InvokeDefaults`] of the path being used.
/// `atomic` only matters for asynchronous calls and is never forwarded to
/// the transport.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_timeout: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_errors: Option<bool>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub atomic: Option<String>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn atomic(mut self, key: impl Into<String>) -> Self {
        self.atomic = Some(key.into());
        self
    }

    pub fn with_timeout(mut self, seconds: f64) -> Self {
        self.timeout = Some(seconds);
        self
    }

    pub fn with_connect_timeout(mut self, seconds: f64) -> Self {
        self.connect_timeout = Some(seconds);
        self
    }

    pub fn with_http_errors(mut self, enabled: bool) -> Self {
        self.http_errors = Some(enabled);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// The atomic key, if present and non-empty.
    pub(crate) fn atomic_key(&self) -> Option<&str> {
        self.atomic.as_deref().filter(|key| !key.is_empty())
    }
}

/// Seconds to `Duration`. Zero, negatives and NaN mean "no limit"; overflow saturates.
pub(crate) fn seconds(value: f64) -> Option<Duration> {
    if value.is_nan() || value <= 0.0 {
        return None;
    }
    Some(Duration::try_from_secs_f64(value).unwrap_or(Duration::MAX))
}
