use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::Error;
use crate::multipart::{self, Part};
use crate::params::Params;
use crate::types::{seconds, InvokeDefaults, Method, RequestOptions};

/// Transport-ready options for one request.
///
/// GET requests carry their parameters as `query`; every other method
/// carries them as `multipart`, which stays `None` when there is nothing to
/// send. The atomic key never appears here.
#[derive(Debug, Default)]
pub struct SendOptions {
    pub connect_timeout: Option<Duration>,
    pub timeout: Option<Duration>,
    pub http_errors: bool,
    pub headers: BTreeMap<String, String>,
    pub query: Option<Params>,
    pub multipart: Option<Vec<Part>>,
}

impl SendOptions {
    /// Query pairs flattened with bracket naming, empty when there is no query.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.query
            .as_ref()
            .map(multipart::flatten_query)
            .unwrap_or_default()
    }
}

/// Merge `options` over `defaults` and attach `params` the way `method` expects.
///
/// `default_headers` come from the client configuration; caller headers win.
pub fn build(
    method: Method,
    params: &Params,
    options: &RequestOptions,
    defaults: &InvokeDefaults,
    default_headers: &BTreeMap<String, String>,
) -> Result<SendOptions, Error> {
    let mut headers = default_headers.clone();
    headers.extend(options.headers.clone());

    let mut send = SendOptions {
        connect_timeout: seconds(options.connect_timeout.unwrap_or(defaults.connect_timeout)),
        timeout: seconds(options.timeout.unwrap_or(defaults.timeout)),
        http_errors: options.http_errors.unwrap_or(defaults.http_errors),
        headers,
        query: None,
        multipart: None,
    };

    if method == Method::GET {
        send.query = Some(params.clone());
    } else {
        let parts = multipart::encode(params, "")?;
        if !parts.is_empty() {
            send.multipart = Some(parts);
        }
    }

    Ok(send)
}
