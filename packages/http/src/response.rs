use std::any::Any;
use std::borrow::Cow;
use std::collections::BTreeMap;

use bytes::Bytes;
use http::HeaderMap;
use serde::Deserialize;

use crate::error::{Error, TransportError};

/// A response as handed back by a [`Transport`](crate::Transport).
pub enum TransportResponse {
    /// Fully buffered response.
    Http(http::Response<Bytes>),
    /// Response from the blocking reqwest client; its body is read on conversion.
    Blocking(reqwest::blocking::Response),
    /// Anything else. Only `http::Response<Vec<u8>>` and `http::Response<String>`
    /// are understood.
    Other(Box<dyn Any + Send>),
}

impl std::fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportResponse::Http(response) => {
                f.debug_tuple("Http").field(&response.status()).finish()
            }
            TransportResponse::Blocking(response) => {
                f.debug_tuple("Blocking").field(&response.status()).finish()
            }
            TransportResponse::Other(_) => f.write_str("Other(..)"),
        }
    }
}

impl From<http::Response<Bytes>> for TransportResponse {
    fn from(response: http::Response<Bytes>) -> Self {
        TransportResponse::Http(response)
    }
}

impl From<reqwest::blocking::Response> for TransportResponse {
    fn from(response: reqwest::blocking::Response) -> Self {
        TransportResponse::Blocking(response)
    }
}

/// Normalized HTTP response.
///
/// Status, headers and the whole body are captured once; the value is
/// immutable afterwards. Header names are lowercase and every value of a
/// repeated header is kept in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: u16,
    headers: BTreeMap<String, Vec<String>>,
    body: Bytes,
}

impl Response {
    pub fn new(
        status: u16,
        headers: BTreeMap<String, Vec<String>>,
        body: impl Into<Bytes>,
    ) -> Self {
        let headers = headers
            .into_iter()
            .map(|(name, values)| (name.to_ascii_lowercase(), values))
            .collect();
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// A response with no headers, handy for fallback producers.
    pub fn with_status(status: u16, body: impl Into<Bytes>) -> Self {
        Self::new(status, BTreeMap::new(), body)
    }

    /// Normalize a transport response, reading its body eagerly.
    pub fn create_from_response(response: TransportResponse) -> Result<Self, Error> {
        match response {
            TransportResponse::Http(response) => Ok(Self::from_http(response)),
            TransportResponse::Blocking(response) => {
                let status = response.status().as_u16();
                let headers = collect_headers(response.headers());
                let body = response.bytes().map_err(|e| TransportError::Body {
                    message: e.to_string(),
                })?;
                Ok(Self {
                    status,
                    headers,
                    body,
                })
            }
            TransportResponse::Other(value) => {
                let value = match value.downcast::<http::Response<Vec<u8>>>() {
                    Ok(response) => return Ok(Self::from_http((*response).map(Bytes::from))),
                    Err(value) => value,
                };
                match value.downcast::<http::Response<String>>() {
                    Ok(response) => Ok(Self::from_http((*response).map(Bytes::from))),
                    Err(_) => Err(Error::UndefinedResponse),
                }
            }
        }
    }

    fn from_http(response: http::Response<Bytes>) -> Self {
        let (parts, body) = response.into_parts();
        Self {
            status: parts.status.as_u16(),
            headers: collect_headers(&parts.headers),
            body,
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &BTreeMap<String, Vec<String>> {
        &self.headers
    }

    /// First value of a header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Check if the response status indicates success (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Check if the response status indicates a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    /// Check if the response status indicates a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }

    /// Try to deserialize the body into a specific type
    pub fn json<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

fn collect_headers(headers: &HeaderMap) -> BTreeMap<String, Vec<String>> {
    let mut collected: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in headers {
        collected
            .entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    collected
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> http::Response<Bytes> {
        http::Response::builder()
            .status(201)
            .header("Content-Type", "application/json")
            .header("Set-Cookie", "a=1")
            .header("Set-Cookie", "b=2")
            .body(Bytes::from_static(br#"{"id":7}"#))
            .unwrap()
    }

    #[test]
    fn captures_status_headers_and_body() {
        let response = Response::create_from_response(sample().into()).unwrap();

        assert_eq!(response.status(), 201);
        assert_eq!(response.header("content-type"), Some("application/json"));
        assert_eq!(response.header("CONTENT-TYPE"), Some("application/json"));
        assert_eq!(
            response.headers()["set-cookie"],
            vec!["a=1".to_string(), "b=2".to_string()]
        );
        assert_eq!(response.text(), r#"{"id":7}"#);
        assert!(response.is_success());
    }

    #[test]
    fn normalizing_twice_gives_identical_values() {
        let first = Response::create_from_response(sample().into()).unwrap();
        let second = Response::create_from_response(sample().into()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn understands_other_http_body_shapes() {
        let vec_body = http::Response::builder()
            .status(404)
            .body(b"missing".to_vec())
            .unwrap();
        let response =
            Response::create_from_response(TransportResponse::Other(Box::new(vec_body))).unwrap();
        assert_eq!(response.status(), 404);
        assert!(response.is_client_error());
        assert_eq!(&response.body()[..], b"missing");

        let string_body = http::Response::builder()
            .status(503)
            .body("down".to_string())
            .unwrap();
        let response =
            Response::create_from_response(TransportResponse::Other(Box::new(string_body)))
                .unwrap();
        assert!(response.is_server_error());
        assert_eq!(response.text(), "down");
    }

    #[test]
    fn unknown_shape_is_undefined_response() {
        let result = Response::create_from_response(TransportResponse::Other(Box::new(42u8)));
        assert!(matches!(result, Err(Error::UndefinedResponse)));
    }

    #[test]
    fn json_body_deserializes() {
        #[derive(Deserialize, Debug, PartialEq)]
        struct Created {
            id: u64,
        }

        let response = Response::create_from_response(sample().into()).unwrap();
        assert_eq!(response.json::<Created>().unwrap(), Created { id: 7 });
    }

    #[test]
    fn constructor_lowercases_header_names() {
        let mut headers = BTreeMap::new();
        headers.insert("X-Source".to_string(), vec!["cache".to_string()]);
        let response = Response::new(200, headers, "cached");
        assert_eq!(response.header("x-source"), Some("cache"));
        assert!(response.headers().contains_key("x-source"));
    }

    #[test]
    fn with_status_has_empty_headers() {
        let response = Response::with_status(200, "");
        assert!(response.headers().is_empty());
        assert!(response.body().is_empty());
    }
}
