/// Failures reported by a [`Transport`](crate::Transport).
///
/// Non-2xx statuses only show up here when the request was sent with
/// `http_errors` enabled; otherwise they come back as ordinary responses.
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("request timed out: {message}")]
    Timeout { message: String },

    #[error("connection failed: {message}")]
    Connect { message: String },

    #[error("HTTP status {status}")]
    Status { status: u16 },

    #[error("request failed: {message}")]
    Request { message: String },

    #[error("failed to read response body: {message}")]
    Body { message: String },
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        let message = error.to_string();
        if error.is_timeout() {
            TransportError::Timeout { message }
        } else if error.is_connect() {
            TransportError::Connect { message }
        } else if let Some(status) = error.status().filter(|_| error.is_status()) {
            TransportError::Status {
                status: status.as_u16(),
            }
        } else if error.is_body() || error.is_decode() {
            TransportError::Body { message }
        } else {
            TransportError::Request { message }
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("the option `atomic` is required for asynchronous requests")]
    MissingAtomic,

    #[error("undefined response")]
    UndefinedResponse,

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// An asynchronous request failed and no fallback was registered for it.
    #[error("request `{key}` failed without a fallback: {source}")]
    Client {
        key: String,
        #[source]
        source: Box<Error>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid HTTP method: {method}")]
    InvalidMethod { method: String },

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Invalid client configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl Error {
    /// Wrap a per-key failure for the drain caller.
    pub(crate) fn client(key: impl Into<String>, source: Error) -> Self {
        Error::Client {
            key: key.into(),
            source: Box::new(source),
        }
    }

    /// The atomic key of a wrapped client error.
    pub fn key(&self) -> Option<&str> {
        match self {
            Error::Client { key, .. } => Some(key),
            _ => None,
        }
    }
}
