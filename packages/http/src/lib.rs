//! # atomic-http
//!
//! Request orchestration over a pluggable HTTP transport.
//!
//! ## Blocking calls
//!
//! ```ignore
//! use atomic_http::{HttpClient, Method, Params, RequestOptions};
//!
//! let client = HttpClient::new().with_base_uri("https://api.example.com/")?;
//! let response = client.invoke(
//!     Method::POST,
//!     "upload",
//!     Params::new().with("title", "report").with("file", "/tmp/report.pdf"),
//!     RequestOptions::new(),
//! )?;
//! ```
//!
//! ## Asynchronous batches
//!
//! Requests are registered under caller-chosen atomic keys, optionally given
//! a fallback, and drained together:
//!
//! ```ignore
//! use atomic_http::{HttpClient, Method, Params, RequestOptions, Response};
//!
//! let mut client = HttpClient::new();
//! client
//!     .invoke_async(Method::GET, "https://a.example/", Params::new(), RequestOptions::new().atomic("a"))?
//!     .fallback(|| Response::with_status(200, "cached"))
//!     .invoke_async(Method::GET, "https://b.example/", Params::new(), RequestOptions::new().atomic("b"))?;
//!
//! let results = client.send_invoke_async().await?;
//! assert!(results.contains_key("a"));
//! ```
//!
//! ## Parameters
//!
//! GET parameters become the query string. For other methods they are sent
//! as a multipart body with nested keys named `parent[child]`; strings naming
//! an existing file and [`FileRef`] values are streamed from disk.

pub mod client;
pub mod error;
pub mod multipart;
pub mod options;
pub mod params;
pub mod response;
pub mod settle;
pub mod transport;
pub mod types;

// Re-export main types
pub use client::{ClientConfig, HttpClient, Registration};
pub use error::{Error, TransportError};
pub use multipart::{Part, PartContents};
pub use options::SendOptions;
pub use params::{FileRef, ParamValue, Params, Scalar};
pub use response::{Response, TransportResponse};
pub use settle::{Settled, SettledState};
pub use transport::{ReqwestTransport, Transport};
pub use types::{InvokeDefaults, Method, RequestOptions};
