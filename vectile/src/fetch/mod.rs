//! Remote tile acquisition over HTTPS.
//!
//! The HTTP client sits behind the [`HttpClient`] trait so tests can
//! substitute mock transports; [`TileFetcher`] owns the URL template and
//! turns tile coordinates into GET requests.

mod fetcher;
mod http;

pub use fetcher::{substitute_url, TileFetcher};
pub use http::{FetchError, HttpClient, ReqwestClient};

pub(crate) use http::DEFAULT_HTTP_TIMEOUT;
