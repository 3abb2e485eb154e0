//! HTTP fetch utilities for the Petal image loader.
//!
//! Provides a blocking HTTP client wrapper that carries per-request method,
//! headers, and body, plus a parser for `data:` URLs.
//!
//! TODO: Implement proper Fetch Standard (<https://fetch.spec.whatwg.org/>)
use base64::Engine;
use percent_encoding::percent_decode_str;
use std::time::Duration;
use thiserror::Error;

/// User-Agent header sent with all requests unless overridden.
///
/// Mimics a common desktop browser to avoid basic bot detection.
pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Default request timeout.
pub const TIMEOUT: Duration = Duration::from_secs(30);

/// Failure to obtain the bytes behind a URI.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The HTTP client could not be constructed.
    #[error("failed to create HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    /// The request method is not a valid HTTP token.
    #[error("invalid HTTP method '{0}'")]
    InvalidMethod(String),
    /// The request could not be sent or the body could not be read.
    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),
    /// The server answered with a non-success status.
    #[error("HTTP error: {0}")]
    Status(reqwest::StatusCode),
    /// A `data:` URL was malformed.
    #[error("invalid data URL: {0}")]
    DataUrl(String),
    /// A local file could not be read.
    #[error("failed to read '{path}': {source}")]
    File {
        /// The path that was read.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// A single HTTP request.
#[derive(Debug, Clone, Copy)]
pub struct HttpRequest<'a> {
    /// Absolute `http:` or `https:` URL.
    pub url: &'a str,
    /// HTTP method; `GET` when `None`.
    pub method: Option<&'a str>,
    /// Extra request headers, sent in order.
    pub headers: &'a [(String, String)],
    /// Request body.
    pub body: Option<&'a str>,
}

impl<'a> HttpRequest<'a> {
    /// A plain `GET` of `url`.
    #[must_use]
    pub const fn get(url: &'a str) -> Self {
        Self {
            url,
            method: None,
            headers: &[],
            body: None,
        }
    }
}

/// Blocking HTTP client. Cheap to clone; clones share a connection pool.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::blocking::Client,
}

impl Fetcher {
    /// Build a client with the given timeout and user agent.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Client`] if the TLS backend cannot be initialized.
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self { client })
    }

    /// Send `request` and return the response body.
    ///
    /// # Errors
    ///
    /// Returns an error if the method is invalid, the request fails, the
    /// response has a non-success status, or the body cannot be read.
    pub fn fetch_bytes(&self, request: &HttpRequest<'_>) -> Result<Vec<u8>, FetchError> {
        let method = match request.method {
            Some(name) => reqwest::Method::from_bytes(name.to_ascii_uppercase().as_bytes())
                .map_err(|_| FetchError::InvalidMethod(name.to_string()))?,
            None => reqwest::Method::GET,
        };

        let mut builder = self.client.request(method, request.url);
        for (name, value) in request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body.to_string());
        }

        let response = builder.send().map_err(FetchError::Request)?;
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status()));
        }

        response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(FetchError::Request)
    }
}

/// A parsed `data:` URL.
///
/// [RFC 2397 § 2](https://www.rfc-editor.org/rfc/rfc2397#section-2)
/// "dataurl := "data:" [ mediatype ] [ ";base64" ] "," data"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataUrl<'a> {
    metadata: &'a str,
    base64: bool,
    payload: &'a str,
}

impl<'a> DataUrl<'a> {
    /// Split `url` into metadata and payload.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::DataUrl`] if `url` is not a `data:` URL or has
    /// no `,` separating metadata from payload.
    pub fn parse(url: &'a str) -> Result<Self, FetchError> {
        let rest = url
            .get(..5)
            .filter(|scheme| scheme.eq_ignore_ascii_case("data:"))
            .map(|_| &url[5..])
            .ok_or_else(|| FetchError::DataUrl("missing 'data:' scheme".to_string()))?;

        let (metadata, payload) = rest
            .split_once(',')
            .ok_or_else(|| FetchError::DataUrl("missing comma".to_string()))?;

        let (metadata, base64) = metadata
            .strip_suffix(";base64")
            .map_or((metadata, false), |m| (m, true));

        Ok(Self {
            metadata,
            base64,
            payload,
        })
    }

    /// The media type without parameters, lowercased.
    ///
    /// "If <mediatype> is omitted, it defaults to text/plain"
    #[must_use]
    pub fn media_type(&self) -> String {
        let essence = self.metadata.split(';').next().unwrap_or("").trim();
        if essence.is_empty() {
            "text/plain".to_string()
        } else {
            essence.to_ascii_lowercase()
        }
    }

    /// Whether the payload is base64-encoded.
    #[must_use]
    pub const fn is_base64(&self) -> bool {
        self.base64
    }

    /// Decode the payload into raw bytes.
    ///
    /// Base64 payloads are decoded as such; everything else is percent-decoded.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::DataUrl`] if base64 decoding fails.
    pub fn decode(&self) -> Result<Vec<u8>, FetchError> {
        if self.base64 {
            base64::engine::general_purpose::STANDARD
                .decode(self.payload.trim())
                .map_err(|e| FetchError::DataUrl(format!("base64 decode error: {e}")))
        } else {
            Ok(percent_decode_str(self.payload).collect())
        }
    }
}
