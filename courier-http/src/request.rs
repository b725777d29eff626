//! Per-call request configuration.

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::Serialize;
use std::time::Duration;

use crate::{HttpClientError, Result};

/// Whether credentials may be attached to a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Credentials {
    /// Attach the bearer token from the client's token provider.
    #[default]
    Include,
    /// Never attach the bearer token.
    Omit,
}

/// Request body.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// Raw bytes, sent as-is.
    Bytes(Bytes),
    /// Text, usually a serialized JSON document.
    Text(String),
    /// Form fields, sent `application/x-www-form-urlencoded`.
    Form(Vec<(String, String)>),
}

impl Body {
    /// Encode the body into the bytes put on the wire.
    pub fn encode(&self) -> Result<Bytes> {
        match self {
            Self::Bytes(bytes) => Ok(bytes.clone()),
            Self::Text(text) => Ok(Bytes::from(text.clone())),
            Self::Form(fields) => serde_urlencoded::to_string(fields)
                .map(Bytes::from)
                .map_err(|e| HttpClientError::InvalidRequest(format!("form encoding: {e}"))),
        }
    }
}

/// Configuration for a single call.
///
/// Request interceptors receive the current value and return the one the
/// next interceptor (and finally the transport) sees.
#[derive(Debug, Clone, Default)]
pub struct RequestConfig {
    /// HTTP method. Defaults to `GET`.
    pub method: Method,
    /// Absolute URL, or a path joined onto the client's base URL.
    pub url: String,
    /// Caller headers. These win over the client defaults.
    pub headers: HeaderMap,
    /// Query parameters appended to the URL.
    pub query: Vec<(String, String)>,
    /// Request body.
    pub body: Option<Body>,
    /// Whether the bearer token may be attached.
    pub credentials: Credentials,
    /// Per-request timeout, overriding the client timeout.
    pub timeout: Option<Duration>,
}

impl RequestConfig {
    /// Create an empty `GET` configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the HTTP method.
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Set the URL.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Set a header, replacing any previous value of the same name.
    ///
    /// Invalid names or values are ignored.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::try_from(name.as_ref()),
            HeaderValue::try_from(value.as_ref()),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Add multiple headers to the request.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Get a header value as a string.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Add a query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Add multiple query parameters.
    pub fn queries<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in params {
            self.query.push((k.into(), v.into()));
        }
        self
    }

    /// Set the body, or clear it with `None`.
    pub fn body(mut self, body: Option<Body>) -> Self {
        self.body = body;
        self
    }

    /// Set the request body as raw bytes.
    pub fn bytes(self, bytes: impl Into<Bytes>) -> Self {
        self.body(Some(Body::Bytes(bytes.into())))
    }

    /// Set the request body as text.
    pub fn text(self, text: impl Into<String>) -> Self {
        self.body(Some(Body::Text(text.into())))
    }

    /// Set the request body to the JSON serialization of `value`.
    pub fn json<T: Serialize + ?Sized>(self, value: &T) -> Result<Self> {
        let text = serde_json::to_string(value)
            .map_err(|e| HttpClientError::InvalidRequest(format!("JSON body: {e}")))?;
        Ok(self.text(text))
    }

    /// Set the request body as form fields.
    pub fn form<I, K, V>(self, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let fields = fields
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.body(Some(Body::Form(fields)))
    }

    /// Set the credentials mode.
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Set a custom timeout for this request.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RequestConfig::new();
        assert_eq!(config.method, Method::GET);
        assert!(config.headers.is_empty());
        assert!(config.body.is_none());
        assert_eq!(config.credentials, Credentials::Include);
    }

    #[test]
    fn test_header_last_write_wins_case_insensitive() {
        let config = RequestConfig::new()
            .header("X-Trace", "one")
            .header("x-trace", "two");
        assert_eq!(config.header_value("X-TRACE"), Some("two"));
        assert_eq!(config.headers.len(), 1);
    }

    #[test]
    fn test_invalid_header_is_ignored() {
        let config = RequestConfig::new().header("bad header", "value");
        assert!(config.headers.is_empty());
    }

    #[test]
    fn test_json_body() {
        let config = RequestConfig::new()
            .json(&serde_json::json!({"username": "ada"}))
            .unwrap();
        assert_eq!(
            config.body,
            Some(Body::Text(r#"{"username":"ada"}"#.to_string()))
        );
    }

    #[test]
    fn test_form_encoding() {
        let body = Body::Form(vec![
            ("user".to_string(), "ada lovelace".to_string()),
            ("remember".to_string(), "1".to_string()),
        ]);
        assert_eq!(
            body.encode().unwrap(),
            Bytes::from_static(b"user=ada+lovelace&remember=1")
        );
    }
}
