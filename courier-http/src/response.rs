//! HTTP response types.
//!
//! [`Response`] is the raw, fully buffered transport response that response
//! interceptors see. [`NormalizedResponse`] is what callers get back once the
//! body has been decoded and any backend envelope unwrapped, and
//! [`BlobResponse`] is the binary counterpart used by
//! [`HttpClient::request_blob`](crate::HttpClient::request_blob).

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{HttpClientError, Result};

/// Raw HTTP response with a buffered body.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    url: url::Url,
}

impl Response {
    /// Create a response from its parts.
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>, url: url::Url) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
            url,
        }
    }

    /// Create a response from a reqwest response, buffering the body.
    pub(crate) async fn from_reqwest(response: reqwest::Response) -> Result<Self> {
        let status = response.status();
        let headers = response.headers().clone();
        let url = response.url().clone();
        let body = response.bytes().await?;

        Ok(Self {
            status,
            headers,
            body,
            url,
        })
    }

    /// Get the status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Canonical reason phrase for the status code.
    ///
    /// This is the standard phrase for the code (`"Not Found"` for 404), not
    /// the phrase the server sent on the status line.
    pub fn status_text(&self) -> &'static str {
        self.status.canonical_reason().unwrap_or("")
    }

    /// Check if the response was successful (2xx).
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Get the response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get the response headers mutably.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Get a specific header value.
    pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
        self.headers
            .get(name.as_ref())
            .and_then(|v| v.to_str().ok())
    }

    /// Get the response URL.
    pub fn url(&self) -> &url::Url {
        &self.url
    }

    /// Get the response body as bytes.
    pub fn bytes(&self) -> &Bytes {
        &self.body
    }

    /// Replace the body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Get the response body as text.
    ///
    /// Invalid UTF-8 sequences are replaced with U+FFFD.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Parse the response body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| HttpClientError::parse(self.status.as_u16(), e))
    }

    /// Get the content type if available.
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Whether the declared content type is JSON.
    pub fn is_json(&self) -> bool {
        self.content_type()
            .is_some_and(|ct| ct.contains("application/json"))
    }
}

/// Decoded response handed back to callers.
#[derive(Debug, Clone)]
pub struct NormalizedResponse<T = Value> {
    /// Payload, unwrapped from the backend envelope when there was one.
    pub data: T,
    /// HTTP status code.
    pub status: u16,
    /// Canonical reason phrase for the status, not the server's own phrase.
    pub status_text: String,
    /// Response headers.
    pub headers: HeaderMap,
}

impl<T> NormalizedResponse<T> {
    /// Build a normalized response for `data` using the transport metadata of `response`.
    pub fn from_parts(data: T, response: &Response) -> Self {
        Self {
            data,
            status: response.status().as_u16(),
            status_text: response.status_text().to_string(),
            headers: response.headers().clone(),
        }
    }

    /// Transform the payload.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> NormalizedResponse<U> {
        NormalizedResponse {
            data: f(self.data),
            status: self.status,
            status_text: self.status_text,
            headers: self.headers,
        }
    }
}

impl NormalizedResponse<Value> {
    /// Response produced when an error interceptor recovers a failed call.
    pub fn recovered(data: Value, status: u16) -> Self {
        Self {
            data,
            status,
            status_text: status_text_for(status).to_string(),
            headers: HeaderMap::new(),
        }
    }

    /// Deserialize the payload into a concrete type.
    pub fn into_typed<T: DeserializeOwned>(self) -> Result<NormalizedResponse<T>> {
        let status = self.status;
        let data = serde_json::from_value(self.data)
            .map_err(|e| HttpClientError::parse(status, e))?;
        Ok(NormalizedResponse {
            data,
            status,
            status_text: self.status_text,
            headers: self.headers,
        })
    }
}

/// Binary response returned by `request_blob`.
#[derive(Debug, Clone)]
pub struct BlobResponse {
    /// Raw body.
    pub body: Bytes,
    /// HTTP status code.
    pub status: u16,
    /// Canonical reason phrase for the status, not the server's own phrase.
    pub status_text: String,
    /// Response headers.
    pub headers: HeaderMap,
}

impl BlobResponse {
    /// Blob produced when an error interceptor recovers a failed call.
    ///
    /// String values become their UTF-8 bytes; anything else is serialized as JSON.
    pub fn recovered(data: Value, status: u16) -> Self {
        let body = match data {
            Value::String(text) => Bytes::from(text),
            other => Bytes::from(other.to_string()),
        };
        Self {
            body,
            status,
            status_text: status_text_for(status).to_string(),
            headers: HeaderMap::new(),
        }
    }
}

impl From<Response> for BlobResponse {
    fn from(response: Response) -> Self {
        Self {
            status: response.status.as_u16(),
            status_text: response.status_text().to_string(),
            headers: response.headers,
            body: response.body,
        }
    }
}

fn status_text_for(status: u16) -> &'static str {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;
    use serde_json::json;

    fn response(status: u16, content_type: &str, body: &'static str) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_str(content_type).unwrap(),
        );
        Response::new(
            StatusCode::from_u16(status).unwrap(),
            headers,
            body,
            url::Url::parse("http://localhost/test").unwrap(),
        )
    }

    #[test]
    fn test_json_detection() {
        assert!(response(200, "application/json; charset=utf-8", "{}").is_json());
        assert!(!response(200, "text/plain", "hi").is_json());
    }

    #[test]
    fn test_text_is_lossy() {
        let response = Response::new(
            StatusCode::NOT_FOUND,
            HeaderMap::new(),
            vec![0xff, 0xfe, b'x'],
            url::Url::parse("http://localhost/test").unwrap(),
        );
        assert_eq!(response.text(), "\u{fffd}\u{fffd}x");
    }

    #[test]
    fn test_status_text() {
        assert_eq!(response(404, "text/plain", "").status_text(), "Not Found");
    }

    #[test]
    fn test_into_typed_failure_is_parse_error() {
        let normalized = NormalizedResponse::recovered(json!("not a number"), 200);
        let result = normalized.into_typed::<u32>();
        assert!(matches!(result, Err(HttpClientError::Parse { status: 200, .. })));
    }

    #[test]
    fn test_blob_from_response() {
        let blob = BlobResponse::from(response(200, "application/pdf", "%PDF"));
        assert_eq!(blob.body, Bytes::from_static(b"%PDF"));
        assert_eq!(blob.status, 200);
        assert_eq!(blob.status_text, "OK");
    }

    #[test]
    fn test_recovered_blob_body() {
        assert_eq!(
            BlobResponse::recovered(json!("fallback"), 500).body,
            Bytes::from_static(b"fallback")
        );
        assert_eq!(
            BlobResponse::recovered(json!({"a": 1}), 500).body,
            Bytes::from_static(br#"{"a":1}"#)
        );
    }
}
