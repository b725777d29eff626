//! Backend envelope detection and response normalization.
//!
//! Backends answer either with a `{code, message, data}` envelope or with a
//! raw payload. [`classify`] is a pure function that tells the two apart so
//! the normalizer never inspects properties ad hoc.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{HttpClientError, NormalizedResponse, Response, Result};

/// Envelope code marking logical success.
pub const SUCCESS_CODE: i64 = 10000;

/// Well-known envelope codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    Success,
    Fail,
    ServerBusy,
    ApiUnimplemented,
    ContentTypeError,
    ParamsInvalid,
    ServerError,
    Forbidden,
    Unauthorized,
}

impl ResponseCode {
    /// Numeric value sent by the backend.
    pub fn code(self) -> i64 {
        match self {
            Self::Success => SUCCESS_CODE,
            Self::Fail => 9999,
            Self::ServerBusy => 9998,
            Self::ApiUnimplemented => 9997,
            Self::ContentTypeError => 9996,
            Self::ParamsInvalid => 9995,
            Self::ServerError => 9994,
            Self::Forbidden => 403,
            Self::Unauthorized => 401,
        }
    }

    /// Map a numeric code back to a known variant.
    pub fn from_code(code: i64) -> Option<Self> {
        [
            Self::Success,
            Self::Fail,
            Self::ServerBusy,
            Self::ApiUnimplemented,
            Self::ContentTypeError,
            Self::ParamsInvalid,
            Self::ServerError,
            Self::Forbidden,
            Self::Unauthorized,
        ]
        .into_iter()
        .find(|known| known.code() == code)
    }
}

/// Typed form of the backend envelope, for servers and fixtures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendEnvelope<T = Value> {
    pub code: i64,
    pub message: String,
    pub data: T,
}

impl<T> BackendEnvelope<T> {
    /// Successful envelope around `data`.
    pub fn success(data: T) -> Self {
        Self {
            code: SUCCESS_CODE,
            message: "success".to_string(),
            data,
        }
    }
}

/// Shape of a decoded response payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// A `{code, message, data}` envelope. `code` is `None` when it was not an integer.
    Enveloped {
        code: Option<i64>,
        message: String,
        data: Value,
    },
    /// Anything else, passed through verbatim.
    Raw(Value),
}

/// Classify a decoded payload.
///
/// An object carrying both a `code` and a `message` key is an envelope; a
/// missing `data` key unwraps to `null`.
pub fn classify(payload: Value) -> Payload {
    match payload {
        Value::Object(map) if is_envelope_map(&map) => {
            let code = map.get("code").and_then(Value::as_i64);
            let message = match map.get("message") {
                Some(Value::String(message)) => message.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            };
            let data = map.get("data").cloned().unwrap_or(Value::Null);
            Payload::Enveloped {
                code,
                message,
                data,
            }
        }
        other => Payload::Raw(other),
    }
}

/// Whether a payload has the envelope shape.
pub fn is_envelope(payload: &Value) -> bool {
    payload.as_object().is_some_and(is_envelope_map)
}

fn is_envelope_map(map: &serde_json::Map<String, Value>) -> bool {
    map.contains_key("code") && map.contains_key("message")
}

/// Decode a response body per its declared content type.
///
/// JSON content types are parsed as JSON; everything else becomes a string.
pub fn decode_body(response: &Response) -> Result<Value> {
    if response.is_json() {
        response.json()
    } else {
        Ok(Value::String(response.text()))
    }
}

/// Best-effort decode of an error body; undecodable bodies yield `None`.
pub fn decode_error_body(response: &Response) -> Option<Value> {
    decode_body(response).ok()
}

/// Turns raw responses into [`NormalizedResponse`]s.
#[derive(Debug, Clone, Copy)]
pub struct ResponseNormalizer {
    success_code: i64,
}

impl ResponseNormalizer {
    /// Create a normalizer that treats `success_code` as logical success.
    pub fn new(success_code: i64) -> Self {
        Self { success_code }
    }

    /// Decode, classify and unwrap a response.
    ///
    /// A failing envelope code is an error even when the transport status is 2xx.
    pub fn parse(&self, response: &Response) -> Result<NormalizedResponse> {
        let payload = decode_body(response)?;
        self.normalize(payload, response)
    }

    /// Classify an already decoded payload.
    pub fn normalize(&self, payload: Value, response: &Response) -> Result<NormalizedResponse> {
        let original = is_envelope(&payload).then(|| payload.clone());
        match classify(payload) {
            Payload::Enveloped {
                code: Some(code),
                data,
                ..
            } if code == self.success_code => Ok(NormalizedResponse::from_parts(data, response)),
            Payload::Enveloped { code, message, .. } => Err(HttpClientError::LogicalFailure {
                status: response.status().as_u16(),
                code,
                message,
                envelope: original.unwrap_or_default(),
            }),
            Payload::Raw(data) => Ok(NormalizedResponse::from_parts(data, response)),
        }
    }
}

impl Default for ResponseNormalizer {
    fn default() -> Self {
        Self::new(SUCCESS_CODE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderMap, HeaderValue, StatusCode};
    use serde_json::json;

    fn json_response(status: u16, body: Value) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        Response::new(
            StatusCode::from_u16(status).unwrap(),
            headers,
            body.to_string(),
            url::Url::parse("http://localhost/api").unwrap(),
        )
    }

    #[test]
    fn test_classify_envelope() {
        let payload = classify(json!({"code": 10000, "message": "ok", "data": {"id": 1}}));
        assert_eq!(
            payload,
            Payload::Enveloped {
                code: Some(10000),
                message: "ok".to_string(),
                data: json!({"id": 1}),
            }
        );
    }

    #[test]
    fn test_classify_requires_code_and_message() {
        assert!(matches!(classify(json!({"code": 1})), Payload::Raw(_)));
        assert!(matches!(classify(json!({"message": "hi"})), Payload::Raw(_)));
        assert!(matches!(classify(json!([1, 2, 3])), Payload::Raw(_)));
        assert!(matches!(classify(json!("text")), Payload::Raw(_)));
    }

    #[test]
    fn test_classify_missing_data_is_null() {
        let payload = classify(json!({"code": 9995, "message": "invalid"}));
        assert!(matches!(payload, Payload::Enveloped { data: Value::Null, .. }));
    }

    #[test]
    fn test_success_envelope_is_unwrapped() {
        let response = json_response(200, json!({"code": 10000, "message": "ok", "data": {"id": 1}}));
        let normalized = ResponseNormalizer::default().parse(&response).unwrap();
        assert_eq!(normalized.data, json!({"id": 1}));
        assert_eq!(normalized.status, 200);
        assert_eq!(normalized.status_text, "OK");
    }

    #[test]
    fn test_failure_code_overrides_transport_success() {
        let body = json!({"code": 9999, "message": "bad input", "data": null});
        let response = json_response(200, body.clone());
        let err = ResponseNormalizer::default().parse(&response).unwrap_err();

        assert_eq!(err.status(), 200);
        assert_eq!(err.message(), "bad input");
        assert_eq!(err.data(), Some(&body));
    }

    #[test]
    fn test_failure_keeps_extra_envelope_fields() {
        let body = json!({"code": "10000", "message": "stringly", "data": 1, "trace": "abc"});
        let response = json_response(200, body.clone());
        let err = ResponseNormalizer::default().parse(&response).unwrap_err();
        assert!(matches!(err, HttpClientError::LogicalFailure { code: None, .. }));
        assert_eq!(err.data(), Some(&body));
    }

    #[test]
    fn test_custom_success_code() {
        let response = json_response(200, json!({"code": 0, "message": "ok", "data": [1]}));
        let normalized = ResponseNormalizer::new(0).parse(&response).unwrap();
        assert_eq!(normalized.data, json!([1]));
    }

    #[test]
    fn test_raw_payload_passes_through() {
        let response = json_response(200, json!({"users": []}));
        let normalized = ResponseNormalizer::default().parse(&response).unwrap();
        assert_eq!(normalized.data, json!({"users": []}));
    }

    #[test]
    fn test_text_payload() {
        let response = Response::new(
            StatusCode::OK,
            HeaderMap::new(),
            "plain words",
            url::Url::parse("http://localhost/").unwrap(),
        );
        let normalized = ResponseNormalizer::default().parse(&response).unwrap();
        assert_eq!(normalized.data, json!("plain words"));
    }

    #[test]
    fn test_non_utf8_text_payload_decodes() {
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("text/html; charset=iso-8859-1"),
        );
        let response = Response::new(
            StatusCode::NOT_FOUND,
            headers,
            vec![0xff, 0xfe, b'x'],
            url::Url::parse("http://localhost/").unwrap(),
        );
        let normalized = ResponseNormalizer::default().parse(&response).unwrap();
        assert_eq!(normalized.data, json!("\u{fffd}\u{fffd}x"));
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        let response = Response::new(
            StatusCode::BAD_GATEWAY,
            headers,
            "<html>",
            url::Url::parse("http://localhost/").unwrap(),
        );
        let err = ResponseNormalizer::default().parse(&response).unwrap_err();
        assert!(matches!(err, HttpClientError::Parse { status: 502, .. }));
        assert!(decode_error_body(&response).is_none());
    }

    #[test]
    fn test_response_codes() {
        assert_eq!(ResponseCode::from_code(9998), Some(ResponseCode::ServerBusy));
        assert_eq!(ResponseCode::Success.code(), SUCCESS_CODE);
        assert_eq!(ResponseCode::from_code(42), None);
    }
}
