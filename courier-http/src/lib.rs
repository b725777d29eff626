//! # Courier HTTP
//!
//! An asynchronous HTTP request wrapper with a pluggable interceptor
//! pipeline, bearer token injection and envelope-aware responses.
//!
//! ## Features
//!
//! - **Interceptors**: Ordered request transforms and response hooks
//! - **Token Injection**: `Authorization: Bearer` from a pluggable provider
//! - **Envelope Handling**: Unwraps `{code, message, data}` backend responses
//! - **Single Error Channel**: Every failure reaches the error interceptors
//! - **Caller-Level Retry**: Configurable backoff around whole calls
//! - **Compression**: Automatic gzip/brotli support
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use courier_http::{HttpClient, HttpClientConfig};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct User {
//!     id: u64,
//!     name: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = HttpClientConfig::builder()
//!         .base_url("https://api.example.com")
//!         .build();
//!     let client = HttpClient::new(config)?;
//!
//!     let response = client.get::<Vec<User>>("/users", None).await?;
//!     for user in response.data {
//!         println!("{}: {}", user.id, user.name);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## With a Session and Interceptors
//!
//! ```rust,no_run
//! use courier_http::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//!     let session = Arc::new(SessionStore::with_token("jwt-token"));
//!     let client = HttpClient::with_defaults(HttpClientConfig::from_env()?, session)?;
//!
//!     client.add_request_interceptor(LoggingInterceptor::new());
//!     client.add_request_interceptor(request_fn(|config: RequestConfig| {
//!         Ok(config.header("X-Client", "courier"))
//!     }));
//!
//!     // A 401 clears the session before the error reaches the caller
//!     let created = client
//!         .post::<serde_json::Value, _>(
//!             "/orders",
//!             Some(&serde_json::json!({"item": "widget", "quantity": 5})),
//!             None,
//!         )
//!         .await?;
//!
//!     println!("Status: {}", created.status);
//!     Ok(())
//! }
//! ```

mod client;
mod config;
mod envelope;
mod error;
mod interceptor;
mod request;
mod response;
mod retry;
mod session;
mod token;

pub use client::{HttpClient, default_client, raise_http_error, replace_default_client};
pub use config::{
    ConfigError, DEFAULT_ENV_PREFIX, HttpClientConfig, HttpClientConfigBuilder, StatusMessages,
};
pub use envelope::{
    BackendEnvelope, Payload, ResponseCode, ResponseNormalizer, SUCCESS_CODE, classify,
    decode_body, decode_error_body, is_envelope,
};
pub use error::{HttpClientError, PARSE_FAILURE_MESSAGE, Result, TRANSPORT_FAILURE_STATUS};
pub use interceptor::{
    AsyncFnRequestInterceptor, FnRequestInterceptor, FnResponseInterceptor, InterceptorChain,
    InterceptorRegistry, LoggingInterceptor, RateLimitInterceptor, Rejection, RequestInterceptor,
    ResponseInterceptor, apply_request_interceptors, apply_response_interceptors, reject,
    request_async_fn, request_fn,
};
pub use request::{Body, Credentials, RequestConfig};
pub use response::{BlobResponse, NormalizedResponse, Response};
pub use retry::{BackoffStrategy, RetryConfig};
pub use session::{SessionGuard, SessionHandler, SessionStore};
pub use token::{
    AsyncFnTokenProvider, FnTokenProvider, StaticToken, TokenProvider, token_async_fn, token_fn,
    token_from_persisted_state,
};

// Re-export common types
pub use bytes::Bytes;
pub use http::{HeaderMap, HeaderValue, Method, StatusCode, header};
pub use url::Url;

/// Prelude for common imports.
///
/// ```
/// use courier_http::prelude::*;
/// ```
pub mod prelude {
    pub use crate::client::{HttpClient, default_client, replace_default_client};
    pub use crate::config::{HttpClientConfig, HttpClientConfigBuilder, StatusMessages};
    pub use crate::envelope::{BackendEnvelope, ResponseCode, SUCCESS_CODE};
    pub use crate::error::{HttpClientError, Result};
    pub use crate::interceptor::{
        FnResponseInterceptor, LoggingInterceptor, RateLimitInterceptor, Rejection,
        RequestInterceptor, ResponseInterceptor, request_async_fn, request_fn,
    };
    pub use crate::request::{Body, Credentials, RequestConfig};
    pub use crate::response::{BlobResponse, NormalizedResponse, Response};
    pub use crate::retry::{BackoffStrategy, RetryConfig};
    pub use crate::session::{SessionGuard, SessionHandler, SessionStore};
    pub use crate::token::{StaticToken, TokenProvider, token_fn};
    pub use http::{HeaderMap, HeaderValue, Method, StatusCode, header};
}
