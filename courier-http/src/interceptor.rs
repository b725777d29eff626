//! Request and response interceptors.
//!
//! Interceptors are kept in [`InterceptorChain`]s: append-only, ordered
//! sequences that are snapshotted at the start of every call. The fold
//! functions in this module ([`apply_request_interceptors`],
//! [`apply_response_interceptors`] and [`reject`]) only look at a snapshot,
//! so ordering can be tested without a client or a network.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

use crate::token::TokenProvider;
use crate::{HttpClientError, RequestConfig, Response, Result};

/// Transforms the request configuration before it is sent.
#[async_trait]
pub trait RequestInterceptor: Send + Sync {
    /// Return the configuration the next interceptor should see.
    async fn intercept(&self, config: RequestConfig) -> Result<RequestConfig>;
}

/// Outcome of an error handler.
#[derive(Debug)]
pub enum Rejection {
    /// Fail the call with this error.
    Reject(HttpClientError),
    /// Swallow the error; the call resolves with this value instead.
    Recover(Value),
}

/// Observes responses and failures.
///
/// Both hooks are optional. An interceptor only takes part in error handling
/// when [`handles_rejection`](Self::handles_rejection) returns `true`.
#[async_trait]
pub trait ResponseInterceptor: Send + Sync {
    /// Inspect or replace a received response.
    async fn on_fulfilled(&self, response: Response) -> Result<Response> {
        Ok(response)
    }

    /// Whether [`on_rejected`](Self::on_rejected) is defined.
    fn handles_rejection(&self) -> bool {
        false
    }

    /// Handle a failed call.
    async fn on_rejected(&self, error: HttpClientError) -> Rejection {
        Rejection::Reject(error)
    }
}

/// Append-only ordered sequence of interceptors.
pub struct InterceptorChain<T: ?Sized> {
    entries: RwLock<Vec<Arc<T>>>,
}

impl<T: ?Sized> InterceptorChain<T> {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Append an interceptor. Duplicates are allowed.
    pub fn push(&self, interceptor: Arc<T>) {
        self.entries.write().push(interceptor);
    }

    /// The interceptors registered so far, in registration order.
    pub fn snapshot(&self) -> Vec<Arc<T>> {
        self.entries.read().clone()
    }

    /// Number of registered interceptors.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<T: ?Sized> Default for InterceptorChain<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Interceptors and token provider shared by every call of one client.
#[derive(Default)]
pub struct InterceptorRegistry {
    request: InterceptorChain<dyn RequestInterceptor>,
    response: InterceptorChain<dyn ResponseInterceptor>,
    token_provider: RwLock<Option<Arc<dyn TokenProvider>>>,
}

impl InterceptorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a request interceptor.
    pub fn add_request_interceptor(&self, interceptor: Arc<dyn RequestInterceptor>) {
        self.request.push(interceptor);
    }

    /// Append a response interceptor.
    pub fn add_response_interceptor(&self, interceptor: Arc<dyn ResponseInterceptor>) {
        self.response.push(interceptor);
    }

    /// Replace the token provider.
    pub fn set_token_provider(&self, provider: Arc<dyn TokenProvider>) {
        *self.token_provider.write() = Some(provider);
    }

    /// Current request interceptors.
    pub fn request_interceptors(&self) -> Vec<Arc<dyn RequestInterceptor>> {
        self.request.snapshot()
    }

    /// Current response interceptors.
    pub fn response_interceptors(&self) -> Vec<Arc<dyn ResponseInterceptor>> {
        self.response.snapshot()
    }

    /// Current token provider.
    pub fn token_provider(&self) -> Option<Arc<dyn TokenProvider>> {
        self.token_provider.read().clone()
    }
}

/// Fold request interceptors left to right, each seeing the previous output.
pub async fn apply_request_interceptors(
    chain: &[Arc<dyn RequestInterceptor>],
    mut config: RequestConfig,
) -> Result<RequestConfig> {
    for interceptor in chain {
        config = interceptor.intercept(config).await?;
    }
    Ok(config)
}

/// Fold `on_fulfilled` hooks over a response.
///
/// When a hook fails and the same interceptor handles rejection, its
/// `on_rejected` result becomes the error. A recovery at this stage cannot
/// stand in for a response, so it is raised as an interceptor error carrying
/// the recovered value.
pub async fn apply_response_interceptors(
    chain: &[Arc<dyn ResponseInterceptor>],
    mut response: Response,
) -> Result<Response> {
    for interceptor in chain {
        let status = response.status().as_u16();
        response = match interceptor.on_fulfilled(response).await {
            Ok(response) => response,
            Err(error) if interceptor.handles_rejection() => {
                return Err(match interceptor.on_rejected(error).await {
                    Rejection::Reject(error) => error,
                    Rejection::Recover(value) => HttpClientError::Interceptor {
                        status,
                        message: "Response rejected by interceptor".to_string(),
                        data: Some(value),
                    },
                });
            }
            Err(error) => return Err(error),
        };
    }
    Ok(response)
}

/// Route an error to the first interceptor that handles rejection.
pub async fn reject(chain: &[Arc<dyn ResponseInterceptor>], error: HttpClientError) -> Rejection {
    match chain.iter().find(|interceptor| interceptor.handles_rejection()) {
        Some(interceptor) => interceptor.on_rejected(error).await,
        None => Rejection::Reject(error),
    }
}

/// Adapter for a synchronous request transform.
pub struct FnRequestInterceptor<F>(F);

/// Wrap a synchronous closure as a [`RequestInterceptor`].
pub fn request_fn<F>(f: F) -> FnRequestInterceptor<F>
where
    F: Fn(RequestConfig) -> Result<RequestConfig> + Send + Sync,
{
    FnRequestInterceptor(f)
}

#[async_trait]
impl<F> RequestInterceptor for FnRequestInterceptor<F>
where
    F: Fn(RequestConfig) -> Result<RequestConfig> + Send + Sync,
{
    async fn intercept(&self, config: RequestConfig) -> Result<RequestConfig> {
        (self.0)(config)
    }
}

/// Adapter for an asynchronous request transform.
pub struct AsyncFnRequestInterceptor<F>(F);

/// Wrap an async closure as a [`RequestInterceptor`].
pub fn request_async_fn<F, Fut>(f: F) -> AsyncFnRequestInterceptor<F>
where
    F: Fn(RequestConfig) -> Fut + Send + Sync,
    Fut: Future<Output = Result<RequestConfig>> + Send,
{
    AsyncFnRequestInterceptor(f)
}

#[async_trait]
impl<F, Fut> RequestInterceptor for AsyncFnRequestInterceptor<F>
where
    F: Fn(RequestConfig) -> Fut + Send + Sync,
    Fut: Future<Output = Result<RequestConfig>> + Send,
{
    async fn intercept(&self, config: RequestConfig) -> Result<RequestConfig> {
        (self.0)(config).await
    }
}

type FulfilledFn = Box<dyn Fn(Response) -> Result<Response> + Send + Sync>;
type RejectedFn = Box<dyn Fn(HttpClientError) -> Rejection + Send + Sync>;

/// Response interceptor assembled from optional closures.
///
/// ```
/// use courier_http::{FnResponseInterceptor, Rejection};
///
/// let swallow_404 = FnResponseInterceptor::new().on_rejected(|error| {
///     if error.status() == 404 {
///         Rejection::Recover(serde_json::Value::Null)
///     } else {
///         Rejection::Reject(error)
///     }
/// });
/// # let _ = swallow_404;
/// ```
#[derive(Default)]
pub struct FnResponseInterceptor {
    on_fulfilled: Option<FulfilledFn>,
    on_rejected: Option<RejectedFn>,
}

impl FnResponseInterceptor {
    /// An interceptor with neither hook.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the success hook.
    pub fn on_fulfilled<F>(mut self, f: F) -> Self
    where
        F: Fn(Response) -> Result<Response> + Send + Sync + 'static,
    {
        self.on_fulfilled = Some(Box::new(f));
        self
    }

    /// Set the error hook.
    pub fn on_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn(HttpClientError) -> Rejection + Send + Sync + 'static,
    {
        self.on_rejected = Some(Box::new(f));
        self
    }
}

#[async_trait]
impl ResponseInterceptor for FnResponseInterceptor {
    async fn on_fulfilled(&self, response: Response) -> Result<Response> {
        match &self.on_fulfilled {
            Some(f) => f(response),
            None => Ok(response),
        }
    }

    fn handles_rejection(&self) -> bool {
        self.on_rejected.is_some()
    }

    async fn on_rejected(&self, error: HttpClientError) -> Rejection {
        match &self.on_rejected {
            Some(f) => f(error),
            None => Rejection::Reject(error),
        }
    }
}

/// Logging interceptor that logs requests and responses.
pub struct LoggingInterceptor {
    log_headers: bool,
}

impl LoggingInterceptor {
    /// Create a new logging interceptor.
    pub fn new() -> Self {
        Self { log_headers: false }
    }

    /// Enable logging of headers.
    pub fn with_headers(mut self) -> Self {
        self.log_headers = true;
        self
    }
}

impl Default for LoggingInterceptor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RequestInterceptor for LoggingInterceptor {
    async fn intercept(&self, config: RequestConfig) -> Result<RequestConfig> {
        tracing::debug!(
            method = %config.method,
            url = %config.url,
            "Sending HTTP request"
        );

        if self.log_headers {
            for (name, value) in &config.headers {
                tracing::trace!(
                    header = %name,
                    value = ?value,
                    "Request header"
                );
            }
        }

        Ok(config)
    }
}

#[async_trait]
impl ResponseInterceptor for LoggingInterceptor {
    async fn on_fulfilled(&self, response: Response) -> Result<Response> {
        tracing::debug!(
            status = %response.status(),
            url = %response.url(),
            "Received HTTP response"
        );

        if self.log_headers {
            for (name, value) in response.headers() {
                tracing::trace!(
                    header = %name,
                    value = ?value,
                    "Response header"
                );
            }
        }

        Ok(response)
    }
}

/// Retry-After header interceptor that reports rate limiting.
pub struct RateLimitInterceptor;

#[async_trait]
impl ResponseInterceptor for RateLimitInterceptor {
    async fn on_fulfilled(&self, response: Response) -> Result<Response> {
        if response.status() == http::StatusCode::TOO_MANY_REQUESTS
            && let Some(retry_after) = response.header(http::header::RETRY_AFTER)
            && let Ok(seconds) = retry_after.parse::<u64>()
        {
            tracing::warn!(
                retry_after_seconds = seconds,
                "Rate limited, should retry after {} seconds",
                seconds
            );
        }
        Ok(response)
    }
}
