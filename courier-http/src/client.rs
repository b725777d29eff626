//! HTTP client implementation.

use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::envelope::{ResponseNormalizer, decode_error_body};
use crate::interceptor::{
    InterceptorRegistry, Rejection, RequestInterceptor, ResponseInterceptor,
    apply_request_interceptors, apply_response_interceptors, reject,
};
use crate::request::{Body, Credentials};
use crate::session::{SessionGuard, SessionHandler};
use crate::token::TokenProvider;
use crate::{
    BlobResponse, HttpClientConfig, HttpClientError, NormalizedResponse, RequestConfig, Response,
    Result, StatusMessages,
};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

type ResponseChain = [Arc<dyn ResponseInterceptor>];

/// HTTP client with an interceptor pipeline and envelope-aware responses.
///
/// Clones share the same connection pool, interceptors and token provider.
#[derive(Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
    config: Arc<HttpClientConfig>,
    registry: Arc<InterceptorRegistry>,
    normalizer: ResponseNormalizer,
}

impl HttpClient {
    /// Create a new HTTP client with the given configuration.
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .user_agent(&config.user_agent);

        if config.gzip {
            builder = builder.gzip(true);
        }
        if config.brotli {
            builder = builder.brotli(true);
        }
        if config.follow_redirects {
            builder = builder.redirect(reqwest::redirect::Policy::limited(config.max_redirects));
        } else {
            builder = builder.redirect(reqwest::redirect::Policy::none());
        }

        let inner = builder.build()?;

        Ok(Self {
            inner,
            normalizer: ResponseNormalizer::new(config.success_code),
            config: Arc::new(config),
            registry: Arc::new(InterceptorRegistry::new()),
        })
    }

    /// Create a client wired to `session`.
    ///
    /// The session supplies the bearer token, and the default error
    /// interceptor clears it when the server answers 401.
    pub fn with_defaults<S>(config: HttpClientConfig, session: Arc<S>) -> Result<Self>
    where
        S: TokenProvider + SessionHandler + 'static,
    {
        let client = Self::new(config)?;
        client.set_token_provider_arc(session.clone());
        let session: Arc<dyn SessionHandler> = session;
        client.install_defaults(Some(session));
        Ok(client)
    }

    /// Register the default error interceptor.
    pub fn install_defaults(&self, session: Option<Arc<dyn SessionHandler>>) {
        let guard = match session {
            Some(session) => SessionGuard::with_session(session),
            None => SessionGuard::new(),
        };
        self.add_response_interceptor(guard);
    }

    /// Get the underlying reqwest client.
    pub fn inner(&self) -> &reqwest::Client {
        &self.inner
    }

    /// Get the client configuration.
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Get the interceptor registry.
    pub fn registry(&self) -> &InterceptorRegistry {
        &self.registry
    }

    /// Append a request interceptor.
    pub fn add_request_interceptor<I>(&self, interceptor: I)
    where
        I: RequestInterceptor + 'static,
    {
        self.registry.add_request_interceptor(Arc::new(interceptor));
    }

    /// Append a response interceptor.
    pub fn add_response_interceptor<I>(&self, interceptor: I)
    where
        I: ResponseInterceptor + 'static,
    {
        self.registry.add_response_interceptor(Arc::new(interceptor));
    }

    /// Set the token provider consulted on every request.
    pub fn set_token_provider<P>(&self, provider: P)
    where
        P: TokenProvider + 'static,
    {
        self.registry.set_token_provider(Arc::new(provider));
    }

    /// Set a shared token provider.
    pub fn set_token_provider_arc(&self, provider: Arc<dyn TokenProvider>) {
        self.registry.set_token_provider(provider);
    }

    /// Run the request pipeline and return the raw response.
    ///
    /// Request interceptors, header preparation, one network call and the
    /// response interceptors' success hooks. Errors are not routed through
    /// the error handlers here.
    pub async fn execute(&self, config: RequestConfig) -> Result<Response> {
        let chain = self.registry.response_interceptors();
        self.dispatch(config, &chain).await
    }

    async fn dispatch(&self, config: RequestConfig, chain: &ResponseChain) -> Result<Response> {
        let request_chain = self.registry.request_interceptors();
        let config = apply_request_interceptors(&request_chain, config).await?;

        let headers = self.prepare_headers(&config).await?;
        let url = self.build_url(&config.url, &config.query)?;

        debug!(method = %config.method, url = %url, "Sending HTTP request");

        let mut builder = self
            .inner
            .request(config.method.clone(), url)
            .headers(headers);
        if let Some(body) = &config.body {
            builder = builder.body(body.encode()?);
        }
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        let response = Response::from_reqwest(builder.send().await?).await?;
        debug!(
            status = %response.status(),
            url = %response.url(),
            "Received HTTP response"
        );

        apply_response_interceptors(chain, response).await
    }

    /// Merge default and caller headers and attach the bearer token.
    ///
    /// Caller headers win over defaults. A form body switches the default
    /// content type to `application/x-www-form-urlencoded`. When credentials
    /// are included and the provider returns a non-empty token, it replaces
    /// any `Authorization` header already present.
    pub async fn prepare_headers(&self, config: &RequestConfig) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.config.default_headers {
            let name = HeaderName::try_from(name.as_str()).map_err(|e| {
                HttpClientError::InvalidRequest(format!("default header {name}: {e}"))
            })?;
            let value = HeaderValue::try_from(value.as_str()).map_err(|e| {
                HttpClientError::InvalidRequest(format!("default header {name}: {e}"))
            })?;
            headers.insert(name, value);
        }

        if matches!(config.body, Some(Body::Form(_))) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE));
        }

        for name in config.headers.keys() {
            headers.remove(name);
        }
        for (name, value) in &config.headers {
            headers.append(name.clone(), value.clone());
        }

        if config.credentials == Credentials::Include
            && let Some(provider) = self.registry.token_provider()
            && let Some(token) = provider.token().await
            && !token.is_empty()
        {
            let value = HeaderValue::try_from(format!("Bearer {token}"))
                .map_err(|e| HttpClientError::InvalidRequest(format!("bearer token: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }

        Ok(headers)
    }

    /// Resolve a request URL against the base URL and append query parameters.
    pub fn build_url(&self, url: &str, query: &[(String, String)]) -> Result<url::Url> {
        let mut resolved = match url::Url::parse(url) {
            Ok(absolute) => absolute,
            Err(url::ParseError::RelativeUrlWithoutBase) => match &self.config.base_url {
                Some(base) => url::Url::parse(&join_url(base, url))?,
                None => {
                    return Err(HttpClientError::InvalidRequest(format!(
                        "relative URL without a base URL: {url}"
                    )));
                }
            },
            Err(e) => return Err(e.into()),
        };

        if !query.is_empty() {
            resolved.query_pairs_mut().extend_pairs(query);
        }

        Ok(resolved)
    }

    /// Perform a call and normalize the response.
    ///
    /// Any failure, including deserialization into `T`, goes through the
    /// response interceptors' error handlers before reaching the caller.
    pub async fn request<T: DeserializeOwned>(
        &self,
        config: RequestConfig,
    ) -> Result<NormalizedResponse<T>> {
        let chain = self.registry.response_interceptors();
        match self.fetch_normalized(config, &chain).await {
            Ok(normalized) => Ok(normalized),
            Err(error) => self.recover(&chain, error).await,
        }
    }

    /// Perform a call and return the payload as untyped JSON.
    pub async fn request_value(&self, config: RequestConfig) -> Result<NormalizedResponse> {
        self.request(config).await
    }

    async fn fetch_normalized<T: DeserializeOwned>(
        &self,
        config: RequestConfig,
        chain: &ResponseChain,
    ) -> Result<NormalizedResponse<T>> {
        let response = self.dispatch(config, chain).await?;
        let normalized = self.normalizer.parse(&response)?;

        if !response.is_success() {
            return Err(raise_http_error(
                response.status().as_u16(),
                Some(normalized.data),
                &self.config.status_messages,
            ));
        }

        normalized.into_typed()
    }

    async fn recover<T: DeserializeOwned>(
        &self,
        chain: &ResponseChain,
        error: HttpClientError,
    ) -> Result<NormalizedResponse<T>> {
        let status = error.status();
        match reject(chain, error).await {
            Rejection::Reject(error) => Err(error),
            Rejection::Recover(value) => NormalizedResponse::recovered(value, status).into_typed(),
        }
    }

    /// Perform a call and return the raw body.
    ///
    /// Non-2xx responses are raised like [`request`](Self::request), using a
    /// best-effort decode of the error body.
    pub async fn request_blob(&self, config: RequestConfig) -> Result<BlobResponse> {
        let chain = self.registry.response_interceptors();
        match self.fetch_blob(config, &chain).await {
            Ok(blob) => Ok(blob),
            Err(error) => {
                let status = error.status();
                match reject(&chain, error).await {
                    Rejection::Reject(error) => Err(error),
                    Rejection::Recover(value) => Ok(BlobResponse::recovered(value, status)),
                }
            }
        }
    }

    async fn fetch_blob(&self, config: RequestConfig, chain: &ResponseChain) -> Result<BlobResponse> {
        let response = self.dispatch(config, chain).await?;

        if !response.is_success() {
            return Err(raise_http_error(
                response.status().as_u16(),
                decode_error_body(&response),
                &self.config.status_messages,
            ));
        }

        Ok(BlobResponse::from(response))
    }

    /// Send a GET request.
    pub async fn get<T: DeserializeOwned>(
        &self,
        url: impl Into<String>,
        config: Option<RequestConfig>,
    ) -> Result<NormalizedResponse<T>> {
        let config = config.unwrap_or_default().method(Method::GET).url(url);
        self.request(config).await
    }

    /// Send a POST request with an optional JSON body.
    pub async fn post<T, B>(
        &self,
        url: impl Into<String>,
        data: Option<&B>,
        config: Option<RequestConfig>,
    ) -> Result<NormalizedResponse<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send_with_body(Method::POST, url.into(), data, config).await
    }

    /// Send a PUT request with an optional JSON body.
    pub async fn put<T, B>(
        &self,
        url: impl Into<String>,
        data: Option<&B>,
        config: Option<RequestConfig>,
    ) -> Result<NormalizedResponse<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send_with_body(Method::PUT, url.into(), data, config).await
    }

    /// Send a PATCH request with an optional JSON body.
    pub async fn patch<T, B>(
        &self,
        url: impl Into<String>,
        data: Option<&B>,
        config: Option<RequestConfig>,
    ) -> Result<NormalizedResponse<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send_with_body(Method::PATCH, url.into(), data, config).await
    }

    /// Send a DELETE request.
    pub async fn delete<T: DeserializeOwned>(
        &self,
        url: impl Into<String>,
        config: Option<RequestConfig>,
    ) -> Result<NormalizedResponse<T>> {
        let config = config.unwrap_or_default().method(Method::DELETE).url(url);
        self.request(config).await
    }

    async fn send_with_body<T, B>(
        &self,
        method: Method,
        url: String,
        data: Option<&B>,
        config: Option<RequestConfig>,
    ) -> Result<NormalizedResponse<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let config = config.unwrap_or_default().method(method).url(url);
        let config = match data {
            Some(data) => config.json(data),
            None => Ok(config.body(None)),
        };

        match config {
            Ok(config) => self.request(config).await,
            Err(error) => {
                let chain = self.registry.response_interceptors();
                self.recover(&chain, error).await
            }
        }
    }
}

/// Build the error for a response whose status is outside 200-299.
///
/// The message is taken from the payload's `message` field when present,
/// then from the status table, then a generic fallback.
pub fn raise_http_error(
    status: u16,
    data: Option<Value>,
    messages: &StatusMessages,
) -> HttpClientError {
    let message = data
        .as_ref()
        .and_then(|data| data.get("message"))
        .and_then(Value::as_str)
        .filter(|message| !message.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| messages.resolve(status));

    HttpClientError::Status {
        status,
        message,
        data,
    }
}

/// Join a relative path onto a base URL with exactly one slash between them.
fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

static DEFAULT_CLIENT: RwLock<Option<HttpClient>> = RwLock::new(None);

/// The process-wide client.
///
/// Created on first use from [`HttpClientConfig::from_env`] with the default
/// error interceptor and no token provider. Use [`replace_default_client`] to
/// install a client wired to a session.
pub fn default_client() -> Result<HttpClient> {
    if let Some(client) = DEFAULT_CLIENT.read().as_ref() {
        return Ok(client.clone());
    }

    let mut slot = DEFAULT_CLIENT.write();
    if let Some(client) = slot.as_ref() {
        return Ok(client.clone());
    }

    let config = HttpClientConfig::from_env()
        .map_err(|e| HttpClientError::InvalidRequest(format!("configuration: {e}")))?;
    let client = HttpClient::new(config)?;
    client.install_defaults(None);
    *slot = Some(client.clone());
    Ok(client)
}

/// Swap the process-wide client, returning the previous one.
pub fn replace_default_client(client: HttpClient) -> Option<HttpClient> {
    DEFAULT_CLIENT.write().replace(client)
}
