//! Bearer token providers.

use async_trait::async_trait;
use std::future::Future;

/// Supplies the current bearer token for outgoing requests.
///
/// Called once per request; the result is never cached by the client.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// The current token, or `None` when there is no session.
    async fn token(&self) -> Option<String>;
}

/// A fixed token.
#[derive(Debug, Clone, Default)]
pub struct StaticToken(Option<String>);

impl StaticToken {
    /// Always supply `token`.
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    /// Never supply a token.
    pub fn none() -> Self {
        Self(None)
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Adapter for a synchronous token getter.
pub struct FnTokenProvider<F>(F);

/// Wrap a synchronous closure as a [`TokenProvider`].
pub fn token_fn<F>(f: F) -> FnTokenProvider<F>
where
    F: Fn() -> Option<String> + Send + Sync,
{
    FnTokenProvider(f)
}

#[async_trait]
impl<F> TokenProvider for FnTokenProvider<F>
where
    F: Fn() -> Option<String> + Send + Sync,
{
    async fn token(&self) -> Option<String> {
        (self.0)()
    }
}

/// Adapter for an asynchronous token getter.
pub struct AsyncFnTokenProvider<F>(F);

/// Wrap an async closure as a [`TokenProvider`].
pub fn token_async_fn<F, Fut>(f: F) -> AsyncFnTokenProvider<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Option<String>> + Send,
{
    AsyncFnTokenProvider(f)
}

#[async_trait]
impl<F, Fut> TokenProvider for AsyncFnTokenProvider<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Option<String>> + Send,
{
    async fn token(&self) -> Option<String> {
        (self.0)().await
    }
}

/// Extract the token from a persisted auth-state blob.
///
/// The blob has the shape `{"state": {"token": "..."}}`. Malformed input,
/// a missing token or an empty token all mean "no token".
pub fn token_from_persisted_state(raw: &str) -> Option<String> {
    let parsed: serde_json::Value = serde_json::from_str(raw).ok()?;
    parsed
        .get("state")?
        .get("token")?
        .as_str()
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}
