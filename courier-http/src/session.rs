//! Session collaborators and the default error interceptor.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;

use crate::HttpClientError;
use crate::interceptor::{Rejection, ResponseInterceptor};
use crate::token::{TokenProvider, token_from_persisted_state};

/// Owner of the user's session, notified when the server rejects credentials.
pub trait SessionHandler: Send + Sync {
    /// Forget the stored credentials.
    fn clear_session(&self);

    /// Send the user back to the login entry point.
    fn redirect_to_login(&self);
}

type RedirectFn = Box<dyn Fn() + Send + Sync>;

/// In-memory session holding the current bearer token.
///
/// Acts both as the client's [`TokenProvider`] and as the [`SessionHandler`]
/// the default error interceptor clears on 401.
#[derive(Default)]
pub struct SessionStore {
    token: RwLock<Option<String>>,
    on_redirect: Option<RedirectFn>,
}

impl SessionStore {
    /// An empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// A session already holding `token`.
    pub fn with_token(token: impl Into<String>) -> Self {
        let store = Self::new();
        store.set_token(token);
        store
    }

    /// A session restored from a persisted auth-state blob.
    pub fn from_persisted_state(raw: &str) -> Self {
        Self {
            token: RwLock::new(token_from_persisted_state(raw)),
            on_redirect: None,
        }
    }

    /// Run `f` whenever the session asks for a login redirect.
    pub fn on_redirect<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_redirect = Some(Box::new(f));
        self
    }

    /// Store a new token. An empty token clears the session.
    pub fn set_token(&self, token: impl Into<String>) {
        let token = token.into();
        *self.token.write() = (!token.is_empty()).then_some(token);
    }

    /// The stored token, if any.
    pub fn current_token(&self) -> Option<String> {
        self.token.read().clone()
    }

    /// Whether a token is stored.
    pub fn is_authenticated(&self) -> bool {
        self.token.read().is_some()
    }
}

#[async_trait]
impl TokenProvider for SessionStore {
    async fn token(&self) -> Option<String> {
        self.current_token()
    }
}

impl SessionHandler for SessionStore {
    fn clear_session(&self) {
        *self.token.write() = None;
    }

    fn redirect_to_login(&self) {
        if let Some(redirect) = &self.on_redirect {
            redirect();
        }
    }
}

/// Default error interceptor.
///
/// Logs every failed call, and on 401 clears the session and asks for a
/// login redirect. The error is always re-raised.
#[derive(Default)]
pub struct SessionGuard {
    session: Option<Arc<dyn SessionHandler>>,
}

impl SessionGuard {
    /// A guard that only logs.
    pub fn new() -> Self {
        Self::default()
    }

    /// A guard that also clears `session` on 401.
    pub fn with_session(session: Arc<dyn SessionHandler>) -> Self {
        Self {
            session: Some(session),
        }
    }
}

#[async_trait]
impl ResponseInterceptor for SessionGuard {
    fn handles_rejection(&self) -> bool {
        true
    }

    async fn on_rejected(&self, error: HttpClientError) -> Rejection {
        tracing::error!(
            status = error.status(),
            message = %error.message(),
            "API request failed"
        );

        if error.is_unauthorized()
            && let Some(session) = &self.session
        {
            tracing::warn!("Session rejected by server, signing out");
            session.clear_session();
            session.redirect_to_login();
        }

        Rejection::Reject(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn status_error(status: u16) -> HttpClientError {
        HttpClientError::Status {
            status,
            message: "failed".to_string(),
            data: None,
        }
    }

    #[tokio::test]
    async fn test_session_store_token() {
        let store = SessionStore::with_token("jwt");
        assert_eq!(store.token().await.as_deref(), Some("jwt"));

        store.set_token("");
        assert!(!store.is_authenticated());
        assert_eq!(store.token().await, None);
    }

    #[test]
    fn test_session_from_persisted_state() {
        let store = SessionStore::from_persisted_state(r#"{"state":{"token":"saved"}}"#);
        assert_eq!(store.current_token().as_deref(), Some("saved"));
        assert!(!SessionStore::from_persisted_state("{}").is_authenticated());
    }

    #[tokio::test]
    async fn test_guard_clears_session_on_401() {
        let redirects = Arc::new(AtomicUsize::new(0));
        let counter = redirects.clone();
        let store = Arc::new(SessionStore::with_token("jwt").on_redirect(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        let guard = SessionGuard::with_session(store.clone());

        let outcome = guard.on_rejected(status_error(401)).await;

        assert!(matches!(outcome, Rejection::Reject(err) if err.status() == 401));
        assert!(!store.is_authenticated());
        assert_eq!(redirects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_guard_keeps_session_on_other_errors() {
        let store = Arc::new(SessionStore::with_token("jwt"));
        let guard = SessionGuard::with_session(store.clone());

        let outcome = guard.on_rejected(status_error(500)).await;

        assert!(matches!(outcome, Rejection::Reject(err) if err.status() == 500));
        assert!(store.is_authenticated());
    }

    #[tokio::test]
    async fn test_guard_without_session_rejects() {
        let outcome = SessionGuard::new().on_rejected(status_error(401)).await;
        assert!(matches!(outcome, Rejection::Reject(_)));
    }
}
