//! Client Middleware
//!
//! A middleware wraps a [`Client`] and returns a new one. The pipeline folds
//! its middlewares around a transport so that the first middleware added is
//! the outermost: it sees the request first and the response last.
//!
//! ```text
//! caller ─▶ m[0] ─▶ m[1] ─▶ ... ─▶ m[n-1] ─▶ transport
//! ```
//!
//! The standard pipeline, built from configuration, is
//! `Logger ▶ ClearAuthHeaders ▶ OAuthToken ▶ ForwardCookies`.

use std::fmt;
use std::sync::Arc;

use crate::config::ClientConfig;
use crate::plugin::capabilities::Client;

pub mod clear_auth_headers;
pub mod forward_cookies;
pub mod headers;
pub mod logger;
pub mod oauth_token;

pub use clear_auth_headers::ClearAuthHeadersMiddleware;
pub use forward_cookies::ForwardCookiesMiddleware;
pub use headers::ForwardHeaders;
pub use logger::LoggerMiddleware;
pub use oauth_token::{OAuthToken, OAuthTokenMiddleware, OAuthTokenProvider, TokenError};

/// Wraps a client in another client
pub trait Middleware: Send + Sync {
    fn name(&self) -> &'static str;

    fn wrap(&self, next: Arc<dyn Client>) -> Arc<dyn Client>;
}

/// A middleware made from a closure
pub struct MiddlewareFn<F> {
    name: &'static str,
    wrap: F,
}

/// Build a middleware from a `next -> client` function
pub fn from_fn<F>(name: &'static str, wrap: F) -> MiddlewareFn<F>
where
    F: Fn(Arc<dyn Client>) -> Arc<dyn Client> + Send + Sync,
{
    MiddlewareFn { name, wrap }
}

impl<F> Middleware for MiddlewareFn<F>
where
    F: Fn(Arc<dyn Client>) -> Arc<dyn Client> + Send + Sync,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn wrap(&self, next: Arc<dyn Client>) -> Arc<dyn Client> {
        (self.wrap)(next)
    }
}

/// Ordered list of middlewares applied to every client handed out
#[derive(Clone, Default)]
pub struct Pipeline {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a middleware; it runs inside every middleware added before it
    pub fn with(mut self, middleware: impl Middleware + 'static) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    pub fn with_arc(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middlewares.push(middleware);
        self
    }

    /// The standard pipeline. Without a token provider the OAuth stage is
    /// left out.
    pub fn standard(config: &ClientConfig, tokens: Option<Arc<dyn OAuthTokenProvider>>) -> Self {
        let mut pipeline = Self::new()
            .with(LoggerMiddleware)
            .with(ClearAuthHeadersMiddleware::new(
                config.middleware.auth_headers.clone(),
            ));
        if let Some(tokens) = tokens {
            pipeline = pipeline.with(OAuthTokenMiddleware::new(
                tokens,
                config.middleware.token_expiry_skew(),
            ));
        }
        pipeline.with(ForwardCookiesMiddleware::new(
            config.middleware.skip_cookie_names.clone(),
        ))
    }

    /// Wrap `transport` so the first middleware is the outermost
    pub fn wrap(&self, transport: Arc<dyn Client>) -> Arc<dyn Client> {
        self.middlewares
            .iter()
            .rev()
            .fold(transport, |next, middleware| middleware.wrap(next))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.middlewares.iter().map(|m| m.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("middlewares", &self.names())
            .finish()
    }
}
