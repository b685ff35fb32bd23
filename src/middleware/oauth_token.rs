//! OAuth pass-through
//!
//! For datasources configured with `oauthPassThru`, attaches the signed-in
//! user's OAuth token to the outgoing request as `Authorization` (and
//! `X-Id-Token` when an id token exists). Tokens about to expire are
//! refreshed first.
//!
//! Token resolution is best-effort: when the lookup or refresh fails the
//! call proceeds without a token and the failure is logged.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use zeroize::Zeroizing;

use super::Middleware;
use super::headers::ForwardHeaders;
use crate::plugin::capabilities::{CallResourceResponseSender, Client, StreamSender};
use crate::plugin::context::{CallContext, DataSourceInstanceSettings, SignedInUser};
use crate::plugin::isolation::PluginError;
use crate::plugin::models::{
    CallResourceRequest, CheckHealthRequest, CheckHealthResult, CollectMetricsRequest,
    CollectMetricsResult, PublishStreamRequest, PublishStreamResponse, QueryDataRequest,
    QueryDataResponse, RunStreamRequest, SubscribeStreamRequest, SubscribeStreamResponse,
};

const AUTHORIZATION_HEADER: &str = "Authorization";
const ID_TOKEN_HEADER: &str = "X-Id-Token";

/// A delegated OAuth credential
#[derive(Clone)]
pub struct OAuthToken {
    pub access_token: Zeroizing<String>,
    pub token_type: String,
    pub refresh_token: Option<Zeroizing<String>>,
    pub id_token: Option<Zeroizing<String>>,
    /// `None` means the token does not expire
    pub expiry: Option<SystemTime>,
}

impl OAuthToken {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: Zeroizing::new(access_token.into()),
            token_type: "Bearer".to_string(),
            refresh_token: None,
            id_token: None,
            expiry: None,
        }
    }

    pub fn with_id_token(mut self, id_token: impl Into<String>) -> Self {
        self.id_token = Some(Zeroizing::new(id_token.into()));
        self
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(Zeroizing::new(refresh_token.into()));
        self
    }

    pub fn with_expiry(mut self, expiry: SystemTime) -> Self {
        self.expiry = Some(expiry);
        self
    }

    /// Whether the token expires within `skew` from now
    pub fn is_expired(&self, skew: Duration) -> bool {
        match self.expiry {
            Some(expiry) => expiry <= SystemTime::now() + skew,
            None => false,
        }
    }

    /// `Authorization` header value, e.g. `Bearer abc`
    pub fn authorization_value(&self) -> String {
        let token_type = if self.token_type.is_empty() {
            "Bearer"
        } else {
            self.token_type.as_str()
        };
        format!("{} {}", token_type, self.access_token.as_str())
    }
}

impl fmt::Debug for OAuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthToken")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("has_id_token", &self.id_token.is_some())
            .field("expiry", &self.expiry)
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token lookup failed: {0}")]
    Lookup(String),

    #[error("token refresh failed: {0}")]
    Refresh(String),

    #[error("token has no refresh token")]
    NotRefreshable,
}

/// Source of stored OAuth tokens
#[async_trait]
pub trait OAuthTokenProvider: Send + Sync {
    /// The stored token for `user` against `datasource`, if any
    async fn current_token(
        &self,
        user: &SignedInUser,
        datasource: &DataSourceInstanceSettings,
    ) -> Result<Option<OAuthToken>, TokenError>;

    /// Exchange an expired token for a fresh one
    async fn refresh_token(
        &self,
        user: &SignedInUser,
        token: &OAuthToken,
    ) -> Result<OAuthToken, TokenError>;
}

#[derive(Clone)]
pub struct OAuthTokenMiddleware {
    provider: Arc<dyn OAuthTokenProvider>,
    expiry_skew: Duration,
}

impl OAuthTokenMiddleware {
    pub fn new(provider: Arc<dyn OAuthTokenProvider>, expiry_skew: Duration) -> Self {
        Self {
            provider,
            expiry_skew,
        }
    }
}

impl fmt::Debug for OAuthTokenMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthTokenMiddleware")
            .field("expiry_skew", &self.expiry_skew)
            .finish_non_exhaustive()
    }
}

impl Middleware for OAuthTokenMiddleware {
    fn name(&self) -> &'static str {
        "oauth_token"
    }

    fn wrap(&self, next: Arc<dyn Client>) -> Arc<dyn Client> {
        Arc::new(OAuthTokenClient {
            provider: self.provider.clone(),
            expiry_skew: self.expiry_skew,
            next,
        })
    }
}

struct OAuthTokenClient {
    provider: Arc<dyn OAuthTokenProvider>,
    expiry_skew: Duration,
    next: Arc<dyn Client>,
}

impl OAuthTokenClient {
    async fn resolve(
        &self,
        user: &SignedInUser,
        datasource: &DataSourceInstanceSettings,
    ) -> Option<OAuthToken> {
        let token = match self.provider.current_token(user, datasource).await {
            Ok(Some(token)) => token,
            Ok(None) => {
                tracing::debug!(
                    user_id = user.user_id,
                    datasource_uid = %datasource.uid,
                    "No OAuth token stored for user"
                );
                return None;
            }
            Err(e) => {
                tracing::warn!(
                    user_id = user.user_id,
                    datasource_uid = %datasource.uid,
                    error = %e,
                    "Failed to look up OAuth token, continuing without it"
                );
                return None;
            }
        };

        if !token.is_expired(self.expiry_skew) {
            return Some(token);
        }

        match self.provider.refresh_token(user, &token).await {
            Ok(refreshed) => {
                tracing::debug!(user_id = user.user_id, "Refreshed OAuth token");
                Some(refreshed)
            }
            Err(e) => {
                tracing::warn!(
                    user_id = user.user_id,
                    datasource_uid = %datasource.uid,
                    error = %e,
                    "Failed to refresh OAuth token, continuing without it"
                );
                None
            }
        }
    }

    async fn attach<R: ForwardHeaders + Send>(&self, mut req: R) -> R {
        let context = req.plugin_context();
        let (Some(user), Some(datasource)) = (&context.user, &context.datasource) else {
            return req;
        };
        if !datasource.oauth_pass_thru() {
            return req;
        }

        let resolved = self.resolve(user, datasource).await;
        if let Some(token) = resolved {
            req.set_header(AUTHORIZATION_HEADER, token.authorization_value());
            match &token.id_token {
                Some(id_token) => req.set_header(ID_TOKEN_HEADER, id_token.as_str().to_string()),
                None => req.remove_header(ID_TOKEN_HEADER),
            }
        }
        req
    }
}

#[async_trait]
impl Client for OAuthTokenClient {
    async fn query_data(
        &self,
        ctx: &CallContext,
        req: QueryDataRequest,
    ) -> Result<QueryDataResponse, PluginError> {
        let req = self.attach(req).await;
        self.next.query_data(ctx, req).await
    }

    async fn check_health(
        &self,
        ctx: &CallContext,
        req: CheckHealthRequest,
    ) -> Result<CheckHealthResult, PluginError> {
        let req = self.attach(req).await;
        self.next.check_health(ctx, req).await
    }

    async fn collect_metrics(
        &self,
        ctx: &CallContext,
        req: CollectMetricsRequest,
    ) -> Result<CollectMetricsResult, PluginError> {
        self.next.collect_metrics(ctx, req).await
    }

    async fn call_resource(
        &self,
        ctx: &CallContext,
        req: CallResourceRequest,
        sender: &dyn CallResourceResponseSender,
    ) -> Result<(), PluginError> {
        let req = self.attach(req).await;
        self.next.call_resource(ctx, req, sender).await
    }

    async fn subscribe_stream(
        &self,
        ctx: &CallContext,
        req: SubscribeStreamRequest,
    ) -> Result<SubscribeStreamResponse, PluginError> {
        self.next.subscribe_stream(ctx, req).await
    }

    async fn publish_stream(
        &self,
        ctx: &CallContext,
        req: PublishStreamRequest,
    ) -> Result<PublishStreamResponse, PluginError> {
        self.next.publish_stream(ctx, req).await
    }

    async fn run_stream(
        &self,
        ctx: &CallContext,
        req: RunStreamRequest,
        sender: &dyn StreamSender,
    ) -> Result<(), PluginError> {
        self.next.run_stream(ctx, req, sender).await
    }
}
