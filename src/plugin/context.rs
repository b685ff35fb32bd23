//! Per-call context types
//!
//! [`PluginContext`] identifies who is calling and against which datasource;
//! it travels inside every request. [`CallContext`] carries what is not part
//! of the request itself: the cancellation token and, when the call was
//! triggered by an inbound web request, that request's headers.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use http::HeaderMap;
use http::header::COOKIE;
use serde_json::Value;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use uuid::Uuid;
use zeroize::Zeroizing;

/// The signed-in user a call is made on behalf of
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignedInUser {
    pub user_id: i64,
    pub login: String,
    pub name: String,
    pub email: String,
    pub role: String,
}

impl SignedInUser {
    pub fn new(user_id: i64, login: impl Into<String>) -> Self {
        Self {
            user_id,
            login: login.into(),
            ..Default::default()
        }
    }
}

/// Datasource instance settings as configured by an administrator
#[derive(Clone)]
pub struct DataSourceInstanceSettings {
    pub id: i64,
    pub uid: String,
    pub name: String,
    pub url: String,
    /// Plain JSON configuration (`keepCookies`, `oauthPassThru`, ...)
    pub json_data: Value,
    /// Decrypted secrets; wiped from memory on drop
    pub decrypted_secure_json_data: HashMap<String, Zeroizing<String>>,
    pub updated: SystemTime,
}

impl DataSourceInstanceSettings {
    pub fn new(id: i64, uid: impl Into<String>) -> Self {
        Self {
            id,
            uid: uid.into(),
            name: String::new(),
            url: String::new(),
            json_data: Value::Object(Default::default()),
            decrypted_secure_json_data: HashMap::new(),
            updated: SystemTime::UNIX_EPOCH,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_json_data(mut self, json_data: Value) -> Self {
        self.json_data = json_data;
        self
    }

    pub fn with_secure_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.decrypted_secure_json_data
            .insert(key.into(), Zeroizing::new(value.into()));
        self
    }

    /// Cookie names the datasource allows to be forwarded (`keepCookies`)
    pub fn keep_cookies(&self) -> Vec<String> {
        self.json_data
            .get("keepCookies")
            .and_then(Value::as_array)
            .map(|names| {
                names
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether the signed-in user's OAuth token is forwarded (`oauthPassThru`)
    pub fn oauth_pass_thru(&self) -> bool {
        self.json_data
            .get("oauthPassThru")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

impl fmt::Debug for DataSourceInstanceSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut secure_keys: Vec<&String> = self.decrypted_secure_json_data.keys().collect();
        secure_keys.sort();
        f.debug_struct("DataSourceInstanceSettings")
            .field("id", &self.id)
            .field("uid", &self.uid)
            .field("name", &self.name)
            .field("url", &self.url)
            .field("json_data", &self.json_data)
            .field("decrypted_secure_json_data", &secure_keys)
            .field("updated", &self.updated)
            .finish()
    }
}

/// Identity of a call: organization, target plugin, user and datasource
#[derive(Debug, Clone, Default)]
pub struct PluginContext {
    pub org_id: i64,
    pub plugin_id: String,
    pub user: Option<SignedInUser>,
    pub datasource: Option<DataSourceInstanceSettings>,
}

impl PluginContext {
    pub fn new(org_id: i64, plugin_id: impl Into<String>) -> Self {
        Self {
            org_id,
            plugin_id: plugin_id.into(),
            user: None,
            datasource: None,
        }
    }

    pub fn with_user(mut self, user: SignedInUser) -> Self {
        self.user = Some(user);
        self
    }

    pub fn with_datasource(mut self, datasource: DataSourceInstanceSettings) -> Self {
        self.datasource = Some(datasource);
        self
    }
}

/// Headers of the inbound web request a call was made for
#[derive(Debug, Clone, Default)]
pub struct InboundRequest {
    pub headers: HeaderMap,
}

impl InboundRequest {
    pub fn new(headers: HeaderMap) -> Self {
        Self { headers }
    }

    /// All `Cookie` header values joined into one `a=1; b=2` string
    pub fn cookie_header(&self) -> Option<String> {
        let joined = self
            .headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .collect::<Vec<_>>()
            .join("; ");
        (!joined.is_empty()).then_some(joined)
    }
}

/// Call-scoped state threaded through the middleware pipeline and transports
#[derive(Debug, Clone)]
pub struct CallContext {
    request_id: Uuid,
    cancel: CancellationToken,
    inbound: Option<Arc<InboundRequest>>,
}

impl CallContext {
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            cancel: CancellationToken::new(),
            inbound: None,
        }
    }

    /// Use an existing token so the caller can cancel the call
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_inbound(mut self, inbound: InboundRequest) -> Self {
        self.inbound = Some(Arc::new(inbound));
        self
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn inbound(&self) -> Option<&InboundRequest> {
        self.inbound.as_deref()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the call is cancelled
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    /// A context for one unit of work spawned by this call. Cancelling the
    /// parent cancels the child, not the other way round.
    pub fn child(&self) -> Self {
        Self {
            request_id: self.request_id,
            cancel: self.cancel.child_token(),
            inbound: self.inbound.clone(),
        }
    }
}

impl Default for CallContext {
    fn default() -> Self {
        Self::new()
    }
}
