//! Plugin Errors and Panic Isolation
//!
//! This module defines the single error type used across the plugin client
//! and the panic isolation used when calling in-process plugin code.
//! Panics in plugin code are caught and converted to errors, preventing
//! plugin failures from crashing the host.
//!
//! # Safety Considerations
//!
//! - `catch_unwind` only catches panics, not aborts
//! - The host must not be built with `panic = "abort"`
//! - Panics in tasks spawned by the plugin itself are not caught here

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tonic::{Code, Status};

/// Plugin client error type
///
/// `NotImplemented` is the sentinel every transport produces when a plugin
/// does not support an operation. Test for it with
/// [`PluginError::is_not_implemented`].
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// The plugin or transport does not support this capability
    #[error("method not implemented")]
    NotImplemented,

    /// No plugin with this id is registered (or it was decommissioned)
    #[error("plugin not registered: {0}")]
    NotRegistered(String),

    /// The plugin instance is registered but not running
    #[error("plugin unavailable: {0}")]
    Unavailable(String),

    /// The calling context was cancelled
    #[error("call cancelled")]
    Cancelled,

    /// The remote side answered with a non-OK status
    #[error("plugin RPC failed: {0}")]
    Rpc(Status),

    /// Connection to a plugin process could not be established or was lost
    #[error("plugin connection error: {0}")]
    Connection(String),

    /// A request or response could not be marshaled
    #[error("plugin codec error: {0}")]
    Codec(String),

    /// The receiving side of a response sender went away
    #[error("response sender closed")]
    SenderClosed,

    /// The plugin reported a failure while executing the call
    #[error("plugin error: {0}")]
    Plugin(String),

    /// Plugin panicked during execution
    #[error("plugin panicked: {0}")]
    Panic(String),

    /// Plugin client configuration error
    #[error("plugin configuration error: {0}")]
    Configuration(String),
}

impl PluginError {
    /// Whether this is the "capability not supported" sentinel
    pub fn is_not_implemented(&self) -> bool {
        matches!(self, PluginError::NotImplemented)
    }

    /// Whether this error was caused by cancellation of the calling context
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PluginError::Cancelled)
    }
}

impl From<Status> for PluginError {
    fn from(status: Status) -> Self {
        match status.code() {
            Code::Unimplemented => PluginError::NotImplemented,
            Code::Cancelled => PluginError::Cancelled,
            _ => PluginError::Rpc(status),
        }
    }
}

impl From<serde_json::Error> for PluginError {
    fn from(err: serde_json::Error) -> Self {
        PluginError::Codec(err.to_string())
    }
}

/// Safely await an in-process plugin future with panic catching
///
/// The future is wrapped in `AssertUnwindSafe` and polled through
/// `FutureExt::catch_unwind`, so panics during polling are converted to
/// [`PluginError::Panic`]. Errors returned by the plugin are preserved.
///
/// # Example
///
/// ```ignore
/// let response = call_plugin_safely(handler.query_data(ctx, req)).await?;
/// ```
pub async fn call_plugin_safely<F, T>(plugin_future: F) -> Result<T, PluginError>
where
    F: Future<Output = Result<T, PluginError>>,
{
    match AssertUnwindSafe(plugin_future).catch_unwind().await {
        Ok(result) => result,
        Err(panic_info) => {
            let msg = extract_panic_message(&panic_info);
            tracing::error!(message = %msg, "Plugin panicked during async execution");
            Err(PluginError::Panic(msg))
        }
    }
}

/// Extract a human-readable message from panic info
///
/// Handles common panic message types: &str, String, and falls back
/// to a generic message.
fn extract_panic_message(panic_info: &Box<dyn Any + Send>) -> String {
    if let Some(s) = panic_info.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic (non-string payload)".to_string()
    }
}
