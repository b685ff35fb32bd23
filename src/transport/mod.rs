//! Plugin Transports
//!
//! Each transport implements [`Client`](crate::plugin::Client) for one way
//! of reaching a plugin:
//!
//! - [`local`]: handlers compiled into the host, called directly with panic
//!   isolation
//! - [`remote`]: a plugin process reached over gRPC
//! - [`fanout`]: a partitioned plugin whose `QueryData` is spread over many
//!   endpoints and merged
//!
//! All three honour the calling context's cancellation and produce the
//! [`PluginError::NotImplemented`] sentinel for unsupported capabilities.

use std::future::Future;

use crate::plugin::{CallContext, PluginError};

pub mod fanout;
pub mod local;
pub mod remote;

pub use fanout::{FanoutTransport, PartitionDirectory, PartitionEndpoint, PartitionedConnector};
pub use local::{LocalConnector, LocalTransport};
pub use remote::{GrpcConnector, GrpcStub, PluginStub, RemoteTransport};

/// Race a call against the context's cancellation.
///
/// The call future is dropped as soon as the context is cancelled.
pub(crate) async fn cancellable<F, T>(ctx: &CallContext, call: F) -> Result<T, PluginError>
where
    F: Future<Output = Result<T, PluginError>>,
{
    tokio::select! {
        biased;
        _ = ctx.cancelled() => Err(PluginError::Cancelled),
        result = call => result,
    }
}
