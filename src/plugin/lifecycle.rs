//! Plugin Lifecycle Management
//!
//! Every registered plugin is tracked by a [`PluginInstance`] holding its
//! lifecycle state and, while started, the live [`Transport`] used to reach
//! it.
//!
//! # Lifecycle States
//!
//! ```text
//! ┌─────────┐    start()    ┌─────────┐    stop()    ┌────────┐
//! │ Created │──────────────>│ Started │─────────────>│ Exited │
//! └─────────┘               └─────────┘              └────────┘
//!                                ^                       │
//!                                └────── start() ────────┘
//! ```
//!
//! Decommissioning is orthogonal to these states: a decommissioned instance
//! is hidden from lookups but keeps whatever state it was in.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::dispatch::Transport;
use super::isolation::PluginError;

/// How a plugin is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// Compiled into the host process
    Local,
    /// Separate process reached over gRPC
    Remote,
    /// Data spread over partition endpoints behind a control endpoint
    Partitioned,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Local => write!(f, "local"),
            TransportKind::Remote => write!(f, "remote"),
            TransportKind::Partitioned => write!(f, "partitioned"),
        }
    }
}

/// Plugin lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginState {
    /// Registered, never started
    Created,
    /// Connection established, accepting calls
    Started,
    /// Stopped or lost; may be started again
    Exited,
}

impl PluginState {
    /// Check if the plugin can serve calls in this state
    pub fn can_serve(&self) -> bool {
        matches!(self, PluginState::Started)
    }

    pub fn is_exited(&self) -> bool {
        matches!(self, PluginState::Exited)
    }
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginState::Created => write!(f, "created"),
            PluginState::Started => write!(f, "started"),
            PluginState::Exited => write!(f, "exited"),
        }
    }
}

/// Establishes the transport for one plugin.
///
/// Invoked on every `start`, so a restarted plugin gets a fresh connection.
#[async_trait]
pub trait Connector: Send + Sync {
    fn kind(&self) -> TransportKind;

    async fn connect(&self, plugin_id: &str) -> Result<Transport, PluginError>;
}

struct Connection {
    state: PluginState,
    transport: Option<Arc<Transport>>,
    started_at: Option<Instant>,
}

impl Connection {
    fn transition(&mut self, plugin_id: &str, new_state: PluginState) {
        let old_state = self.state;
        self.state = new_state;
        tracing::debug!(
            plugin_id = %plugin_id,
            from = %old_state,
            to = %new_state,
            "Plugin state transition"
        );
    }
}

/// Lifecycle record of a registered plugin
pub struct PluginInstance {
    id: String,
    connector: Arc<dyn Connector>,
    connection: Mutex<Connection>,
    decommissioned: AtomicBool,
}

impl PluginInstance {
    pub fn new(id: impl Into<String>, connector: Arc<dyn Connector>) -> Self {
        Self {
            id: id.into(),
            connector,
            connection: Mutex::new(Connection {
                state: PluginState::Created,
                transport: None,
                started_at: None,
            }),
            decommissioned: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> TransportKind {
        self.connector.kind()
    }

    pub async fn state(&self) -> PluginState {
        self.connection.lock().await.state
    }

    /// Start the plugin. Starting a started plugin is a no-op; starting an
    /// exited plugin reconnects and clears the exited state.
    pub async fn start(&self) -> Result<(), PluginError> {
        if self.is_decommissioned() {
            return Err(PluginError::Unavailable(format!(
                "{} is decommissioned",
                self.id
            )));
        }

        let mut connection = self.connection.lock().await;
        if connection.state.can_serve() {
            return Ok(());
        }

        let transport = self.connector.connect(&self.id).await?;
        connection.transport = Some(Arc::new(transport));
        connection.started_at = Some(Instant::now());
        connection.transition(&self.id, PluginState::Started);

        tracing::info!(plugin_id = %self.id, kind = %self.kind(), "Plugin started");
        Ok(())
    }

    /// Stop the plugin and release its connection. In-flight calls holding
    /// the transport finish on their own handle.
    pub async fn stop(&self) -> Result<(), PluginError> {
        let mut connection = self.connection.lock().await;
        if connection.state.is_exited() {
            return Ok(());
        }

        connection.transport = None;
        if let Some(started_at) = connection.started_at.take() {
            tracing::info!(
                plugin_id = %self.id,
                uptime_secs = started_at.elapsed().as_secs(),
                "Plugin stopped"
            );
        }
        connection.transition(&self.id, PluginState::Exited);
        Ok(())
    }

    /// Mark the plugin as scheduled for removal
    pub fn decommission(&self) {
        if !self.decommissioned.swap(true, Ordering::SeqCst) {
            tracing::info!(plugin_id = %self.id, "Plugin decommissioned");
        }
    }

    pub fn is_decommissioned(&self) -> bool {
        self.decommissioned.load(Ordering::SeqCst)
    }

    pub async fn exited(&self) -> bool {
        self.state().await.is_exited()
    }

    /// The live transport, if the plugin is started
    pub async fn transport(&self) -> Option<Arc<Transport>> {
        let connection = self.connection.lock().await;
        if connection.state.can_serve() {
            connection.transport.clone()
        } else {
            None
        }
    }
}

impl fmt::Debug for PluginInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginInstance")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .field("decommissioned", &self.is_decommissioned())
            .finish()
    }
}
