//! Request and result types of the capability contract

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use serde_json::Value;

use super::context::PluginContext;
use super::frame::{FieldConfig, Frame, FrameMeta};

/// JSON keys checked, in order, for the query text a plugin executes
const EXECUTED_QUERY_KEYS: [&str; 3] = ["expr", "rawSql", "query"];

/// Absolute time range of a query, epoch milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    pub from_ms: i64,
    pub to_ms: i64,
}

impl TimeRange {
    pub fn new(from_ms: i64, to_ms: i64) -> Self {
        Self { from_ms, to_ms }
    }
}

/// One query of a `QueryData` request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataQuery {
    /// Caller-supplied id joining this query to its result
    pub ref_id: String,
    pub query_type: String,
    pub max_data_points: i64,
    pub interval: Duration,
    pub time_range: TimeRange,
    /// Plugin-specific query model
    pub json: Value,
}

impl DataQuery {
    pub fn new(ref_id: impl Into<String>, json: Value) -> Self {
        Self {
            ref_id: ref_id.into(),
            json,
            ..Default::default()
        }
    }

    pub fn with_time_range(mut self, time_range: TimeRange) -> Self {
        self.time_range = time_range;
        self
    }

    /// Query text found in the query model, if any
    pub fn query_text(&self) -> Option<&str> {
        EXECUTED_QUERY_KEYS
            .iter()
            .find_map(|key| self.json.get(*key).and_then(Value::as_str))
            .filter(|text| !text.is_empty())
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryDataRequest {
    pub plugin_context: PluginContext,
    pub headers: HashMap<String, String>,
    pub queries: Vec<DataQuery>,
}

impl QueryDataRequest {
    pub fn new(plugin_context: PluginContext, queries: Vec<DataQuery>) -> Self {
        Self {
            plugin_context,
            headers: HashMap::new(),
            queries,
        }
    }
}

/// Result of one query: frames, or an error scoped to that query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataResponse {
    pub frames: Vec<Frame>,
    pub error: Option<String>,
    pub status: Option<u16>,
}

impl DataResponse {
    pub fn from_frames(frames: Vec<Frame>) -> Self {
        Self {
            frames,
            ..Default::default()
        }
    }

    pub fn from_error(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// Attach display metadata derived from the query that produced it
    fn annotate(&mut self, query: &DataQuery) {
        let query_text = query.query_text();
        for frame in &mut self.frames {
            if frame.executed_query_string().is_none() {
                if let Some(text) = query_text {
                    frame
                        .meta
                        .get_or_insert_with(FrameMeta::default)
                        .executed_query_string = Some(text.to_string());
                }
            }
            for field in &mut frame.fields {
                if field.labels.is_empty() || field.display_name().is_some() {
                    continue;
                }
                let display_name = field.labelled_name();
                field
                    .config
                    .get_or_insert_with(FieldConfig::default)
                    .display_name_from_ds = Some(display_name);
            }
        }
    }
}

/// Results keyed by query ref-ID
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryDataResponse {
    pub responses: HashMap<String, DataResponse>,
}

impl QueryDataResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, ref_id: impl Into<String>, response: DataResponse) {
        self.responses.insert(ref_id.into(), response);
    }

    pub fn get(&self, ref_id: &str) -> Option<&DataResponse> {
        self.responses.get(ref_id)
    }

    /// Fill in executed query strings and per-field display names that the
    /// plugin left empty. Values already set by the plugin win.
    pub fn annotate(&mut self, queries: &[DataQuery]) {
        for query in queries {
            if let Some(response) = self.responses.get_mut(&query.ref_id) {
                response.annotate(query);
            }
        }
    }
}

/// Health of a plugin as reported by `CheckHealth`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HealthStatus {
    #[default]
    Unknown,
    Ok,
    Warning,
    Error,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Unknown => write!(f, "unknown"),
            HealthStatus::Ok => write!(f, "ok"),
            HealthStatus::Warning => write!(f, "warning"),
            HealthStatus::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CheckHealthRequest {
    pub plugin_context: PluginContext,
    pub headers: HashMap<String, String>,
}

impl CheckHealthRequest {
    pub fn new(plugin_context: PluginContext) -> Self {
        Self {
            plugin_context,
            headers: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckHealthResult {
    pub status: HealthStatus,
    pub message: String,
    pub json_details: Option<Value>,
}

impl CheckHealthResult {
    pub fn new(status: HealthStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            json_details: None,
        }
    }

    /// Result reported for plugins without health check support
    pub fn unsupported() -> Self {
        Self::new(
            HealthStatus::Unknown,
            "Health check not implemented for this plugin",
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct CallResourceRequest {
    pub plugin_context: PluginContext,
    /// Resource path below the plugin's resource root
    pub path: String,
    pub method: String,
    pub url: String,
    pub headers: HashMap<String, Vec<String>>,
    pub body: Bytes,
}

impl CallResourceRequest {
    pub fn new(
        plugin_context: PluginContext,
        method: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        let path = path.into();
        Self {
            plugin_context,
            url: path.clone(),
            path,
            method: method.into(),
            headers: HashMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }
}

/// One chunk of a resource response; the first chunk carries status and headers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallResourceResponse {
    pub status: u16,
    pub headers: HashMap<String, Vec<String>>,
    pub body: Bytes,
}

impl CallResourceResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CollectMetricsRequest {
    pub plugin_context: PluginContext,
}

impl CollectMetricsRequest {
    pub fn new(plugin_context: PluginContext) -> Self {
        Self { plugin_context }
    }
}

/// Metrics in Prometheus text exposition format
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectMetricsResult {
    pub prometheus_metrics: Bytes,
}

impl CollectMetricsResult {
    pub fn is_empty(&self) -> bool {
        self.prometheus_metrics.is_empty()
    }
}

/// Outcome of stream negotiation calls
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StreamStatus {
    #[default]
    Ok,
    NotFound,
    PermissionDenied,
}

#[derive(Debug, Clone, Default)]
pub struct SubscribeStreamRequest {
    pub plugin_context: PluginContext,
    pub path: String,
    pub data: Bytes,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubscribeStreamResponse {
    pub status: StreamStatus,
    /// Optional JSON payload sent to the subscriber before streaming starts
    pub initial_data: Option<Bytes>,
}

#[derive(Debug, Clone, Default)]
pub struct PublishStreamRequest {
    pub plugin_context: PluginContext,
    pub path: String,
    pub data: Bytes,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PublishStreamResponse {
    pub status: StreamStatus,
    pub data: Bytes,
}

#[derive(Debug, Clone, Default)]
pub struct RunStreamRequest {
    pub plugin_context: PluginContext,
    pub path: String,
    pub data: Bytes,
}

/// A pre-serialized JSON payload pushed to stream subscribers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamPacket {
    pub data: Bytes,
}

impl StreamPacket {
    pub fn from_json(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    pub fn from_frame(frame: &Frame) -> Result<Self, serde_json::Error> {
        Ok(Self {
            data: Bytes::from(frame.to_json_bytes()?),
        })
    }
}
