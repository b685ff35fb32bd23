//! Wire messages of the `pluginv2` gRPC protocol
//!
//! Hand-written prost messages; frames travel as pre-serialized JSON in
//! `bytes` fields so the host never re-encodes them.

use std::collections::HashMap;

use bytes::Bytes;

pub const QUERY_DATA_PATH: &str = "/pluginv2.Data/QueryData";
pub const CHECK_HEALTH_PATH: &str = "/pluginv2.Diagnostics/CheckHealth";
pub const COLLECT_METRICS_PATH: &str = "/pluginv2.Diagnostics/CollectMetrics";
pub const CALL_RESOURCE_PATH: &str = "/pluginv2.Resource/CallResource";
pub const SUBSCRIBE_STREAM_PATH: &str = "/pluginv2.Stream/SubscribeStream";
pub const PUBLISH_STREAM_PATH: &str = "/pluginv2.Stream/PublishStream";
pub const RUN_STREAM_PATH: &str = "/pluginv2.Stream/RunStream";
pub const LIST_ENDPOINTS_PATH: &str = "/pluginv2.Partitions/ListEndpoints";

#[derive(Clone, PartialEq, prost::Message)]
pub struct User {
    #[prost(string, tag = "1")]
    pub login: String,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(string, tag = "3")]
    pub email: String,
    #[prost(string, tag = "4")]
    pub role: String,
    #[prost(int64, tag = "5")]
    pub user_id: i64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DataSourceInstanceSettings {
    #[prost(int64, tag = "1")]
    pub id: i64,
    #[prost(string, tag = "2")]
    pub uid: String,
    #[prost(string, tag = "3")]
    pub name: String,
    #[prost(string, tag = "4")]
    pub url: String,
    #[prost(bytes = "vec", tag = "5")]
    pub json_data: Vec<u8>,
    #[prost(map = "string, string", tag = "6")]
    pub decrypted_secure_json_data: HashMap<String, String>,
    #[prost(int64, tag = "7")]
    pub last_updated_ms: i64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct PluginContext {
    #[prost(int64, tag = "1")]
    pub org_id: i64,
    #[prost(string, tag = "2")]
    pub plugin_id: String,
    #[prost(message, optional, tag = "3")]
    pub user: Option<User>,
    #[prost(message, optional, tag = "4")]
    pub data_source_instance_settings: Option<DataSourceInstanceSettings>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TimeRange {
    #[prost(int64, tag = "1")]
    pub from_epoch_ms: i64,
    #[prost(int64, tag = "2")]
    pub to_epoch_ms: i64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DataQuery {
    #[prost(string, tag = "1")]
    pub ref_id: String,
    #[prost(int64, tag = "2")]
    pub max_data_points: i64,
    #[prost(int64, tag = "3")]
    pub interval_ms: i64,
    #[prost(message, optional, tag = "4")]
    pub time_range: Option<TimeRange>,
    #[prost(bytes = "vec", tag = "5")]
    pub json: Vec<u8>,
    #[prost(string, tag = "6")]
    pub query_type: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct QueryDataRequest {
    #[prost(message, optional, tag = "1")]
    pub plugin_context: Option<PluginContext>,
    #[prost(map = "string, string", tag = "2")]
    pub headers: HashMap<String, String>,
    #[prost(message, repeated, tag = "3")]
    pub queries: Vec<DataQuery>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DataResponse {
    /// JSON encoded frames
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub frames: Vec<Vec<u8>>,
    #[prost(string, tag = "2")]
    pub error: String,
    #[prost(int32, tag = "3")]
    pub status: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct QueryDataResponse {
    #[prost(map = "string, message", tag = "1")]
    pub responses: HashMap<String, DataResponse>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct CheckHealthRequest {
    #[prost(message, optional, tag = "1")]
    pub plugin_context: Option<PluginContext>,
    #[prost(map = "string, string", tag = "2")]
    pub headers: HashMap<String, String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum HealthStatus {
    Unknown = 0,
    Ok = 1,
    Error = 2,
    Warning = 3,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct CheckHealthResponse {
    #[prost(enumeration = "HealthStatus", tag = "1")]
    pub status: i32,
    #[prost(string, tag = "2")]
    pub message: String,
    #[prost(bytes = "vec", tag = "3")]
    pub json_details: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct CollectMetricsRequest {
    #[prost(message, optional, tag = "1")]
    pub plugin_context: Option<PluginContext>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct CollectMetricsResponse {
    #[prost(bytes = "bytes", tag = "1")]
    pub prometheus: Bytes,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct StringList {
    #[prost(string, repeated, tag = "1")]
    pub values: Vec<String>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct CallResourceRequest {
    #[prost(message, optional, tag = "1")]
    pub plugin_context: Option<PluginContext>,
    #[prost(string, tag = "2")]
    pub path: String,
    #[prost(string, tag = "3")]
    pub method: String,
    #[prost(string, tag = "4")]
    pub url: String,
    #[prost(map = "string, message", tag = "5")]
    pub headers: HashMap<String, StringList>,
    #[prost(bytes = "bytes", tag = "6")]
    pub body: Bytes,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct CallResourceResponse {
    #[prost(int32, tag = "1")]
    pub code: i32,
    #[prost(map = "string, message", tag = "2")]
    pub headers: HashMap<String, StringList>,
    #[prost(bytes = "bytes", tag = "3")]
    pub body: Bytes,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum StreamStatus {
    Ok = 0,
    NotFound = 1,
    PermissionDenied = 2,
}

/// Shared shape of subscribe, publish and run requests
#[derive(Clone, PartialEq, prost::Message)]
pub struct StreamRequest {
    #[prost(message, optional, tag = "1")]
    pub plugin_context: Option<PluginContext>,
    #[prost(string, tag = "2")]
    pub path: String,
    #[prost(bytes = "bytes", tag = "3")]
    pub data: Bytes,
}

/// Shared shape of subscribe and publish responses
#[derive(Clone, PartialEq, prost::Message)]
pub struct StreamResponse {
    #[prost(enumeration = "StreamStatus", tag = "1")]
    pub status: i32,
    #[prost(bytes = "bytes", tag = "2")]
    pub data: Bytes,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct StreamPacket {
    #[prost(bytes = "bytes", tag = "1")]
    pub data: Bytes,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ListEndpointsRequest {
    #[prost(message, optional, tag = "1")]
    pub request: Option<QueryDataRequest>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct PartitionEndpoint {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub address: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ListEndpointsResponse {
    #[prost(message, repeated, tag = "1")]
    pub endpoints: Vec<PartitionEndpoint>,
}
