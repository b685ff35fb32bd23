//! Conversions between contract models and `pluginv2` wire messages

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::plugin::context::{DataSourceInstanceSettings, PluginContext, SignedInUser};
use crate::plugin::frame::Frame;
use crate::plugin::isolation::PluginError;
use crate::plugin::models::{
    CallResourceRequest, CallResourceResponse, CheckHealthRequest, CheckHealthResult,
    CollectMetricsRequest, CollectMetricsResult, DataQuery, DataResponse, HealthStatus,
    PublishStreamRequest, PublishStreamResponse, QueryDataRequest, QueryDataResponse,
    RunStreamRequest, StreamStatus, SubscribeStreamRequest, SubscribeStreamResponse,
};

use super::messages as pb;

fn user_to_wire(user: &SignedInUser) -> pb::User {
    pb::User {
        login: user.login.clone(),
        name: user.name.clone(),
        email: user.email.clone(),
        role: user.role.clone(),
        user_id: user.user_id,
    }
}

fn datasource_to_wire(
    settings: &DataSourceInstanceSettings,
) -> Result<pb::DataSourceInstanceSettings, PluginError> {
    let last_updated_ms = settings
        .updated
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0);
    Ok(pb::DataSourceInstanceSettings {
        id: settings.id,
        uid: settings.uid.clone(),
        name: settings.name.clone(),
        url: settings.url.clone(),
        json_data: serde_json::to_vec(&settings.json_data)?,
        decrypted_secure_json_data: settings
            .decrypted_secure_json_data
            .iter()
            .map(|(key, value)| (key.clone(), value.as_str().to_string()))
            .collect(),
        last_updated_ms,
    })
}

pub(crate) fn plugin_context_to_wire(ctx: &PluginContext) -> Result<pb::PluginContext, PluginError> {
    Ok(pb::PluginContext {
        org_id: ctx.org_id,
        plugin_id: ctx.plugin_id.clone(),
        user: ctx.user.as_ref().map(user_to_wire),
        data_source_instance_settings: ctx
            .datasource
            .as_ref()
            .map(datasource_to_wire)
            .transpose()?,
    })
}

fn query_to_wire(query: &DataQuery) -> Result<pb::DataQuery, PluginError> {
    Ok(pb::DataQuery {
        ref_id: query.ref_id.clone(),
        max_data_points: query.max_data_points,
        interval_ms: query.interval.as_millis() as i64,
        time_range: Some(pb::TimeRange {
            from_epoch_ms: query.time_range.from_ms,
            to_epoch_ms: query.time_range.to_ms,
        }),
        json: serde_json::to_vec(&query.json)?,
        query_type: query.query_type.clone(),
    })
}

pub(crate) fn query_data_request_to_wire(
    req: &QueryDataRequest,
) -> Result<pb::QueryDataRequest, PluginError> {
    Ok(pb::QueryDataRequest {
        plugin_context: Some(plugin_context_to_wire(&req.plugin_context)?),
        headers: req.headers.clone(),
        queries: req
            .queries
            .iter()
            .map(query_to_wire)
            .collect::<Result<_, _>>()?,
    })
}

fn data_response_from_wire(response: pb::DataResponse) -> Result<DataResponse, PluginError> {
    let frames = response
        .frames
        .iter()
        .map(|bytes| Frame::from_json_bytes(bytes))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(DataResponse {
        frames,
        error: (!response.error.is_empty()).then_some(response.error),
        status: u16::try_from(response.status).ok().filter(|status| *status != 0),
    })
}

pub(crate) fn query_data_response_from_wire(
    response: pb::QueryDataResponse,
) -> Result<QueryDataResponse, PluginError> {
    let responses = response
        .responses
        .into_iter()
        .map(|(ref_id, data)| Ok((ref_id, data_response_from_wire(data)?)))
        .collect::<Result<HashMap<_, _>, PluginError>>()?;
    Ok(QueryDataResponse { responses })
}

pub(crate) fn check_health_request_to_wire(
    req: &CheckHealthRequest,
) -> Result<pb::CheckHealthRequest, PluginError> {
    Ok(pb::CheckHealthRequest {
        plugin_context: Some(plugin_context_to_wire(&req.plugin_context)?),
        headers: req.headers.clone(),
    })
}

pub(crate) fn check_health_result_from_wire(
    response: pb::CheckHealthResponse,
) -> Result<CheckHealthResult, PluginError> {
    let status = match pb::HealthStatus::try_from(response.status) {
        Ok(pb::HealthStatus::Ok) => HealthStatus::Ok,
        Ok(pb::HealthStatus::Warning) => HealthStatus::Warning,
        Ok(pb::HealthStatus::Error) => HealthStatus::Error,
        Ok(pb::HealthStatus::Unknown) | Err(_) => HealthStatus::Unknown,
    };
    let json_details = if response.json_details.is_empty() {
        None
    } else {
        Some(serde_json::from_slice(&response.json_details)?)
    };
    Ok(CheckHealthResult {
        status,
        message: response.message,
        json_details,
    })
}

pub(crate) fn collect_metrics_request_to_wire(
    req: &CollectMetricsRequest,
) -> Result<pb::CollectMetricsRequest, PluginError> {
    Ok(pb::CollectMetricsRequest {
        plugin_context: Some(plugin_context_to_wire(&req.plugin_context)?),
    })
}

pub(crate) fn collect_metrics_result_from_wire(
    response: pb::CollectMetricsResponse,
) -> CollectMetricsResult {
    CollectMetricsResult {
        prometheus_metrics: response.prometheus,
    }
}

fn headers_to_wire(headers: &HashMap<String, Vec<String>>) -> HashMap<String, pb::StringList> {
    headers
        .iter()
        .map(|(name, values)| {
            (
                name.clone(),
                pb::StringList {
                    values: values.clone(),
                },
            )
        })
        .collect()
}

pub(crate) fn call_resource_request_to_wire(
    req: CallResourceRequest,
) -> Result<pb::CallResourceRequest, PluginError> {
    Ok(pb::CallResourceRequest {
        plugin_context: Some(plugin_context_to_wire(&req.plugin_context)?),
        headers: headers_to_wire(&req.headers),
        path: req.path,
        method: req.method,
        url: req.url,
        body: req.body,
    })
}

pub(crate) fn call_resource_response_from_wire(
    response: pb::CallResourceResponse,
) -> Result<CallResourceResponse, PluginError> {
    let status = u16::try_from(response.code)
        .map_err(|_| PluginError::Codec(format!("invalid resource status code {}", response.code)))?;
    Ok(CallResourceResponse {
        status,
        headers: response
            .headers
            .into_iter()
            .map(|(name, list)| (name, list.values))
            .collect(),
        body: response.body,
    })
}

fn stream_status_from_wire(status: i32) -> StreamStatus {
    match pb::StreamStatus::try_from(status) {
        Ok(pb::StreamStatus::NotFound) => StreamStatus::NotFound,
        Ok(pb::StreamStatus::PermissionDenied) => StreamStatus::PermissionDenied,
        Ok(pb::StreamStatus::Ok) | Err(_) => StreamStatus::Ok,
    }
}

fn stream_request_to_wire(
    ctx: &PluginContext,
    path: String,
    data: bytes::Bytes,
) -> Result<pb::StreamRequest, PluginError> {
    Ok(pb::StreamRequest {
        plugin_context: Some(plugin_context_to_wire(ctx)?),
        path,
        data,
    })
}

pub(crate) fn subscribe_stream_request_to_wire(
    req: SubscribeStreamRequest,
) -> Result<pb::StreamRequest, PluginError> {
    stream_request_to_wire(&req.plugin_context, req.path, req.data)
}

pub(crate) fn publish_stream_request_to_wire(
    req: PublishStreamRequest,
) -> Result<pb::StreamRequest, PluginError> {
    stream_request_to_wire(&req.plugin_context, req.path, req.data)
}

pub(crate) fn run_stream_request_to_wire(
    req: RunStreamRequest,
) -> Result<pb::StreamRequest, PluginError> {
    stream_request_to_wire(&req.plugin_context, req.path, req.data)
}

pub(crate) fn subscribe_stream_response_from_wire(
    response: pb::StreamResponse,
) -> SubscribeStreamResponse {
    SubscribeStreamResponse {
        status: stream_status_from_wire(response.status),
        initial_data: (!response.data.is_empty()).then_some(response.data),
    }
}

pub(crate) fn publish_stream_response_from_wire(
    response: pb::StreamResponse,
) -> PublishStreamResponse {
    PublishStreamResponse {
        status: stream_status_from_wire(response.status),
        data: response.data,
    }
}

/// Inverse of [`plugin_context_to_wire`], used by plugin-side code and tests
pub fn plugin_context_from_wire(ctx: pb::PluginContext) -> Result<PluginContext, PluginError> {
    let user = ctx.user.map(|user| SignedInUser {
        user_id: user.user_id,
        login: user.login,
        name: user.name,
        email: user.email,
        role: user.role,
    });
    let datasource = match ctx.data_source_instance_settings {
        Some(settings) => {
            let json_data = if settings.json_data.is_empty() {
                serde_json::Value::Object(Default::default())
            } else {
                serde_json::from_slice(&settings.json_data)?
            };
            let mut datasource = DataSourceInstanceSettings::new(settings.id, settings.uid)
                .with_name(settings.name)
                .with_url(settings.url)
                .with_json_data(json_data);
            for (key, value) in settings.decrypted_secure_json_data {
                datasource = datasource.with_secure_value(key, value);
            }
            datasource.updated = SystemTime::UNIX_EPOCH
                + Duration::from_millis(settings.last_updated_ms.max(0) as u64);
            Some(datasource)
        }
        None => None,
    };
    Ok(PluginContext {
        org_id: ctx.org_id,
        plugin_id: ctx.plugin_id,
        user,
        datasource,
    })
}
