use std::path::PathBuf;
use std::sync::Arc;

use anyhow::anyhow;
use clap::{Parser, Subcommand};
use serde_json::{Map, Value, json};
use tracing::info;

use backend_plugin_client::{
    CallContext, ClientConfig, ClientProvider, Pipeline, PluginRegistry,
    plugin::{
        CheckHealthRequest, CheckHealthResult, CollectMetricsRequest, DataQuery, PluginContext,
        QueryDataRequest, QueryDataResponse,
    },
};

/// Backend plugin client - run a single call against a configured plugin
#[derive(Parser, Debug)]
#[command(name = "plugin-client")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check the health of a plugin
    Health { plugin_id: String },

    /// Collect a plugin's Prometheus metrics
    Metrics { plugin_id: String },

    /// Run a single query against a plugin
    Query {
        plugin_id: String,

        /// Reference id of the query
        #[arg(long = "ref-id", default_value = "A")]
        ref_id: String,

        /// Query model as JSON
        #[arg(long = "json", default_value = "{}")]
        json: String,
    },
}

impl Commands {
    fn plugin_id(&self) -> &str {
        match self {
            Commands::Health { plugin_id }
            | Commands::Metrics { plugin_id }
            | Commands::Query { plugin_id, .. } => plugin_id,
        }
    }
}

fn health_to_json(result: &CheckHealthResult) -> Value {
    json!({
        "status": result.status.to_string(),
        "message": result.message,
        "details": result.json_details,
    })
}

fn query_to_json(response: &QueryDataResponse) -> anyhow::Result<Value> {
    let mut responses = Map::new();
    for (ref_id, response) in &response.responses {
        responses.insert(
            ref_id.clone(),
            json!({
                "frames": serde_json::to_value(&response.frames)?,
                "error": response.error,
                "status": response.status,
            }),
        );
    }
    Ok(json!({ "results": responses }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let config = if let Some(config_path) = cli.config {
        info!(path = %config_path.display(), "Loading configuration");
        ClientConfig::from_file(&config_path).map_err(|e| anyhow!(e.to_string()))?
    } else {
        ClientConfig::from_env().map_err(|e| anyhow!(e.to_string()))?
    };

    let registry = Arc::new(PluginRegistry::from_config(&config)?);
    for (plugin_id, e) in registry.start_all().await {
        tracing::warn!(plugin_id = %plugin_id, error = %e, "Plugin did not start");
    }

    let provider = ClientProvider::new(registry.clone(), Pipeline::standard(&config, None));
    let plugin_id = cli.command.plugin_id().to_string();
    let plugin_context = PluginContext::new(1, plugin_id.as_str());
    let ctx = CallContext::new();

    let outcome = async {
        let client = provider.client(&plugin_id).await?;
        let output = match &cli.command {
            Commands::Health { .. } => {
                let result = client
                    .check_health(&ctx, CheckHealthRequest::new(plugin_context))
                    .await?;
                health_to_json(&result)
            }
            Commands::Metrics { .. } => {
                let result = client
                    .collect_metrics(&ctx, CollectMetricsRequest::new(plugin_context))
                    .await?;
                json!({ "prometheus": String::from_utf8_lossy(&result.prometheus_metrics) })
            }
            Commands::Query { ref_id, json, .. } => {
                let model: Value = serde_json::from_str(json)
                    .map_err(|e| anyhow!("Invalid query JSON: {}", e))?;
                let request = QueryDataRequest::new(
                    plugin_context,
                    vec![DataQuery::new(ref_id.as_str(), model)],
                );
                query_to_json(&client.query_data(&ctx, request).await?)?
            }
        };
        anyhow::Ok(output)
    }
    .await;

    registry.stop_all().await;

    println!("{}", serde_json::to_string_pretty(&outcome?)?);
    Ok(())
}
