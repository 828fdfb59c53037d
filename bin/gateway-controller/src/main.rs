use anyhow::{Context, Result};
use gateway_api::AiGateway;
use gateway_core::{KubeStore, Reconciler};
use kube::api::ListParams;
use kube::{Api, Client};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod ai_gateway_controller;
mod config;
mod http;
mod metrics;

use ai_gateway_controller::{AiGatewayController, ControllerContext};
use config::{ControllerConfig, LogFormat};
use metrics::ControllerMetrics;

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = ControllerConfig::from_env()?;
    init_tracing(config.log_format);

    info!("Starting gateway-controller...");
    info!("LiteLLM image: {}", config.proxy.image);

    let client = Client::try_default().await?;

    // Fail fast when the AiGateway CRD is not installed
    let gateways: Api<AiGateway> = Api::all(client.clone());
    gateways
        .list(&ListParams::default().limit(1))
        .await
        .context("AiGateway resources are not served by the API server; is the CRD installed?")?;

    let metrics = Arc::new(ControllerMetrics::new()?);

    let metrics_addr = config.metrics_addr;
    let server_metrics = metrics.clone();
    tokio::spawn(async move {
        if let Err(e) = http::serve(metrics_addr, server_metrics).await {
            error!("Metrics server error: {}", e);
        }
    });

    let context = ControllerContext {
        reconciler: Reconciler::new(KubeStore::new(client.clone()), config.proxy.clone()),
        metrics,
        resync_interval: config.resync_interval,
        error_requeue: config.error_requeue,
    };

    AiGatewayController::new(client, context).run().await;
    info!("Shutdown complete");

    Ok(())
}
