//! AiGateway controller: drives the core reconciler from watch events

use crate::metrics::ControllerMetrics;
use futures::StreamExt;
use gateway_api::AiGateway;
use gateway_core::resources::APP_LABEL;
use gateway_core::{GatewayError, KubeStore, ReconcileOutcome, Reconciler};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Service};
use kube::{Api, Client, ResourceExt};
use kube_runtime::controller::{Action, Controller};
use kube_runtime::watcher;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("AiGateway {0} has no namespace")]
    MissingNamespace(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

pub struct ControllerContext {
    pub reconciler: Reconciler<KubeStore>,
    pub metrics: Arc<ControllerMetrics>,
    pub resync_interval: Duration,
    pub error_requeue: Duration,
}

pub struct AiGatewayController {
    client: Client,
    context: Arc<ControllerContext>,
}

impl AiGatewayController {
    pub fn new(client: Client, context: ControllerContext) -> Self {
        Self {
            client,
            context: Arc::new(context),
        }
    }

    pub async fn run(self) {
        info!("Starting AiGateway reconciliation");

        let gateways: Api<AiGateway> = Api::all(self.client.clone());
        // Child objects all carry the app label
        let owned = watcher::Config::default().labels(APP_LABEL);

        Controller::new(gateways, watcher::Config::default())
            .owns(Api::<ConfigMap>::all(self.client.clone()), owned.clone())
            .owns(Api::<Deployment>::all(self.client.clone()), owned.clone())
            .owns(Api::<Service>::all(self.client.clone()), owned)
            .shutdown_on_signal()
            .run(reconcile, error_policy, self.context)
            .for_each(|item| async move {
                match item {
                    Ok((object, _)) => debug!("Reconciled AiGateway {}", object),
                    Err(e) => warn!("Error in reconciliation stream: {}", e),
                }
            })
            .await;

        info!("AiGateway controller stopped");
    }
}

async fn reconcile(gateway: Arc<AiGateway>, ctx: Arc<ControllerContext>) -> Result<Action, ReconcileError> {
    let name = gateway.name_any();
    let namespace = gateway
        .namespace()
        .ok_or_else(|| ReconcileError::MissingNamespace(name.clone()))?;

    let started = Instant::now();
    let result = ctx.reconciler.reconcile(&namespace, &name).await;
    ctx.metrics
        .reconcile_duration_seconds
        .observe(started.elapsed().as_secs_f64());

    let report = result?;
    ctx.metrics.record(&report);

    match &report.outcome {
        ReconcileOutcome::NotFound => {
            debug!("AiGateway {}/{} is gone, nothing to do", namespace, name)
        }
        ReconcileOutcome::Skipped => {}
        ReconcileOutcome::Failed { reason, message, .. } => warn!(
            "AiGateway {}/{} not configured ({}): {}",
            namespace, name, reason, message
        ),
        ReconcileOutcome::Ready { config_hash } => info!(
            "AiGateway {}/{} ready, config hash {} ({} writes)",
            namespace,
            name,
            config_hash,
            report.writes()
        ),
    }

    Ok(action_for(&report.outcome, ctx.resync_interval, ctx.error_requeue))
}

/// Ready passes resync periodically and failed child syncs retry after the
/// error interval. Everything else waits for the next watch event.
fn action_for(outcome: &ReconcileOutcome, resync_interval: Duration, error_requeue: Duration) -> Action {
    match outcome {
        ReconcileOutcome::Ready { .. } => Action::requeue(resync_interval),
        ReconcileOutcome::Failed { retryable: true, .. } => Action::requeue(error_requeue),
        ReconcileOutcome::Failed { retryable: false, .. }
        | ReconcileOutcome::NotFound
        | ReconcileOutcome::Skipped => Action::await_change(),
    }
}

fn error_policy(gateway: Arc<AiGateway>, err: &ReconcileError, ctx: Arc<ControllerContext>) -> Action {
    error!("Error reconciling AiGateway {}: {}", gateway.name_any(), err);
    ctx.metrics.reconcile_errors_total.inc();
    Action::requeue(ctx.error_requeue)
}
