//! Prometheus metrics for the reconcile loop

use anyhow::Result;
use gateway_core::{ApplyResult, ReconcileOutcome, ReconcileReport};
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Reconcile metrics, shared between the controller and the metrics endpoint
#[derive(Clone)]
pub struct ControllerMetrics {
    /// Completed reconcile passes by outcome
    pub reconcile_total: IntCounterVec,
    /// Passes that returned an error to the controller runtime
    pub reconcile_errors_total: IntCounter,
    pub reconcile_duration_seconds: Histogram,
    /// Create/update calls issued for child objects
    pub child_writes_total: IntCounterVec,
    pub registry: Arc<Registry>,
}

impl ControllerMetrics {
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());

        let reconcile_total = IntCounterVec::new(
            Opts::new("aigateway_reconcile_total", "Completed AiGateway reconcile passes"),
            &["result"],
        )?;

        let reconcile_errors_total = IntCounter::new(
            "aigateway_reconcile_errors_total",
            "AiGateway reconcile passes that returned an error",
        )?;

        let reconcile_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "aigateway_reconcile_duration_seconds",
            "AiGateway reconcile latency in seconds",
        ))?;

        let child_writes_total = IntCounterVec::new(
            Opts::new("aigateway_child_writes_total", "Writes issued for gateway child objects"),
            &["kind", "op"],
        )?;

        registry.register(Box::new(reconcile_total.clone()))?;
        registry.register(Box::new(reconcile_errors_total.clone()))?;
        registry.register(Box::new(reconcile_duration_seconds.clone()))?;
        registry.register(Box::new(child_writes_total.clone()))?;

        Ok(Self {
            reconcile_total,
            reconcile_errors_total,
            reconcile_duration_seconds,
            child_writes_total,
            registry,
        })
    }

    pub fn record(&self, report: &ReconcileReport) {
        let result = match report.outcome {
            ReconcileOutcome::NotFound => "not_found",
            ReconcileOutcome::Skipped => "skipped",
            ReconcileOutcome::Failed { .. } => "failed",
            ReconcileOutcome::Ready { .. } => "ready",
        };
        self.reconcile_total.with_label_values(&[result]).inc();

        for (kind, applied) in &report.applied {
            if *applied != ApplyResult::Unchanged {
                self.child_writes_total
                    .with_label_values(&[*kind, applied.as_str()])
                    .inc();
            }
        }
    }

    /// Gather all metrics in Prometheus text format
    pub fn gather(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = vec![];
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
