//! AiGateway reconciliation
//!
//! One pass fetches the gateway, checks that this controller owns its class,
//! renders the proxy config and then converges the ConfigMap, Deployment and
//! Service in that order. Failures are reported through the Configured and
//! Ready conditions; only a failed status write is returned as an error.

use crate::conditions::{
    set_condition, status_changed, ConditionStatus, CONDITION_CONFIGURED, CONDITION_READY,
    REASON_CONFIGMAP_FAILED, REASON_CONFIG_GENERATION_FAILED, REASON_CONFIGURATION_APPLIED,
    REASON_DEPLOYMENT_FAILED, REASON_GATEWAY_READY, REASON_SERVICE_FAILED,
};
use crate::equality::{env_from_equal, env_vars_equal, required_labels_present};
use crate::error::{GatewayError, Result};
use crate::render::ProxyKind;
use crate::resources::{synthesize, ChildResources, ProxySettings, CONFIG_FILE_KEY};
use crate::store::ObjectStore;
use chrono::Utc;
use gateway_api::{AiGateway, AiGatewayStatus};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Container, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::ResourceExt;
use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};

/// Identifier this controller answers to in AiGatewayClass.spec.controller
pub const CONTROLLER_NAME: &str = "aigateway.agentic-layer.ai/ai-gateway-litellm-controller";

/// What a single apply step did to a child object
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyResult {
    Created,
    Updated,
    Unchanged,
}

impl ApplyResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplyResult::Created => "create",
            ApplyResult::Updated => "update",
            ApplyResult::Unchanged => "unchanged",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The gateway no longer exists
    NotFound,
    /// Another controller is responsible for the gateway
    Skipped,
    /// The pass stopped early; the reason is also on the status conditions.
    /// Only child sync failures are `retryable`; a bad spec waits for an edit.
    Failed {
        reason: String,
        message: String,
        retryable: bool,
    },
    Ready { config_hash: String },
}

/// Summary of one reconcile pass
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconcileReport {
    pub outcome: ReconcileOutcome,
    /// Per child kind, what the apply step did
    pub applied: Vec<(&'static str, ApplyResult)>,
    pub status_written: bool,
}

impl ReconcileReport {
    fn new(outcome: ReconcileOutcome) -> Self {
        Self {
            outcome,
            applied: Vec::new(),
            status_written: false,
        }
    }

    /// Number of create or update calls issued for child objects
    pub fn writes(&self) -> usize {
        self.applied
            .iter()
            .filter(|(_, result)| *result != ApplyResult::Unchanged)
            .count()
    }
}

pub struct Reconciler<S> {
    store: S,
    controller_name: String,
    settings: ProxySettings,
}

impl<S: ObjectStore> Reconciler<S> {
    pub fn new(store: S, settings: ProxySettings) -> Self {
        Self {
            store,
            controller_name: CONTROLLER_NAME.to_string(),
            settings,
        }
    }

    pub fn with_controller_name(mut self, controller_name: impl Into<String>) -> Self {
        self.controller_name = controller_name.into();
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run one reconcile pass for the named gateway
    pub async fn reconcile(&self, namespace: &str, name: &str) -> Result<ReconcileReport> {
        let Some(gateway) = self.store.get::<AiGateway>(namespace, name).await? else {
            info!("AiGateway {}/{} not found", namespace, name);
            return Ok(ReconcileReport::new(ReconcileOutcome::NotFound));
        };

        if !self.should_process(&gateway).await {
            debug!("AiGateway {}/{} belongs to another controller", namespace, name);
            return Ok(ReconcileReport::new(ReconcileOutcome::Skipped));
        }

        info!(gateway = %name, namespace = %namespace, "Reconciling AiGateway");

        let mut status = gateway.status.clone().unwrap_or_default();
        let mut applied = Vec::new();

        let outcome = match self.apply(&gateway, namespace, &mut applied).await {
            Ok(config_hash) => {
                let now = Utc::now();
                status.config_hash = Some(config_hash.clone());
                status.last_updated = Some(Time(now));
                set_condition(
                    &mut status.conditions,
                    CONDITION_CONFIGURED,
                    ConditionStatus::True,
                    REASON_CONFIGURATION_APPLIED,
                    "AiGateway configuration successfully applied",
                    now,
                );
                set_condition(
                    &mut status.conditions,
                    CONDITION_READY,
                    ConditionStatus::True,
                    REASON_GATEWAY_READY,
                    "AiGateway is ready and serving traffic",
                    now,
                );
                info!(
                    gateway = %name,
                    models = gateway.spec.ai_models.len(),
                    config_hash = %config_hash,
                    "Successfully reconciled AiGateway"
                );
                ReconcileOutcome::Ready { config_hash }
            }
            Err(failure) => {
                error!(gateway = %name, reason = failure.reason, "{}", failure.message);
                let now = Utc::now();
                set_condition(
                    &mut status.conditions,
                    CONDITION_CONFIGURED,
                    ConditionStatus::False,
                    failure.reason,
                    failure.message.clone(),
                    now,
                );
                set_condition(
                    &mut status.conditions,
                    CONDITION_READY,
                    ConditionStatus::False,
                    failure.reason,
                    format!("AiGateway not ready: {}", failure.message),
                    now,
                );
                ReconcileOutcome::Failed {
                    reason: failure.reason.to_string(),
                    message: failure.message,
                    retryable: failure.retryable,
                }
            }
        };

        let status_written = self.persist_status(&gateway, status).await?;
        Ok(ReconcileReport {
            outcome,
            applied,
            status_written,
        })
    }

    /// Whether this controller is responsible for the gateway's class.
    /// An explicit class must be one of ours; without one, we must own the
    /// cluster default.
    pub async fn should_process(&self, gateway: &AiGateway) -> bool {
        let classes = match self.store.list_classes().await {
            Ok(classes) => classes,
            Err(e) => {
                warn!("Failed to list AiGatewayClasses, skipping {}: {}", gateway.name_any(), e);
                return false;
            }
        };

        let mut ours = classes
            .iter()
            .filter(|class| class.spec.controller == self.controller_name);

        match gateway.spec.ai_gateway_class_name.as_deref().filter(|c| !c.is_empty()) {
            Some(class_name) => ours.any(|class| class.name_any() == class_name),
            None => ours.any(|class| {
                let default = class.is_default();
                if default {
                    debug!("Using default AiGatewayClass {}", class.name_any());
                }
                default
            }),
        }
    }

    async fn apply(
        &self,
        gateway: &AiGateway,
        namespace: &str,
        applied: &mut Vec<(&'static str, ApplyResult)>,
    ) -> std::result::Result<String, StageFailure> {
        let kind = ProxyKind::from_tag(gateway.spec.r#type.as_deref())
            .and_then(|kind| kind.validate(&gateway.spec).map(|_| kind))
            .map_err(|e| StageFailure {
                reason: e.reason(),
                message: format!("AiGateway configuration validation failed: {}", e),
                retryable: false,
            })?;

        let rendered = kind
            .render(&gateway.spec)
            .map_err(|e| StageFailure::new(REASON_CONFIG_GENERATION_FAILED, "Failed to generate config", e))?;

        let ChildResources {
            config_map,
            deployment,
            service,
        } = synthesize(gateway, &rendered, &self.settings)
            .map_err(|e| StageFailure::new(REASON_CONFIG_GENERATION_FAILED, "Failed to build resources", e))?;

        let result = self
            .apply_config_map(namespace, config_map)
            .await
            .map_err(|e| StageFailure::sync(REASON_CONFIGMAP_FAILED, "ConfigMap", e))?;
        applied.push(("ConfigMap", result));

        let result = self
            .apply_deployment(namespace, deployment)
            .await
            .map_err(|e| StageFailure::sync(REASON_DEPLOYMENT_FAILED, "Deployment", e))?;
        applied.push(("Deployment", result));

        let result = self
            .apply_service(namespace, service)
            .await
            .map_err(|e| StageFailure::sync(REASON_SERVICE_FAILED, "Service", e))?;
        applied.push(("Service", result));

        Ok(rendered.hash)
    }

    async fn apply_config_map(&self, namespace: &str, desired: ConfigMap) -> kube::Result<ApplyResult> {
        let name = desired.name_any();
        let Some(mut existing) = self.store.get::<ConfigMap>(namespace, &name).await? else {
            info!("Creating ConfigMap {}/{}", namespace, name);
            self.store.create(namespace, &desired).await?;
            return Ok(ApplyResult::Created);
        };

        let config = |cm: &ConfigMap| cm.data.as_ref().and_then(|d| d.get(CONFIG_FILE_KEY)).cloned();
        let needs_update = config(&existing) != config(&desired)
            || !required_labels_present(existing.metadata.labels.as_ref(), desired.labels());

        if !needs_update {
            return Ok(ApplyResult::Unchanged);
        }

        info!("Updating ConfigMap {}/{}", namespace, name);
        existing.data = desired.data;
        merge_map(&mut existing.metadata.labels, desired.metadata.labels.as_ref());
        self.store.replace(namespace, &existing).await?;
        Ok(ApplyResult::Updated)
    }

    async fn apply_deployment(&self, namespace: &str, desired: Deployment) -> kube::Result<ApplyResult> {
        let name = desired.name_any();
        let Some(mut existing) = self.store.get::<Deployment>(namespace, &name).await? else {
            info!("Creating Deployment {}/{}", namespace, name);
            self.store.create(namespace, &desired).await?;
            return Ok(ApplyResult::Created);
        };

        if !deployment_needs_update(&existing, &desired) {
            return Ok(ApplyResult::Unchanged);
        }

        info!("Updating Deployment {}/{}", namespace, name);
        merge_map(&mut existing.metadata.labels, desired.metadata.labels.as_ref());
        if let Some(desired_spec) = desired.spec {
            let spec = existing.spec.get_or_insert_with(Default::default);
            let desired_template = desired_spec.template.metadata.unwrap_or_default();
            let template = spec.template.metadata.get_or_insert_with(Default::default);
            merge_map(&mut template.labels, desired_template.labels.as_ref());
            merge_map(&mut template.annotations, desired_template.annotations.as_ref());

            spec.replicas = desired_spec.replicas;
            spec.selector = desired_spec.selector;
            spec.template.spec = desired_spec.template.spec;
        }
        self.store.replace(namespace, &existing).await?;
        Ok(ApplyResult::Updated)
    }

    async fn apply_service(&self, namespace: &str, desired: Service) -> kube::Result<ApplyResult> {
        let name = desired.name_any();
        let Some(mut existing) = self.store.get::<Service>(namespace, &name).await? else {
            info!("Creating Service {}/{}", namespace, name);
            self.store.create(namespace, &desired).await?;
            return Ok(ApplyResult::Created);
        };

        let port = |svc: &Service| {
            svc.spec
                .as_ref()
                .and_then(|s| s.ports.as_ref())
                .and_then(|p| p.first())
                .map(|p| p.port)
        };
        let needs_update = !required_labels_present(existing.metadata.labels.as_ref(), desired.labels())
            || port(&existing) != port(&desired);

        if !needs_update {
            return Ok(ApplyResult::Unchanged);
        }

        info!("Updating Service {}/{}", namespace, name);
        merge_map(&mut existing.metadata.labels, desired.metadata.labels.as_ref());
        let ports = desired.spec.and_then(|s| s.ports);
        existing.spec.get_or_insert_with(Default::default).ports = ports;
        self.store.replace(namespace, &existing).await?;
        Ok(ApplyResult::Updated)
    }

    async fn persist_status(&self, gateway: &AiGateway, status: AiGatewayStatus) -> Result<bool> {
        if !status_changed(gateway.status.as_ref(), &status) {
            debug!("Status of AiGateway {} unchanged", gateway.name_any());
            return Ok(false);
        }
        self.store
            .replace_status(gateway, &status)
            .await
            .map_err(GatewayError::StatusPersist)?;
        Ok(true)
    }
}

/// Why a pass stopped, as reported on the conditions
struct StageFailure {
    reason: &'static str,
    message: String,
    retryable: bool,
}

impl StageFailure {
    fn new(reason: &'static str, context: &str, err: GatewayError) -> Self {
        Self {
            reason,
            message: format!("{}: {}", context, err),
            retryable: false,
        }
    }

    fn sync(reason: &'static str, kind: &'static str, source: kube::Error) -> Self {
        let err = GatewayError::ResourceSync { kind, source };
        Self {
            reason,
            message: err.to_string(),
            retryable: true,
        }
    }
}

fn deployment_needs_update(existing: &Deployment, desired: &Deployment) -> bool {
    if !required_labels_present(existing.metadata.labels.as_ref(), desired.labels()) {
        return true;
    }

    let template_meta = |d: &Deployment| d.spec.as_ref().and_then(|s| s.template.metadata.clone()).unwrap_or_default();
    let existing_meta = template_meta(existing);
    let desired_meta = template_meta(desired);
    if !required_labels_present(existing_meta.labels.as_ref(), &desired_meta.labels.unwrap_or_default()) {
        return true;
    }
    if !required_labels_present(existing_meta.annotations.as_ref(), &desired_meta.annotations.unwrap_or_default()) {
        return true;
    }

    match (first_container(existing), first_container(desired)) {
        (Some(existing), Some(desired)) => {
            let port = |c: &Container| c.ports.as_ref().map(|p| p.iter().map(|p| p.container_port).collect::<Vec<_>>());
            !env_vars_equal(existing.env.as_deref(), desired.env.as_deref())
                || !env_from_equal(existing.env_from.as_deref(), desired.env_from.as_deref())
                || existing.image != desired.image
                || port(existing) != port(desired)
        }
        (None, Some(_)) => true,
        _ => false,
    }
}

fn first_container(deployment: &Deployment) -> Option<&Container> {
    deployment
        .spec
        .as_ref()
        .and_then(|s| s.template.spec.as_ref())
        .and_then(|p| p.containers.first())
}

/// Copy our keys into a label or annotation map, keeping foreign keys
fn merge_map(target: &mut Option<BTreeMap<String, String>>, source: Option<&BTreeMap<String, String>>) {
    if let Some(source) = source {
        let target = target.get_or_insert_with(BTreeMap::new);
        for (key, value) in source {
            target.insert(key.clone(), value.clone());
        }
    }
}
