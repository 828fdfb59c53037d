//! Status conditions for AiGateway resources

use chrono::{DateTime, Utc};
use gateway_api::AiGatewayStatus;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Condition, Time};

/// The gateway configuration was rendered and applied
pub const CONDITION_CONFIGURED: &str = "Configured";
/// The gateway's child resources are in place
pub const CONDITION_READY: &str = "Ready";

pub const REASON_CONFIGURATION_APPLIED: &str = "ConfigurationApplied";
pub const REASON_GATEWAY_READY: &str = "GatewayReady";
pub const REASON_CONFIG_GENERATION_FAILED: &str = "ConfigGenerationFailed";
pub const REASON_CONFIGMAP_FAILED: &str = "ConfigMapFailed";
pub const REASON_DEPLOYMENT_FAILED: &str = "DeploymentFailed";
pub const REASON_SERVICE_FAILED: &str = "ServiceFailed";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl ConditionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionStatus::True => "True",
            ConditionStatus::False => "False",
            ConditionStatus::Unknown => "Unknown",
        }
    }
}

/// Replace the condition with the same type in place, or append it
pub fn set_condition(
    conditions: &mut Vec<Condition>,
    type_: &str,
    status: ConditionStatus,
    reason: &str,
    message: impl Into<String>,
    now: DateTime<Utc>,
) {
    let condition = Condition {
        type_: type_.to_string(),
        status: status.as_str().to_string(),
        reason: reason.to_string(),
        message: message.into(),
        last_transition_time: Time(now),
        observed_generation: None,
    };

    match conditions.iter_mut().find(|c| c.type_ == type_) {
        Some(existing) => *existing = condition,
        None => conditions.push(condition),
    }
}

pub fn find_condition<'a>(conditions: &'a [Condition], type_: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.type_ == type_)
}

/// Whether two statuses differ in anything other than timestamps
pub fn status_changed(observed: Option<&AiGatewayStatus>, desired: &AiGatewayStatus) -> bool {
    let Some(observed) = observed else {
        return true;
    };
    if observed.config_hash != desired.config_hash
        || observed.conditions.len() != desired.conditions.len()
    {
        return true;
    }
    observed.conditions.iter().zip(&desired.conditions).any(|(a, b)| {
        a.type_ != b.type_
            || a.status != b.status
            || a.reason != b.reason
            || a.message != b.message
            || a.observed_generation != b.observed_generation
    })
}
