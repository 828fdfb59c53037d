use k8s_openapi::api::core::v1::{EnvFromSource, EnvVar};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Condition, Time};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// AiGateway describes a model gateway that routes requests to one or more
/// AI providers through a LiteLLM proxy
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "agentic-layer.ai",
    version = "v1alpha1",
    kind = "AiGateway",
    plural = "aigateways",
    namespaced,
    derive = "Default",
    status = "AiGatewayStatus",
    printcolumn = r#"{"name":"Port","type":"integer","jsonPath":".spec.port"}"#,
    printcolumn = r#"{"name":"Hash","type":"string","jsonPath":".status.configHash"}"#,
)]
#[serde(rename_all = "camelCase")]
pub struct AiGatewaySpec {
    /// Name of the AiGatewayClass responsible for this gateway.
    /// When unset the cluster's default class applies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_gateway_class_name: Option<String>,

    /// Proxy implementation used to serve the gateway (only "litellm")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,

    /// Port the proxy listens on, also exposed by the Service
    #[serde(default = "default_port")]
    pub port: i32,

    /// Models served by this gateway, in declaration order
    #[serde(default)]
    pub ai_models: Vec<AiModel>,

    /// Extra environment variables passed to the proxy container
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,

    /// Bulk imports of ConfigMaps or Secrets into the proxy environment
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env_from: Vec<EnvFromSource>,
}

/// A model exposed by the gateway
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AiModel {
    /// Public model name. Without a provider this must be "provider/model".
    pub name: String,

    /// Provider serving the model (openai, anthropic, ollama, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

impl AiModel {
    pub fn new(name: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provider: Some(provider.into()),
        }
    }
}

/// Observed state of an AiGateway, written only by the controller
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AiGatewayStatus {
    /// Configured and Ready conditions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// Short fingerprint of the rendered proxy configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_hash: Option<String>,

    /// When the configuration was last applied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<Time>,
}

fn default_port() -> i32 {
    4000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_deserializes_with_defaults() {
        let spec: AiGatewaySpec = serde_yaml::from_str(
            r#"
aiModels:
  - name: gpt-4
    provider: openai
  - name: ollama/llama3
"#,
        )
        .unwrap();

        assert_eq!(spec.port, 4000);
        assert_eq!(spec.ai_gateway_class_name, None);
        assert_eq!(spec.ai_models[0], AiModel::new("gpt-4", "openai"));
        assert_eq!(spec.ai_models[1].provider, None);
        assert!(spec.env.is_empty());
    }

    #[test]
    fn test_spec_field_names() {
        let spec = AiGatewaySpec {
            ai_gateway_class_name: Some("litellm".to_string()),
            r#type: Some("litellm".to_string()),
            port: 8000,
            ai_models: vec![AiModel::new("gpt-4", "openai")],
            ..Default::default()
        };

        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(value["aiGatewayClassName"], "litellm");
        assert_eq!(value["type"], "litellm");
        assert_eq!(value["aiModels"][0]["provider"], "openai");
        assert!(value.get("envFrom").is_none());
    }

    #[test]
    fn test_empty_status_serializes_empty() {
        let value = serde_json::to_value(AiGatewayStatus::default()).unwrap();
        assert_eq!(value, serde_json::json!({}));
    }

    #[test]
    fn test_resource_identity() {
        use kube::Resource;
        assert_eq!(AiGateway::api_version(&()), "agentic-layer.ai/v1alpha1");
        assert_eq!(AiGateway::kind(&()), "AiGateway");
        assert_eq!(crate::AiGatewayClass::api_version(&()), "agentic-layer.ai/v1alpha1");
    }
}
