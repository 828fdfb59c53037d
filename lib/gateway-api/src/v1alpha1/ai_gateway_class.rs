use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Annotation marking an AiGatewayClass as the cluster default
pub const DEFAULT_CLASS_ANNOTATION: &str = "aigatewayclass.kubernetes.io/is-default-class";

/// AiGatewayClass binds a class name to the controller implementing it
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "agentic-layer.ai",
    version = "v1alpha1",
    kind = "AiGatewayClass",
    plural = "aigatewayclasses",
    derive = "Default",
    printcolumn = r#"{"name":"Controller","type":"string","jsonPath":".spec.controller"}"#,
)]
pub struct AiGatewayClassSpec {
    /// Identifier of the controller that manages gateways of this class
    pub controller: String,
}

impl AiGatewayClass {
    /// Whether the class carries the default-class annotation set to "true"
    pub fn is_default(&self) -> bool {
        self.annotations()
            .get(DEFAULT_CLASS_ANNOTATION)
            .is_some_and(|v| v == "true")
    }
}
