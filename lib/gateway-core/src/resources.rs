//! Desired child objects for an AiGateway
//!
//! Every gateway owns a ConfigMap holding the rendered proxy config, a
//! Deployment running the proxy and a ClusterIP Service in front of it.

use crate::error::{GatewayError, Result};
use crate::render::{required_api_keys, RenderedConfig};
use gateway_api::AiGateway;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapVolumeSource, Container, ContainerPort, EnvVar, EnvVarSource, PodSpec,
    PodTemplateSpec, SecretKeySelector, Service, ServicePort, ServiceSpec, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;

/// Pinned LiteLLM proxy image
pub const DEFAULT_LITELLM_IMAGE: &str = "ghcr.io/berriai/litellm:v1.77.2-stable";
/// Secret that optionally supplies provider API keys
pub const DEFAULT_API_KEY_SECRET: &str = "api-key-secrets";
/// Pod template annotation carrying the config hash
pub const CONFIG_HASH_ANNOTATION: &str = "gateway.agentic-layer.ai/config-hash";
/// ConfigMap key holding the rendered configuration
pub const CONFIG_FILE_KEY: &str = "config.yaml";
pub const CONFIG_MOUNT_PATH: &str = "/app/config";
pub const CONTAINER_NAME: &str = "litellm";
pub const PORT_NAME: &str = "http";
pub const APP_LABEL: &str = "app";

const CONFIG_VOLUME: &str = "config";
const LOG_LEVEL_VAR: &str = "LITELLM_LOG";
const LOG_LEVEL: &str = "INFO";

/// Deployment-wide knobs for the proxy workload
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProxySettings {
    pub image: String,
    pub api_key_secret: String,
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            image: DEFAULT_LITELLM_IMAGE.to_string(),
            api_key_secret: DEFAULT_API_KEY_SECRET.to_string(),
        }
    }
}

/// The three objects a gateway should own
#[derive(Clone, Debug)]
pub struct ChildResources {
    pub config_map: ConfigMap,
    pub deployment: Deployment,
    pub service: Service,
}

pub fn config_map_name(gateway_name: &str) -> String {
    format!("{}-config", gateway_name)
}

/// Labels every child object carries and selects on
pub fn app_labels(gateway_name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(APP_LABEL.to_string(), gateway_name.to_string())])
}

/// Build the desired children of a gateway from its rendered configuration
pub fn synthesize(gateway: &AiGateway, rendered: &RenderedConfig, settings: &ProxySettings) -> Result<ChildResources> {
    let name = gateway.name_any();
    let namespace = gateway
        .namespace()
        .ok_or(GatewayError::MissingObjectKey(".metadata.namespace"))?;
    let owner = gateway
        .controller_owner_ref(&())
        .ok_or(GatewayError::MissingObjectKey(".metadata.uid"))?;

    let meta = |object_name: String| ObjectMeta {
        name: Some(object_name),
        namespace: Some(namespace.clone()),
        labels: Some(app_labels(&name)),
        owner_references: Some(vec![owner.clone()]),
        ..Default::default()
    };

    Ok(ChildResources {
        config_map: build_config_map(meta(config_map_name(&name)), rendered),
        deployment: build_deployment(meta(name.clone()), gateway, rendered, settings),
        service: build_service(meta(name.clone()), gateway),
    })
}

fn build_config_map(metadata: ObjectMeta, rendered: &RenderedConfig) -> ConfigMap {
    ConfigMap {
        metadata,
        data: Some(BTreeMap::from([(CONFIG_FILE_KEY.to_string(), rendered.data.clone())])),
        ..Default::default()
    }
}

fn build_deployment(
    metadata: ObjectMeta,
    gateway: &AiGateway,
    rendered: &RenderedConfig,
    settings: &ProxySettings,
) -> Deployment {
    let name = gateway.name_any();
    let port = gateway.spec.port;
    let env_from = Some(gateway.spec.env_from.clone()).filter(|e| !e.is_empty());

    let container = Container {
        name: CONTAINER_NAME.to_string(),
        image: Some(settings.image.clone()),
        command: Some(vec![
            "litellm".to_string(),
            "--config".to_string(),
            format!("{}/{}", CONFIG_MOUNT_PATH, CONFIG_FILE_KEY),
            "--port".to_string(),
            port.to_string(),
        ]),
        ports: Some(vec![ContainerPort {
            name: Some(PORT_NAME.to_string()),
            container_port: port,
            protocol: Some("TCP".to_string()),
            ..Default::default()
        }]),
        volume_mounts: Some(vec![VolumeMount {
            name: CONFIG_VOLUME.to_string(),
            mount_path: CONFIG_MOUNT_PATH.to_string(),
            read_only: Some(true),
            ..Default::default()
        }]),
        env: Some(build_env(gateway, &settings.api_key_secret)),
        env_from,
        ..Default::default()
    };

    Deployment {
        metadata,
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: LabelSelector {
                match_labels: Some(app_labels(&name)),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(app_labels(&name)),
                    annotations: Some(BTreeMap::from([(
                        CONFIG_HASH_ANNOTATION.to_string(),
                        rendered.hash.clone(),
                    )])),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![container],
                    volumes: Some(vec![Volume {
                        name: CONFIG_VOLUME.to_string(),
                        config_map: Some(ConfigMapVolumeSource {
                            name: config_map_name(&name),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Log level, one optional secret-backed variable per required API key,
/// then the user's own variables
fn build_env(gateway: &AiGateway, api_key_secret: &str) -> Vec<EnvVar> {
    let mut env = vec![EnvVar {
        name: LOG_LEVEL_VAR.to_string(),
        value: Some(LOG_LEVEL.to_string()),
        value_from: None,
    }];

    env.extend(required_api_keys(&gateway.spec.ai_models).into_iter().map(|key| EnvVar {
        name: key.clone(),
        value: None,
        value_from: Some(EnvVarSource {
            secret_key_ref: Some(SecretKeySelector {
                name: api_key_secret.to_string(),
                key,
                optional: Some(true),
            }),
            ..Default::default()
        }),
    }));

    env.extend(gateway.spec.env.iter().cloned());
    env
}

fn build_service(metadata: ObjectMeta, gateway: &AiGateway) -> Service {
    let port = gateway.spec.port;
    Service {
        metadata,
        spec: Some(ServiceSpec {
            type_: Some("ClusterIP".to_string()),
            selector: Some(app_labels(&gateway.name_any())),
            ports: Some(vec![ServicePort {
                name: Some(PORT_NAME.to_string()),
                port,
                target_port: Some(IntOrString::Int(port)),
                protocol: Some("TCP".to_string()),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::render;
    use gateway_api::{AiGatewaySpec, AiModel};
    use k8s_openapi::api::core::v1::{EnvFromSource, SecretEnvSource};

    fn gateway(models: Vec<AiModel>) -> AiGateway {
        let mut gateway = AiGateway::new(
            "test-gateway",
            AiGatewaySpec {
                port: 8000,
                ai_models: models,
                ..Default::default()
            },
        );
        gateway.metadata.namespace = Some("default".to_string());
        gateway.metadata.uid = Some("uid-1234".to_string());
        gateway
    }

    fn children(gateway: &AiGateway) -> ChildResources {
        let rendered = render(&gateway.spec).unwrap();
        synthesize(gateway, &rendered, &ProxySettings::default()).unwrap()
    }

    fn container(children: &ChildResources) -> &Container {
        &children.deployment.spec.as_ref().unwrap().template.spec.as_ref().unwrap().containers[0]
    }

    #[test]
    fn test_config_map() {
        let gw = gateway(vec![AiModel::new("gpt-3.5-turbo", "openai")]);
        let children = children(&gw);
        let cm = &children.config_map;

        assert_eq!(cm.metadata.name.as_deref(), Some("test-gateway-config"));
        assert_eq!(cm.metadata.namespace.as_deref(), Some("default"));
        assert_eq!(cm.labels().get("app").map(String::as_str), Some("test-gateway"));
        let data = cm.data.as_ref().unwrap().get(CONFIG_FILE_KEY).unwrap();
        assert!(data.contains("openai/gpt-3.5-turbo"));
        assert!(data.contains("os.environ/OPENAI_API_KEY"));
    }

    #[test]
    fn test_owner_references() {
        let gw = gateway(vec![AiModel::new("gpt-4", "openai")]);
        let children = children(&gw);

        for owners in [
            &children.config_map.metadata.owner_references,
            &children.deployment.metadata.owner_references,
            &children.service.metadata.owner_references,
        ] {
            let owner = &owners.as_ref().unwrap()[0];
            assert_eq!(owner.kind, "AiGateway");
            assert_eq!(owner.name, "test-gateway");
            assert_eq!(owner.uid, "uid-1234");
            assert_eq!(owner.controller, Some(true));
        }
    }

    #[test]
    fn test_missing_uid_is_an_error() {
        let mut gw = gateway(vec![AiModel::new("gpt-4", "openai")]);
        gw.metadata.uid = None;
        let rendered = render(&gw.spec).unwrap();
        assert!(matches!(
            synthesize(&gw, &rendered, &ProxySettings::default()),
            Err(GatewayError::MissingObjectKey(_))
        ));
    }

    #[test]
    fn test_deployment_shape() {
        let gw = gateway(vec![AiModel::new("gpt-3.5-turbo", "openai")]);
        let rendered = render(&gw.spec).unwrap();
        let children = synthesize(&gw, &rendered, &ProxySettings::default()).unwrap();
        let spec = children.deployment.spec.as_ref().unwrap();

        assert_eq!(spec.replicas, Some(1));
        assert_eq!(spec.selector.match_labels, Some(app_labels("test-gateway")));
        let template_meta = spec.template.metadata.as_ref().unwrap();
        assert_eq!(
            template_meta.annotations.as_ref().unwrap().get(CONFIG_HASH_ANNOTATION),
            Some(&rendered.hash)
        );

        let container = container(&children);
        assert_eq!(container.name, "litellm");
        assert_eq!(container.image.as_deref(), Some(DEFAULT_LITELLM_IMAGE));
        let port = &container.ports.as_ref().unwrap()[0];
        assert_eq!(port.container_port, 8000);
        assert_eq!(port.name.as_deref(), Some("http"));
        assert_eq!(
            container.command.as_ref().unwrap(),
            &vec!["litellm", "--config", "/app/config/config.yaml", "--port", "8000"]
        );
        assert_eq!(container.volume_mounts.as_ref().unwrap()[0].mount_path, "/app/config");

        let volume = &spec.template.spec.as_ref().unwrap().volumes.as_ref().unwrap()[0];
        assert_eq!(volume.config_map.as_ref().unwrap().name, "test-gateway-config");
    }

    #[test]
    fn test_env_contains_one_optional_key_per_provider() {
        let gw = gateway(vec![
            AiModel::new("gpt-4", "openai"),
            AiModel::new("gpt-4o", "openai"),
            AiModel::new("llama3", "ollama"),
            AiModel::new("claude-3-opus", "anthropic"),
        ]);
        let children = children(&gw);
        let env = container(&children).env.as_ref().unwrap();
        let names: Vec<_> = env.iter().map(|e| e.name.as_str()).collect();

        assert_eq!(names, vec!["LITELLM_LOG", "ANTHROPIC_API_KEY", "OPENAI_API_KEY"]);
        let selector = env[2].value_from.as_ref().unwrap().secret_key_ref.as_ref().unwrap();
        assert_eq!(selector.name, DEFAULT_API_KEY_SECRET);
        assert_eq!(selector.key, "OPENAI_API_KEY");
        assert_eq!(selector.optional, Some(true));
    }

    #[test]
    fn test_ollama_only_adds_no_key() {
        let gw = gateway(vec![AiModel::new("llama3", "ollama")]);
        let children = children(&gw);
        let env = container(&children).env.as_ref().unwrap();
        assert_eq!(env.len(), 1);
        assert_eq!(env[0].name, "LITELLM_LOG");
    }

    #[test]
    fn test_user_env_passthrough() {
        let mut gw = gateway(vec![AiModel::new("gpt-4", "openai")]);
        gw.spec.env = vec![EnvVar {
            name: "HTTP_PROXY".to_string(),
            value: Some("http://proxy:3128".to_string()),
            value_from: None,
        }];
        gw.spec.env_from = vec![EnvFromSource {
            secret_ref: Some(SecretEnvSource {
                name: "extra".to_string(),
                optional: None,
            }),
            ..Default::default()
        }];

        let children = children(&gw);
        let container = container(&children);
        assert_eq!(container.env.as_ref().unwrap().last().unwrap().name, "HTTP_PROXY");
        assert_eq!(container.env_from.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn test_custom_proxy_settings() {
        let gw = gateway(vec![AiModel::new("gpt-4", "openai")]);
        let rendered = render(&gw.spec).unwrap();
        let settings = ProxySettings {
            image: "registry.local/litellm:dev".to_string(),
            api_key_secret: "provider-keys".to_string(),
        };
        let children = synthesize(&gw, &rendered, &settings).unwrap();
        let container = container(&children);

        assert_eq!(container.image.as_deref(), Some("registry.local/litellm:dev"));
        let key = &container.env.as_ref().unwrap()[1];
        assert_eq!(key.value_from.as_ref().unwrap().secret_key_ref.as_ref().unwrap().name, "provider-keys");
    }

    #[test]
    fn test_service_shape() {
        let gw = gateway(vec![AiModel::new("gpt-4", "openai")]);
        let children = children(&gw);
        let spec = children.service.spec.as_ref().unwrap();

        assert_eq!(children.service.metadata.name.as_deref(), Some("test-gateway"));
        assert_eq!(spec.type_.as_deref(), Some("ClusterIP"));
        assert_eq!(spec.selector, Some(app_labels("test-gateway")));
        let port = &spec.ports.as_ref().unwrap()[0];
        assert_eq!(port.port, 8000);
        assert_eq!(port.target_port, Some(IntOrString::Int(8000)));
        assert_eq!(port.protocol.as_deref(), Some("TCP"));
    }
}
