//! Proxy configuration rendering
//!
//! Turns a gateway spec into the LiteLLM `config.yaml` document and a short
//! content fingerprint. Rendering is pure: the same spec always produces the
//! same bytes and the same hash.

use crate::error::{Result, ValidationError};
use gateway_api::{AiGatewaySpec, AiModel};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use tracing::debug;

/// Default LiteLLM request timeout (seconds)
pub const DEFAULT_REQUEST_TIMEOUT: u32 = 600;

/// Number of hex digits kept from the SHA-256 digest
pub const CONFIG_HASH_LEN: usize = 16;

/// Config generation strategy, selected by the gateway's `type` tag
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ProxyKind {
    #[default]
    Litellm,
}

impl ProxyKind {
    /// Resolve a type tag; an absent or empty tag selects LiteLLM
    pub fn from_tag(tag: Option<&str>) -> std::result::Result<Self, ValidationError> {
        match tag {
            None | Some("") | Some("litellm") => Ok(ProxyKind::Litellm),
            Some(other) => Err(ValidationError::UnsupportedType(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyKind::Litellm => "litellm",
        }
    }

    /// Check that the spec can be rendered by this strategy
    pub fn validate(&self, spec: &AiGatewaySpec) -> std::result::Result<(), ValidationError> {
        if spec.port <= 0 {
            return Err(ValidationError::InvalidPort(spec.port));
        }
        if spec.ai_models.is_empty() {
            return Err(ValidationError::MissingModels);
        }
        if spec.ai_models.iter().any(|m| m.name.is_empty()) {
            return Err(ValidationError::EmptyModelName);
        }
        Ok(())
    }

    /// Validate and render the proxy configuration for a spec
    pub fn render(&self, spec: &AiGatewaySpec) -> Result<RenderedConfig> {
        self.validate(spec)?;

        let config = match self {
            ProxyKind::Litellm => ProxyConfig {
                model_list: spec.ai_models.iter().map(ModelEntry::from_model).collect(),
                litellm_settings: ProxySettings {
                    request_timeout: DEFAULT_REQUEST_TIMEOUT,
                },
            },
        };

        let data = serde_yaml::to_string(&config)?;
        let hash = config_hash(&data);
        debug!(models = config.model_list.len(), config_hash = %hash, "Rendered proxy configuration");

        Ok(RenderedConfig { config, data, hash })
    }
}

/// Resolve the type tag of a spec and render it
pub fn render(spec: &AiGatewaySpec) -> Result<RenderedConfig> {
    ProxyKind::from_tag(spec.r#type.as_deref())?.render(spec)
}

/// A rendered configuration together with its serialized form and fingerprint
#[derive(Clone, Debug, PartialEq)]
pub struct RenderedConfig {
    pub config: ProxyConfig,
    pub data: String,
    pub hash: String,
}

/// LiteLLM proxy configuration document
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub model_list: Vec<ModelEntry>,
    pub litellm_settings: ProxySettings,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub model_name: String,
    pub litellm_params: ModelParams,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProxySettings {
    pub request_timeout: u32,
}

impl ModelEntry {
    fn from_model(model: &AiModel) -> Self {
        let route = ModelRoute::of(model);
        Self {
            model_name: model.name.clone(),
            litellm_params: ModelParams {
                api_key: api_key_env_var(&route.provider).map(|var| format!("os.environ/{}", var)),
                model: route.target,
            },
        }
    }
}

/// Where a model is routed and which provider serves it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelRoute {
    /// LiteLLM routing target, "provider/model"
    pub target: String,
    /// Lowercased provider name
    pub provider: String,
}

impl ModelRoute {
    pub fn of(model: &AiModel) -> Self {
        match model.provider.as_deref().filter(|p| !p.is_empty()) {
            Some(provider) => Self {
                target: format!("{}/{}", provider, model.name),
                provider: provider.to_lowercase(),
            },
            None => {
                // Implicit provider is the text before the first '/'
                let provider = model.name.split('/').next().unwrap_or_default();
                Self {
                    target: model.name.clone(),
                    provider: provider.to_lowercase(),
                }
            }
        }
    }
}

/// Environment variable holding the API key for a provider, if it needs one
pub fn api_key_env_var(provider: &str) -> Option<String> {
    let provider = provider.to_lowercase();
    let var = match provider.as_str() {
        "" | "ollama" => return None,
        "openai" => "OPENAI_API_KEY",
        "azure" => "AZURE_API_KEY",
        "gemini" => "GEMINI_API_KEY",
        "anthropic" => "ANTHROPIC_API_KEY",
        "bedrock" => "AWS_ACCESS_KEY_ID",
        "huggingface" => "HUGGINGFACE_API_KEY",
        other => return Some(format!("{}_API_KEY", other.to_uppercase())),
    };
    Some(var.to_string())
}

/// Distinct API key variables needed by a model list, sorted by name
pub fn required_api_keys(models: &[AiModel]) -> BTreeSet<String> {
    models
        .iter()
        .filter_map(|m| api_key_env_var(&ModelRoute::of(m).provider))
        .collect()
}

/// Truncated hex SHA-256 of the serialized configuration
pub fn config_hash(data: &str) -> String {
    let digest = Sha256::digest(data.as_bytes());
    let mut hash = hex::encode(digest);
    hash.truncate(CONFIG_HASH_LEN);
    hash
}
